// Aliyun Dysms `SendSms` client (RPC style, HMAC-SHA1 signed GET)

use super::SmsProvider;
use crate::adapter::ChannelError;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha1::Sha1;
use tracing::{debug, info};
use wifiauth_core::SmsSetting;

type HmacSha1 = Hmac<Sha1>;

const PROVIDER: &str = "aliyun";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SendSmsResponse {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

pub struct AliyunSms {
    client: Client,
    endpoint: String,
}

impl AliyunSms {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

/// RFC 3986 encoding as Aliyun's POP signature expects it
fn pop_encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Sorted, encoded `k=v&...` string for `params`
fn canonical_query(params: &[(&str, String)]) -> String {
    let mut sorted: Vec<_> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    sorted
        .iter()
        .map(|(k, v)| format!("{}={}", pop_encode(k), pop_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `base64(HMAC-SHA1(secret + "&", "GET&%2F&" + encode(canonical)))`
fn sign(access_secret: &str, canonical: &str) -> Result<String, ChannelError> {
    let string_to_sign = format!("GET&{}&{}", pop_encode("/"), pop_encode(canonical));
    let key = format!("{}&", access_secret);
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| ChannelError::provider(PROVIDER, format!("signing key: {}", e)))?;
    mac.update(string_to_sign.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// Full signed query string for one send
fn signed_query(
    setting: &SmsSetting,
    phone_number: &str,
    code: &str,
    nonce: &str,
    timestamp: &str,
) -> Result<String, ChannelError> {
    let params = vec![
        ("AccessKeyId", setting.app_id.clone()),
        ("Action", "SendSms".to_string()),
        ("Format", "JSON".to_string()),
        ("PhoneNumbers", phone_number.to_string()),
        ("RegionId", "cn-hangzhou".to_string()),
        ("SignName", setting.sign_name.clone()),
        ("SignatureMethod", "HMAC-SHA1".to_string()),
        ("SignatureNonce", nonce.to_string()),
        ("SignatureVersion", "1.0".to_string()),
        ("TemplateCode", setting.template_code.clone()),
        ("TemplateParam", format!(r#"{{"code":"{}"}}"#, code)),
        ("Timestamp", timestamp.to_string()),
        ("Version", "2017-05-25".to_string()),
    ];
    let canonical = canonical_query(&params);
    let signature = sign(&setting.app_secret, &canonical)?;
    Ok(format!("Signature={}&{}", pop_encode(&signature), canonical))
}

#[async_trait]
impl SmsProvider for AliyunSms {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send_code(
        &self,
        setting: &SmsSetting,
        phone_number: &str,
        code: &str,
    ) -> Result<(), ChannelError> {
        let nonce = uuid::Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let query = signed_query(setting, phone_number, code, &nonce, &timestamp)?;
        let url = format!("{}?{}", self.endpoint, query);
        debug!("Sending Aliyun SMS to {}", phone_number);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChannelError::network(PROVIDER, e))?;

        let body: SendSmsResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::provider(PROVIDER, format!("bad reply: {}", e)))?;

        if body.code == "OK" {
            info!("Aliyun SMS accepted for {}", phone_number);
            Ok(())
        } else {
            Err(ChannelError::provider(
                PROVIDER,
                format!("{}: {}", body.code, body.message),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn setting() -> SmsSetting {
        SmsSetting {
            selected: "ali".to_string(),
            ali_enable: true,
            app_id: "testId".to_string(),
            app_secret: "testSecret".to_string(),
            sign_name: "Venue".to_string(),
            template_code: "SMS_1".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn canonical_query_is_sorted_and_encoded() {
        let params = vec![("b", "x y".to_string()), ("a", "1*".to_string())];
        assert_eq!(canonical_query(&params), "a=1%2A&b=x%20y");
    }

    #[test]
    fn signature_matches_published_example() {
        // Aliyun POP documentation sample
        let canonical = "AccessKeyId=testId&Action=SendSms&Format=XML&OutId=123&PhoneNumbers=15300000001&RegionId=cn-hangzhou&SignName=%E9%98%BF%E9%87%8C%E4%BA%91%E7%9F%AD%E4%BF%A1%E6%B5%8B%E8%AF%95%E4%B8%93%E7%94%A8&SignatureMethod=HMAC-SHA1&SignatureNonce=45e25e9b-0a6f-4070-8c85-2956eda1b466&SignatureVersion=1.0&TemplateCode=SMS_71390007&TemplateParam=%7B%22customer%22%3A%22test%22%7D&Timestamp=2017-07-12T02%3A42%3A19Z&Version=2017-05-25";
        assert_eq!(
            sign("testSecret", canonical).unwrap(),
            "zJDF+Lrzhj/ThnlvIToysFRq6t4="
        );
    }

    #[test]
    fn signed_query_carries_template_param() {
        let query =
            signed_query(&setting(), "13800000000", "0420", "n", "2024-01-01T00:00:00Z").unwrap();
        assert!(query.starts_with("Signature="));
        assert!(query.contains("TemplateParam=%7B%22code%22%3A%220420%22%7D"));
        assert!(query.contains("Action=SendSms"));
    }

    #[tokio::test]
    async fn ok_code_means_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("PhoneNumbers", "13800000000"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"Code": "OK", "Message": "OK"})),
            )
            .mount(&server)
            .await;

        let sms = AliyunSms::new(Client::new(), format!("{}/", server.uri()));
        sms.send_code(&setting(), "13800000000", "0420").await.unwrap();
    }

    #[tokio::test]
    async fn other_codes_are_refusals() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"Code": "isv.BUSINESS_LIMIT_CONTROL", "Message": "limit"}),
            ))
            .mount(&server)
            .await;

        let sms = AliyunSms::new(Client::new(), format!("{}/", server.uri()));
        let err = sms
            .send_code(&setting(), "13800000000", "0420")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("BUSINESS_LIMIT_CONTROL"));
    }
}
