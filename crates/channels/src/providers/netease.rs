// NetEase Yunxin `sendcode` client

use super::SmsProvider;
use crate::adapter::ChannelError;
use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tracing::{debug, info};
use wifiauth_core::{unix_now, SmsSetting};

const PROVIDER: &str = "netease";

#[derive(Debug, Deserialize)]
struct SendCodeResponse {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    msg: Option<String>,
}

pub struct NeteaseSms {
    client: Client,
    endpoint: String,
}

impl NeteaseSms {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

/// `sha1_hex(app_secret + nonce + cur_time)`
fn check_sum(app_secret: &str, nonce: &str, cur_time: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(app_secret.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(cur_time.as_bytes());
    hex::encode(hasher.finalize())
}

fn nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(15)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[async_trait]
impl SmsProvider for NeteaseSms {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn send_code(
        &self,
        setting: &SmsSetting,
        phone_number: &str,
        code: &str,
    ) -> Result<(), ChannelError> {
        let url = format!(
            "{}?templateid={}&mobile={}&authCode={}",
            self.endpoint,
            urlencoding::encode(&setting.wy_template_id),
            urlencoding::encode(phone_number),
            urlencoding::encode(code)
        );
        let nonce = nonce();
        let cur_time = unix_now().to_string();
        let check_sum = check_sum(&setting.wy_app_secret, &nonce, &cur_time);
        debug!("Sending NetEase SMS to {}", phone_number);

        let response = self
            .client
            .post(&url)
            .header("AppKey", &setting.wy_app_id)
            .header("Nonce", &nonce)
            .header("CurTime", &cur_time)
            .header("CheckSum", &check_sum)
            .header(
                "Content-Type",
                "application/x-www-form-urlencoded; charset=UTF-8",
            )
            .send()
            .await
            .map_err(|e| ChannelError::network(PROVIDER, e))?;

        let status = response.status();
        if status.as_u16() != 200 {
            return Err(ChannelError::provider(PROVIDER, format!("status {}", status)));
        }

        let body: SendCodeResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::provider(PROVIDER, format!("bad reply: {}", e)))?;

        if body.code == 200 {
            info!("NetEase SMS accepted for {}", phone_number);
            Ok(())
        } else {
            Err(ChannelError::provider(
                PROVIDER,
                format!("code {} {}", body.code, body.msg.unwrap_or_default()),
            ))
        }
    }
}
