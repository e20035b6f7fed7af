// Insight block-explorer client

use super::TransactionExplorer;
use crate::adapter::ChannelError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer};
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub txid: String,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    /// Coin-denominated amount
    #[serde(deserialize_with = "coin_value")]
    pub value: f64,
}

/// Insight renders output values as strings ("0.00111"); accept numbers too
fn coin_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}

pub struct InsightExplorer {
    client: Client,
    api_base: String,
}

impl InsightExplorer {
    pub fn new(client: Client, api_base: impl Into<String>) -> Self {
        Self {
            client,
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl TransactionExplorer for InsightExplorer {
    async fn transaction(&self, txid: &str) -> Result<Transaction, ChannelError> {
        let url = format!(
            "{}/tx/{}",
            self.api_base.trim_end_matches('/'),
            urlencoding::encode(txid)
        );
        debug!("Fetching transaction from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChannelError::network("insight", e))?;

        if !response.status().is_success() {
            return Err(ChannelError::provider(
                "insight",
                format!("status {} for tx {}", response.status(), txid),
            ));
        }

        response
            .json::<Transaction>()
            .await
            .map_err(|e| ChannelError::provider("insight", format!("bad tx body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn output_values_parse_from_strings_and_numbers() {
        let tx: Transaction =
            serde_json::from_str(r#"{"txid":"t","vout":[{"value":"0.0011"},{"value":2}]}"#)
                .unwrap();
        assert_eq!(tx.vout.len(), 2);
        assert!((tx.vout[0].value - 0.0011).abs() < 1e-12);
        assert_eq!(tx.vout[1].value, 2.0);
    }

    #[tokio::test]
    async fn fetches_transaction_by_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/insight-api/tx/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "txid": "abc",
                "vout": [{"value": "0.001234", "n": 0}]
            })))
            .mount(&server)
            .await;

        let explorer = InsightExplorer::new(
            Client::new(),
            format!("{}/insight-api/", server.uri()),
        );
        let tx = explorer.transaction("abc").await.unwrap();
        assert_eq!(tx.txid, "abc");
        assert_eq!(tx.vout.len(), 1);
    }

    #[tokio::test]
    async fn unknown_transaction_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let explorer = InsightExplorer::new(Client::new(), server.uri());
        let err = explorer.transaction("missing").await.unwrap_err();
        assert!(matches!(err, ChannelError::Provider { .. }));
    }
}
