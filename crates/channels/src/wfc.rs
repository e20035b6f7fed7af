// WiFiCoin payment channel
//
// An order is paid when one output of the submitted transaction carries the
// order's exact amount. The random offset added at order time is what makes
// the amount identify the order.

use crate::adapter::{ChannelError, VerificationChannel, VerificationOutcome};
use crate::providers::{Transaction, TransactionExplorer};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};
use wifiauth_core::{Channel, Order};

/// Base units per coin
pub const WFC_SCALE: f64 = 1_000_000.0;

/// Allowed difference between an output (in base units) and the order amount
pub const AMOUNT_TOLERANCE: f64 = 0.001;

/// Transaction submitted by the wallet callback
#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub txid: String,
}

/// Order amount expressed in coins, as shown to the payer
pub fn to_coins(to_amount: i64) -> f64 {
    to_amount as f64 / WFC_SCALE
}

/// True when some output pays exactly `to_amount` base units
pub fn pays_amount(tx: &Transaction, to_amount: i64) -> bool {
    tx.vout
        .iter()
        .any(|out| (to_amount as f64 - out.value * WFC_SCALE).abs() < AMOUNT_TOLERANCE)
}

pub struct WfcChannel {
    explorer: Arc<dyn TransactionExplorer>,
}

impl WfcChannel {
    pub fn new(explorer: Arc<dyn TransactionExplorer>) -> Self {
        Self { explorer }
    }
}

#[async_trait]
impl VerificationChannel for WfcChannel {
    type Input = PaymentProof;

    fn channel(&self) -> Channel {
        Channel::Wfc
    }

    async fn verify(
        &self,
        order: &Order,
        input: &PaymentProof,
    ) -> Result<VerificationOutcome, ChannelError> {
        let tx = match self.explorer.transaction(&input.txid).await {
            Ok(tx) => tx,
            Err(e) => {
                warn!("Lookup of tx {} failed: {}", input.txid, e);
                return Ok(VerificationOutcome::Rejected(format!(
                    "transaction lookup failed: {}",
                    e
                )));
            }
        };

        if pays_amount(&tx, order.to_amount) {
            info!(
                "Order {} paid by tx {}",
                order.order_number, input.txid
            );
            Ok(VerificationOutcome::Accepted)
        } else {
            warn!(
                "Tx {} has no output of {} for order {}",
                input.txid, order.to_amount, order.order_number
            );
            Ok(VerificationOutcome::Rejected("no matching output".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::TxOutput;

    struct FixedExplorer(Option<Vec<f64>>);

    #[async_trait]
    impl TransactionExplorer for FixedExplorer {
        async fn transaction(&self, txid: &str) -> Result<Transaction, ChannelError> {
            match &self.0 {
                Some(values) => Ok(Transaction {
                    txid: txid.to_string(),
                    vout: values.iter().map(|&value| TxOutput { value }).collect(),
                }),
                None => Err(ChannelError::network("insight", "connection refused")),
            }
        }
    }

    fn order(to_amount: i64) -> Order {
        Order {
            order_number: "o1".to_string(),
            order_time: 0,
            to_amount,
            gw_address: "10.0.0.1".to_string(),
            gw_port: 2060,
            gw_id: "GW1".to_string(),
            sta_mac: "AA".to_string(),
        }
    }

    fn proof() -> PaymentProof {
        PaymentProof {
            txid: "tx".to_string(),
        }
    }

    #[test]
    fn coins_conversion() {
        assert_eq!(to_coins(1_234_567), 1.234567);
        assert_eq!(to_coins(1100), 0.0011);
    }

    #[tokio::test]
    async fn accepts_any_matching_output() {
        let channel = WfcChannel::new(Arc::new(FixedExplorer(Some(vec![5.0, 0.001234]))));
        let outcome = channel.verify(&order(1234), &proof()).await.unwrap();
        assert_eq!(outcome, VerificationOutcome::Accepted);
    }

    #[tokio::test]
    async fn rejects_mismatch_and_empty_outputs() {
        let channel = WfcChannel::new(Arc::new(FixedExplorer(Some(vec![0.001235]))));
        let outcome = channel.verify(&order(1234), &proof()).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Rejected(_)));

        let channel = WfcChannel::new(Arc::new(FixedExplorer(Some(vec![]))));
        let outcome = channel.verify(&order(1234), &proof()).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Rejected(_)));
    }

    #[tokio::test]
    async fn lookup_failure_rejects() {
        let channel = WfcChannel::new(Arc::new(FixedExplorer(None)));
        let outcome = channel.verify(&order(1234), &proof()).await.unwrap();
        assert!(matches!(outcome, VerificationOutcome::Rejected(_)));
    }
}
