// Outbound clients for the services the channels consume.

pub mod aliyun;
pub mod insight;
pub mod netease;

use crate::adapter::ChannelError;
use async_trait::async_trait;
use wifiauth_core::SmsSetting;

pub use aliyun::AliyunSms;
pub use insight::{InsightExplorer, Transaction, TxOutput};
pub use netease::NeteaseSms;

/// Block explorer lookup used by the crypto-payment channel
#[async_trait]
pub trait TransactionExplorer: Send + Sync {
    async fn transaction(&self, txid: &str) -> Result<Transaction, ChannelError>;
}

/// One SMS gateway able to deliver a verification code
#[async_trait]
pub trait SmsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver `code` to `phone_number` with the gateway's credentials.
    /// `Ok` only when the provider confirmed the send.
    async fn send_code(
        &self,
        setting: &SmsSetting,
        phone_number: &str,
        code: &str,
    ) -> Result<(), ChannelError>;
}
