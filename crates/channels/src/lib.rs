// Verification channels
//
// WiFiCoin payment, WeChat portal, SMS code and static password, plus the
// outbound clients they use (Insight explorer, Aliyun and NetEase SMS).

pub mod adapter;
pub mod password;
pub mod providers;
pub mod sms;
pub mod weixin;
pub mod wfc;

pub use adapter::{http_client, ChannelError, VerificationChannel, VerificationOutcome};
pub use password::{Credentials, PasswordChannel, BYPASS_USER};
pub use providers::{
    AliyunSms, InsightExplorer, NeteaseSms, SmsProvider, Transaction, TransactionExplorer,
};
pub use sms::{SmsChannel, SmsCodeCheck};
pub use weixin::{WeixinCallback, WeixinChannel};
pub use wfc::{PaymentProof, WfcChannel};
