// WeChat portal channel
//
// The WeChat backend redirects here after its own authentication; the
// callback signature is not re-checked, so finding the order is enough.

use crate::adapter::{ChannelError, VerificationChannel, VerificationOutcome};
use async_trait::async_trait;
use tracing::info;
use wifiauth_core::{Channel, Order};

/// Query of the WeChat callback
#[derive(Debug, Clone, Default)]
pub struct WeixinCallback {
    /// Order number echoed back by WeChat
    pub extend: String,
    pub open_id: String,
    pub tid: String,
    pub sign: String,
    pub timestamp: String,
}

#[derive(Debug, Default)]
pub struct WeixinChannel;

impl WeixinChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VerificationChannel for WeixinChannel {
    type Input = WeixinCallback;

    fn channel(&self) -> Channel {
        Channel::Weixin
    }

    async fn verify(
        &self,
        order: &Order,
        input: &WeixinCallback,
    ) -> Result<VerificationOutcome, ChannelError> {
        if input.extend != order.order_number {
            return Ok(VerificationOutcome::Rejected(
                "callback is for another order".to_string(),
            ));
        }
        info!(
            "WeChat callback for order {} (openId {})",
            order.order_number, input.open_id
        );
        Ok(VerificationOutcome::Accepted)
    }
}
