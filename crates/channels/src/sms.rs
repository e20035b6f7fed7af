// SMS one-time-code channel
//
// Two steps: `send_code` dispatches a 4-digit code and stores it on the
// order's pending token; `verify` compares what the user typed with it.

use crate::adapter::{ChannelError, VerificationChannel, VerificationOutcome};
use crate::providers::SmsProvider;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};
use wifiauth_core::digest::derive_token;
use wifiauth_core::{Channel, Order, SmsProviderKind, Token};
use wifiauth_store::{GatewaySettings, TokenRepository};

pub const CODE_LEN: usize = 4;

/// Code typed back by the user
#[derive(Debug, Clone)]
pub struct SmsCodeCheck {
    pub phone_number: String,
    pub check_code: String,
}

/// Random decimal code of `CODE_LEN` digits, leading zeros kept
pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

pub struct SmsChannel {
    settings: Arc<dyn GatewaySettings>,
    tokens: Arc<dyn TokenRepository>,
    aliyun: Arc<dyn SmsProvider>,
    netease: Arc<dyn SmsProvider>,
}

impl SmsChannel {
    pub fn new(
        settings: Arc<dyn GatewaySettings>,
        tokens: Arc<dyn TokenRepository>,
        aliyun: Arc<dyn SmsProvider>,
        netease: Arc<dyn SmsProvider>,
    ) -> Self {
        Self {
            settings,
            tokens,
            aliyun,
            netease,
        }
    }

    /// Send a fresh code for `order` to `phone_number`.
    ///
    /// The pending token is written only after the provider confirmed the
    /// send, so a failed send leaves nothing to check against.
    pub async fn send_code(
        &self,
        order: &Order,
        phone_number: &str,
    ) -> Result<VerificationOutcome, ChannelError> {
        let setting = self
            .settings
            .gateway_setting(&order.gw_id)
            .await?
            .ok_or_else(|| ChannelError::GatewayNotRegistered {
                gw_id: order.gw_id.clone(),
            })?;

        let provider = match setting.sms.provider() {
            Some(SmsProviderKind::Aliyun) => &self.aliyun,
            Some(SmsProviderKind::Netease) => &self.netease,
            None => {
                return Err(ChannelError::SmsNotConfigured {
                    gw_id: order.gw_id.clone(),
                })
            }
        };

        let code = generate_code();
        provider.send_code(&setting.sms, phone_number, &code).await?;

        let mut token = Token::for_order(derive_token(&order.order_number), order, Channel::Sms);
        token.phone_number = Some(phone_number.to_string());
        token.check_code = Some(code);
        self.tokens.upsert_token(&token).await?;

        info!(
            "SMS code for order {} sent via {}",
            order.order_number,
            provider.name()
        );
        Ok(VerificationOutcome::Pending("code sent".to_string()))
    }
}

#[async_trait]
impl VerificationChannel for SmsChannel {
    type Input = SmsCodeCheck;

    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn verify(
        &self,
        order: &Order,
        input: &SmsCodeCheck,
    ) -> Result<VerificationOutcome, ChannelError> {
        let token = derive_token(&order.order_number);
        let Some(pending) = self.tokens.find_token(&token).await? else {
            return Ok(VerificationOutcome::Rejected("no code was sent".to_string()));
        };

        let phone_ok = pending.phone_number.as_deref() == Some(input.phone_number.as_str());
        let code_ok = pending.check_code.as_deref() == Some(input.check_code.as_str());
        if phone_ok && code_ok {
            Ok(VerificationOutcome::Accepted)
        } else {
            warn!("SMS code mismatch for order {}", order.order_number);
            Ok(VerificationOutcome::Rejected("code mismatch".to_string()))
        }
    }
}
