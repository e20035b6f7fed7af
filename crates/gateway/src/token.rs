// Token Issuer
//
// Mints the access token for a verified order and builds the URL that hands
// the browser back to the gateway firmware.

use std::sync::Arc;
use tracing::info;
use wifiauth_core::digest::derive_token;
use wifiauth_core::{Channel, Order, Token};
use wifiauth_store::{StoreError, TokenRepository};

/// Channel-specific fields carried on the token record
#[derive(Debug, Clone, Default)]
pub struct TokenExtras {
    pub phone_number: Option<String>,
    pub check_code: Option<String>,
    pub tid: Option<String>,
}

/// `http://{gw_address}:{gw_port}/wifidog/auth?token=..`, tagged with
/// `&type=weixin` for WeChat-issued tokens
pub fn auth_token_url(gw_address: &str, gw_port: u16, token: &str, channel: Channel) -> String {
    let mut url = format!(
        "http://{}:{}/wifidog/auth?token={}",
        gw_address, gw_port, token
    );
    if channel == Channel::Weixin {
        url.push_str("&type=weixin");
    }
    url
}

pub struct TokenIssuer {
    tokens: Arc<dyn TokenRepository>,
}

impl TokenIssuer {
    pub fn new(tokens: Arc<dyn TokenRepository>) -> Self {
        Self { tokens }
    }

    /// Persist the order's token and return the redirect URL.
    ///
    /// The write completes before the URL is handed out, so the firmware's
    /// `auth?stage=login` check can never overtake it.
    pub async fn issue(
        &self,
        order: &Order,
        channel: Channel,
        extras: TokenExtras,
    ) -> Result<String, StoreError> {
        let mut token = Token::for_order(derive_token(&order.order_number), order, channel);
        token.phone_number = extras.phone_number;
        token.check_code = extras.check_code;
        token.tid = extras.tid;
        self.tokens.upsert_token(&token).await?;

        info!(
            "Token issued for order {} via {}",
            order.order_number, channel
        );
        Ok(auth_token_url(
            &order.gw_address,
            order.gw_port,
            &token.token,
            channel,
        ))
    }

    pub async fn is_granted(&self, token: &str) -> Result<bool, StoreError> {
        self.tokens.token_exists(token).await
    }
}
