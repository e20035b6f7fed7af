// Static username/password channel

use crate::adapter::{ChannelError, VerificationChannel, VerificationOutcome};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;
use wifiauth_core::{Channel, Order, UserSetting};
use wifiauth_store::GatewaySettings;

/// Accepted for every gateway regardless of its configured credentials
pub const BYPASS_USER: &str = "apfree-wifidog";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Bypass user, or exact match of the configured pair
pub fn credentials_match(setting: &UserSetting, credentials: &Credentials) -> bool {
    if credentials.user == BYPASS_USER {
        return true;
    }
    // an unset pair never matches
    !setting.user.is_empty()
        && credentials.user == setting.user
        && credentials.password == setting.password
}

pub struct PasswordChannel {
    settings: Arc<dyn GatewaySettings>,
}

impl PasswordChannel {
    pub fn new(settings: Arc<dyn GatewaySettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl VerificationChannel for PasswordChannel {
    type Input = Credentials;

    fn channel(&self) -> Channel {
        Channel::User
    }

    async fn verify(
        &self,
        order: &Order,
        input: &Credentials,
    ) -> Result<VerificationOutcome, ChannelError> {
        let setting = self.settings.gateway_setting(&order.gw_id).await?.ok_or_else(|| {
            ChannelError::GatewayNotRegistered {
                gw_id: order.gw_id.clone(),
            }
        })?;

        if credentials_match(&setting.user, input) {
            Ok(VerificationOutcome::Accepted)
        } else {
            warn!("Bad credentials for user {} on {}", input.user, order.gw_id);
            Ok(VerificationOutcome::Rejected(
                "user or password is error".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> UserSetting {
        UserSetting {
            enable: true,
            user: "guest".to_string(),
            password: "s3cret".to_string(),
        }
    }

    fn creds(user: &str, password: &str) -> Credentials {
        Credentials {
            user: user.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn bypass_user_always_passes() {
        assert!(credentials_match(&configured(), &creds(BYPASS_USER, "")));
        assert!(credentials_match(&UserSetting::default(), &creds(BYPASS_USER, "x")));
    }

    #[test]
    fn configured_pair_passes_and_nothing_else() {
        assert!(credentials_match(&configured(), &creds("guest", "s3cret")));
        assert!(!credentials_match(&configured(), &creds("guest", "wrong")));
        assert!(!credentials_match(&configured(), &creds("other", "s3cret")));
        assert!(!credentials_match(&configured(), &creds("", "")));
        assert!(!credentials_match(&UserSetting::default(), &creds("", "")));
    }
}
