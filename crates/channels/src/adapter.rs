// Verification Channel Interface
//
// Every channel resolves an order to an outcome; the caller mints the token.

use async_trait::async_trait;
use wifiauth_core::{Channel, InfraError, Order, WifiAuthError};
use wifiauth_store::StoreError;

/// Result of one verification attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Verified; the caller issues the token exactly once
    Accepted,
    /// Definitively failed
    Rejected(String),
    /// Step completed but access is not granted yet (SMS code sent)
    Pending(String),
}

impl VerificationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VerificationOutcome::Accepted)
    }
}

/// Unified verification channel trait
#[async_trait]
pub trait VerificationChannel: Send + Sync {
    /// Channel-specific input collected by the callback endpoint
    type Input: Send + Sync;

    fn channel(&self) -> Channel;

    async fn verify(
        &self,
        order: &Order,
        input: &Self::Input,
    ) -> Result<VerificationOutcome, ChannelError>;
}

/// Channel error type
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("gateway {gw_id} is not registered")]
    GatewayNotRegistered { gw_id: String },

    #[error("no SMS provider configured for gateway {gw_id}")]
    SmsNotConfigured { gw_id: String },

    #[error("request to {provider} failed: {reason}")]
    Network { provider: String, reason: String },

    #[error("{provider} refused the request: {reason}")]
    Provider { provider: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ChannelError {
    pub(crate) fn network(provider: &str, reason: impl ToString) -> Self {
        ChannelError::Network {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn provider(provider: &str, reason: impl ToString) -> Self {
        ChannelError::Provider {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<ChannelError> for WifiAuthError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::GatewayNotRegistered { gw_id } => {
                WifiAuthError::gateway_not_registered(gw_id)
            }
            ChannelError::SmsNotConfigured { gw_id } => {
                WifiAuthError::verification("sms", format!("no provider for {}", gw_id))
            }
            ChannelError::Network { provider, reason } => {
                WifiAuthError::Infra(InfraError::Network {
                    url: provider,
                    reason,
                })
            }
            ChannelError::Store(e) => e.into(),
            other => WifiAuthError::Other(other.to_string()),
        }
    }
}

/// Build the shared HTTP client for outbound provider calls
pub fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_errors_map_into_domain_errors() {
        let err: WifiAuthError = ChannelError::GatewayNotRegistered {
            gw_id: "GW1".to_string(),
        }
        .into();
        assert!(err.is_domain());

        let err: WifiAuthError = ChannelError::network("insight", "timed out").into();
        assert!(!err.is_domain());
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn only_accepted_is_accepted() {
        assert!(VerificationOutcome::Accepted.is_accepted());
        assert!(!VerificationOutcome::Rejected("x".into()).is_accepted());
        assert!(!VerificationOutcome::Pending("x".into()).is_accepted());
    }
}
