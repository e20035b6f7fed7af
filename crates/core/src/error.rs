//! wifiauth Error Types
//!
//! This module defines a layered error hierarchy:
//! - `DomainError`: Business failures (config, unknown gateway/order, channel verification)
//! - `InfraError`: Infrastructure errors (IO, database, serialization, outbound HTTP)
//! - `WifiAuthError`: Top-level error that wraps both categories

use std::fmt;

/// Domain-level errors representing business logic failures
#[derive(Debug)]
pub enum DomainError {
    /// Configuration file not found at the specified path
    ConfigNotFound { path: String },
    /// Configuration validation failed
    ConfigInvalid { field: String, reason: String },
    /// Configuration parsing failed
    ConfigParse { source: String },
    /// No channel configuration registered for this gateway
    GatewayNotRegistered { gw_id: String },
    /// Order number does not refer to a live order
    OrderNotFound { order_number: String },
    /// A required request parameter was missing or malformed
    InvalidParameter { name: String },
    /// A verification channel rejected or could not complete the request
    Verification { channel: String, reason: String },
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigNotFound { path } => write!(f, "Config not found: {}", path),
            Self::ConfigInvalid { field, reason } => {
                write!(f, "Config invalid [{}]: {}", field, reason)
            }
            Self::ConfigParse { source } => write!(f, "Config parse error: {}", source),
            Self::GatewayNotRegistered { gw_id } => {
                write!(f, "Gateway not registered: {}", gw_id)
            }
            Self::OrderNotFound { order_number } => {
                write!(f, "Order not found: {}", order_number)
            }
            Self::InvalidParameter { name } => write!(f, "Invalid parameter: {}", name),
            Self::Verification { channel, reason } => {
                write!(f, "Channel '{}' verification failed: {}", channel, reason)
            }
        }
    }
}

impl std::error::Error for DomainError {}

/// Infrastructure-level errors representing external system failures
#[derive(Debug)]
pub enum InfraError {
    /// IO operation failed
    Io(std::io::Error),
    /// JSON serialization/deserialization failed
    Json(serde_json::Error),
    /// YAML serialization/deserialization failed
    Yaml(serde_yml::Error),
    /// Database operation failed
    Database(rusqlite::Error),
    /// Network/HTTP request failed
    Network { url: String, reason: String },
}

impl fmt::Display for InfraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "IO error: {}", err),
            Self::Json(err) => write!(f, "JSON error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Database(err) => write!(f, "Database error: {}", err),
            Self::Network { url, reason } => write!(f, "Network error [{}]: {}", url, reason),
        }
    }
}

impl std::error::Error for InfraError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Yaml(e) => Some(e),
            Self::Database(e) => Some(e),
            Self::Network { .. } => None,
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<serde_yml::Error> for InfraError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Yaml(err)
    }
}

impl From<rusqlite::Error> for InfraError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            url: err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            reason: err.to_string(),
        }
    }
}

/// Top-level error type for wifiauth
///
/// Wraps both domain and infrastructure errors so callers can still
/// branch on the category (the HTTP layer maps domain errors to
/// user-facing envelopes and infrastructure errors to a generic failure).
#[derive(Debug)]
pub enum WifiAuthError {
    /// Business logic error
    Domain(DomainError),
    /// Infrastructure/external system error
    Infra(InfraError),
    /// Generic error for edge cases
    Other(String),
}

impl fmt::Display for WifiAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Domain(e) => write!(f, "{}", e),
            Self::Infra(e) => write!(f, "{}", e),
            Self::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for WifiAuthError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Infra(e) => Some(e),
            Self::Other(_) => None,
        }
    }
}

impl From<DomainError> for WifiAuthError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl From<InfraError> for WifiAuthError {
    fn from(err: InfraError) -> Self {
        Self::Infra(err)
    }
}

// Convenience conversions from infrastructure error sources
impl From<std::io::Error> for WifiAuthError {
    fn from(err: std::io::Error) -> Self {
        Self::Infra(InfraError::Io(err))
    }
}

impl From<serde_json::Error> for WifiAuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Infra(InfraError::Json(err))
    }
}

impl From<serde_yml::Error> for WifiAuthError {
    fn from(err: serde_yml::Error) -> Self {
        Self::Infra(InfraError::Yaml(err))
    }
}

impl From<rusqlite::Error> for WifiAuthError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Infra(InfraError::Database(err))
    }
}

impl From<reqwest::Error> for WifiAuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Infra(InfraError::from(err))
    }
}

impl WifiAuthError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigNotFound { path: path.into() })
    }

    pub fn config_parse_error(source: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigParse {
            source: source.into(),
        })
    }

    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn gateway_not_registered(gw_id: impl Into<String>) -> Self {
        Self::Domain(DomainError::GatewayNotRegistered {
            gw_id: gw_id.into(),
        })
    }

    pub fn order_not_found(order_number: impl Into<String>) -> Self {
        Self::Domain(DomainError::OrderNotFound {
            order_number: order_number.into(),
        })
    }

    pub fn invalid_parameter(name: impl Into<String>) -> Self {
        Self::Domain(DomainError::InvalidParameter { name: name.into() })
    }

    pub fn verification(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Domain(DomainError::Verification {
            channel: channel.into(),
            reason: reason.into(),
        })
    }

    /// True for errors caused by caller input rather than by this service
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_render_their_subject() {
        let err = WifiAuthError::gateway_not_registered("GW1");
        assert_eq!(err.to_string(), "Gateway not registered: GW1");
        assert!(err.is_domain());

        let err = WifiAuthError::verification("wfc", "no matching output");
        assert_eq!(
            err.to_string(),
            "Channel 'wfc' verification failed: no matching output"
        );
    }

    #[test]
    fn infra_errors_keep_their_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = WifiAuthError::from(io);
        assert!(!err.is_domain());
        assert!(std::error::Error::source(&err).is_some());
    }
}
