//! wifiauth Configuration
//!
//! Service-level settings (listen address, public auth domain, outbound
//! provider endpoints, database path). Per-gateway channel settings are not
//! configured here; they live in the store, see [`crate::model::GatewaySetting`].

use crate::error::WifiAuthError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// Default listen host
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default listen port
pub const DEFAULT_PORT: u16 = 8001;
/// Public domain the login page points callbacks back to
pub const DEFAULT_AUTH_DOMAIN: &str = "https://wifidog.kunteng.org.cn";
/// WiFiCoin wallet payment page; the callback URL is appended to it
pub const DEFAULT_WFC_PAY_URL: &str = "https://wfc.wificoin.club/#/wifiPortal/payment?authServer=";
/// Crypto-payment callback path
pub const DEFAULT_WFC_AUTH_PATH: &str = "/wifidog/auth/wfc";
/// WeChat callback path
pub const DEFAULT_WX_AUTH_PATH: &str = "/wifidog/auth/weixin";
/// Portal used when a gateway has no settings
pub const DEFAULT_PORTAL_URL: &str = "https://talkblock.org/";
/// Insight block-explorer API root
pub const DEFAULT_INSIGHT_API: &str = "https://insight.wificoin.club/insight-api";
/// Aliyun Dysms RPC endpoint
pub const DEFAULT_ALIYUN_ENDPOINT: &str = "https://dysmsapi.aliyuncs.com/";
/// NetEase Yunxin send-code endpoint
pub const DEFAULT_NETEASE_ENDPOINT: &str = "https://api.netease.im/sms/sendcode.action";
/// Outbound HTTP timeout (seconds)
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Helper functions for paths (required for serde defaults)
// ============================================================================

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_wifiauth_dir() -> PathBuf {
    home_dir().join(".wifiauth")
}

// ============================================================================
// Main Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub portal: PortalConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Timeout applied to every outbound HTTP call (explorer, SMS providers)
    #[serde(default = "Config::default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Config {
    fn default_http_timeout_secs() -> u64 {
        DEFAULT_HTTP_TIMEOUT_SECS
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            portal: PortalConfig::default(),
            explorer: ExplorerConfig::default(),
            sms: SmsConfig::default(),
            storage: StorageConfig::default(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Server Config
// ============================================================================

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,
    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,
}

impl ServerConfig {
    fn default_host() -> String {
        DEFAULT_HOST.to_string()
    }
    fn default_port() -> u16 {
        DEFAULT_PORT
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

// ============================================================================
// Portal Config
// ============================================================================

/// URLs embedded into the login page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Public origin of this service, as seen by the end user's browser
    #[serde(default = "PortalConfig::default_auth_domain")]
    pub auth_domain: String,
    #[serde(default = "PortalConfig::default_wfc_pay_url")]
    pub wfc_pay_url: String,
    #[serde(default = "PortalConfig::default_wfc_auth_path")]
    pub wfc_auth_path: String,
    #[serde(default = "PortalConfig::default_wx_auth_path")]
    pub wx_auth_path: String,
    #[serde(default = "PortalConfig::default_portal_url")]
    pub default_portal_url: String,
}

impl PortalConfig {
    fn default_auth_domain() -> String {
        DEFAULT_AUTH_DOMAIN.to_string()
    }
    fn default_wfc_pay_url() -> String {
        DEFAULT_WFC_PAY_URL.to_string()
    }
    fn default_wfc_auth_path() -> String {
        DEFAULT_WFC_AUTH_PATH.to_string()
    }
    fn default_wx_auth_path() -> String {
        DEFAULT_WX_AUTH_PATH.to_string()
    }
    fn default_portal_url() -> String {
        DEFAULT_PORTAL_URL.to_string()
    }

    /// Absolute WeChat callback URL
    pub fn wx_auth_url(&self) -> String {
        format!("{}{}", self.auth_domain, self.wx_auth_path)
    }

    /// Wallet payment URL for one order; the wallet calls back
    /// `{auth_domain}{wfc_auth_path}` with `orderNumber` and `txid`
    pub fn wfc_auth_url(&self, order_number: &str, to_address: &str, wfc_amount: f64) -> String {
        format!(
            "{}{}{}&orderNumber={}&toAddress={}&toAmount={}",
            self.wfc_pay_url,
            self.auth_domain,
            self.wfc_auth_path,
            order_number,
            to_address,
            wfc_amount
        )
    }
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            auth_domain: DEFAULT_AUTH_DOMAIN.to_string(),
            wfc_pay_url: DEFAULT_WFC_PAY_URL.to_string(),
            wfc_auth_path: DEFAULT_WFC_AUTH_PATH.to_string(),
            wx_auth_path: DEFAULT_WX_AUTH_PATH.to_string(),
            default_portal_url: DEFAULT_PORTAL_URL.to_string(),
        }
    }
}

// ============================================================================
// Explorer Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Insight API root; transactions are fetched from `{insight_api}/tx/{txid}`
    #[serde(default = "ExplorerConfig::default_insight_api")]
    pub insight_api: String,
}

impl ExplorerConfig {
    fn default_insight_api() -> String {
        DEFAULT_INSIGHT_API.to_string()
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            insight_api: DEFAULT_INSIGHT_API.to_string(),
        }
    }
}

// ============================================================================
// SMS Config
// ============================================================================

/// SMS provider endpoints. Credentials are per gateway, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default = "SmsConfig::default_aliyun_endpoint")]
    pub aliyun_endpoint: String,
    #[serde(default = "SmsConfig::default_netease_endpoint")]
    pub netease_endpoint: String,
}

impl SmsConfig {
    fn default_aliyun_endpoint() -> String {
        DEFAULT_ALIYUN_ENDPOINT.to_string()
    }
    fn default_netease_endpoint() -> String {
        DEFAULT_NETEASE_ENDPOINT.to_string()
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            aliyun_endpoint: DEFAULT_ALIYUN_ENDPOINT.to_string(),
            netease_endpoint: DEFAULT_NETEASE_ENDPOINT.to_string(),
        }
    }
}

// ============================================================================
// Storage Config
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database holding orders, tokens, gateway settings and bookkeeping
    #[serde(default = "StorageConfig::default_db_path")]
    pub db_path: PathBuf,
}

impl StorageConfig {
    fn default_db_path() -> PathBuf {
        default_wifiauth_dir().join("wifiauth.db")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: Self::default_db_path(),
        }
    }
}

// ============================================================================
// Config Loading and Validation
// ============================================================================

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file or default locations
    pub fn load(path: Option<&str>) -> Result<Config, WifiAuthError> {
        let config_path = Self::resolve_config_path(path)?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Config, WifiAuthError> {
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| WifiAuthError::config_parse_error(format!("Failed to read: {}", e)))?;
        let config: Config = serde_yml::from_str(&content)
            .map_err(|e| WifiAuthError::config_parse_error(format!("Failed to parse: {}", e)))?;
        tracing::debug!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    /// Resolve configuration file path
    fn resolve_config_path(path: Option<&str>) -> Result<PathBuf, WifiAuthError> {
        if let Some(p) = path {
            return Ok(PathBuf::from(p));
        }

        let default_paths = [
            default_wifiauth_dir().join("config.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wifiauth.yaml"),
            PathBuf::from("./wifiauth.yaml"),
        ];

        default_paths
            .into_iter()
            .find(|p| p.exists())
            .ok_or_else(|| {
                WifiAuthError::config_not_found(
                    "Config not found. Run `wifiauth init` or create ~/.wifiauth/config.yaml",
                )
            })
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> Result<(), WifiAuthError> {
        if config.server.port == 0 {
            return Err(WifiAuthError::config_invalid(
                "server.port",
                "Port cannot be 0",
            ));
        }

        if config.portal.auth_domain.trim().is_empty() {
            return Err(WifiAuthError::config_invalid(
                "portal.auth_domain",
                "Auth domain cannot be empty",
            ));
        }

        let urls = [
            ("explorer.insight_api", &config.explorer.insight_api),
            ("sms.aliyun_endpoint", &config.sms.aliyun_endpoint),
            ("sms.netease_endpoint", &config.sms.netease_endpoint),
        ];
        for (field, url) in urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(WifiAuthError::config_invalid(
                    field,
                    format!("'{}' is not an http(s) URL", url),
                ));
            }
        }

        if config.http_timeout_secs == 0 {
            return Err(WifiAuthError::config_invalid(
                "http_timeout_secs",
                "Timeout must be at least one second",
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration (resolves default locations when `path` is None)
    pub fn load(path: &Option<String>) -> Result<Self, WifiAuthError> {
        ConfigLoader::load(path.as_deref())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), WifiAuthError> {
        let content = serde_yml::to_string(self).map_err(|e| {
            WifiAuthError::config_parse_error(format!("Serialization failed: {}", e))
        })?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config {
            server: ServerConfig::default(),
            portal: PortalConfig {
                auth_domain: "https://portal.example.com".to_string(),
                ..PortalConfig::default()
            },
            explorer: ExplorerConfig::default(),
            sms: SmsConfig::default(),
            storage: StorageConfig::default(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config: Config = serde_yml::from_str("{}").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.portal.wfc_auth_path, "/wifidog/auth/wfc");
        assert_eq!(config.portal.wx_auth_path, "/wifidog/auth/weixin");
        assert_eq!(config.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = "server:\n  port: 9000\nportal:\n  auth_domain: https://a.example\n";
        let config: Config = serde_yml::from_str(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.portal.auth_domain, "https://a.example");
        assert_eq!(config.portal.default_portal_url, DEFAULT_PORTAL_URL);
    }

    #[test]
    fn test_validator_rejects_bad_values() {
        let mut config = Config::sample();
        config.portal.auth_domain = "  ".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        let mut config = Config::sample();
        config.explorer.insight_api = "ftp://insight".to_string();
        assert!(ConfigValidator::validate(&config).is_err());

        let mut config = Config::sample();
        config.server.port = 0;
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_portal_urls() {
        let portal = PortalConfig {
            auth_domain: "https://auth.example".to_string(),
            ..PortalConfig::default()
        };
        assert_eq!(portal.wx_auth_url(), "https://auth.example/wifidog/auth/weixin");
        assert_eq!(
            portal.wfc_auth_url("42", "WADDR", 0.0011),
            "https://wfc.wificoin.club/#/wifiPortal/payment?authServer=https://auth.example/wifidog/auth/wfc&orderNumber=42&toAddress=WADDR&toAmount=0.0011"
        );
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/wifiauth.yaml");
        Config::sample().save(&path).unwrap();

        let loaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loaded.portal.auth_domain, "https://portal.example.com");
    }

    #[test]
    fn test_default_config_is_valid_and_survives_save() {
        let config = Config::default();
        assert_eq!(config.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert!(ConfigValidator::validate(&config).is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        config.save(&path).unwrap();

        let loaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loaded.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert!(ConfigValidator::validate(&loaded).is_ok());
    }
}
