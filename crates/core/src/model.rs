//! Domain records shared by the store, the channel adapters and the gateway.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds since the Unix epoch
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// One priced access attempt for a gateway/client pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Idempotency key for the whole flow
    pub order_number: String,
    pub order_time: i64,
    /// Base price plus the random de-duplication offset, in wallet base units
    pub to_amount: i64,
    pub gw_address: String,
    pub gw_port: u16,
    pub gw_id: String,
    pub sta_mac: String,
}

/// Verification channel that produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Wfc,
    Weixin,
    Sms,
    User,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wfc => "wfc",
            Self::Weixin => "weixin",
            Self::Sms => "sms",
            Self::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "wfc" => Some(Self::Wfc),
            "weixin" => Some(Self::Weixin),
            "sms" => Some(Self::Sms),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access credential the gateway firmware checks with `auth?stage=login`.
///
/// Existence is the whole contract: there is no expiry and no revocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub token: String,
    #[serde(default)]
    pub order_number: Option<String>,
    pub start_time: i64,
    pub gw_address: String,
    pub gw_port: u16,
    pub gw_id: String,
    #[serde(default)]
    pub sta_mac: Option<String>,
    #[serde(default)]
    pub channel: Option<Channel>,
    /// SMS only
    #[serde(default)]
    pub phone_number: Option<String>,
    /// SMS only
    #[serde(default)]
    pub check_code: Option<String>,
    /// WeChat only
    #[serde(default)]
    pub tid: Option<String>,
}

impl Token {
    /// Token record bound to `order`, with no channel-specific fields set
    pub fn for_order(token: String, order: &Order, channel: Channel) -> Self {
        Self {
            token,
            order_number: Some(order.order_number.clone()),
            start_time: unix_now(),
            gw_address: order.gw_address.clone(),
            gw_port: order.gw_port,
            gw_id: order.gw_id.clone(),
            sta_mac: Some(order.sta_mac.clone()),
            channel: Some(channel),
            phone_number: None,
            check_code: None,
            tid: None,
        }
    }
}

// ============================================================================
// Gateway channel configuration
// ============================================================================

/// Default session duration (seconds)
pub const DEFAULT_DURATION_SECS: u64 = 3600;

/// Per-venue channel configuration, keyed by gateway id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySetting {
    pub gw_id: String,
    #[serde(default)]
    pub wificoin: WificoinSetting,
    #[serde(default)]
    pub weixin: WeixinSetting,
    #[serde(default)]
    pub sms: SmsSetting,
    #[serde(default)]
    pub user: UserSetting,
    /// Session duration granted after verification (seconds)
    #[serde(default = "GatewaySetting::default_duration")]
    pub duration: u64,
    #[serde(default)]
    pub portal_url: Option<String>,
}

impl GatewaySetting {
    fn default_duration() -> u64 {
        DEFAULT_DURATION_SECS
    }

    pub fn new(gw_id: impl Into<String>) -> Self {
        Self {
            gw_id: gw_id.into(),
            wificoin: WificoinSetting::default(),
            weixin: WeixinSetting::default(),
            sms: SmsSetting::default(),
            user: UserSetting::default(),
            duration: DEFAULT_DURATION_SECS,
            portal_url: None,
        }
    }

    /// Session duration in hours, as shown on the login page
    pub fn duration_hours(&self) -> f64 {
        self.duration as f64 / 3600.0
    }
}

/// WiFiCoin crypto-payment channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WificoinSetting {
    #[serde(default)]
    pub enable: bool,
    /// Receiving address shared by every order of this gateway
    #[serde(default)]
    pub to_address: String,
    /// Base price in wallet base units
    #[serde(default)]
    pub to_amount: i64,
}

/// WeChat portal channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeixinSetting {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub shop_id: String,
    #[serde(default)]
    pub secret_key: String,
}

/// Which SMS provider a gateway dispatches through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProviderKind {
    Aliyun,
    Netease,
}

impl SmsProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aliyun => "ali",
            Self::Netease => "wy",
        }
    }
}

/// SMS one-time-code channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SmsSetting {
    /// `ali` or `wy`
    #[serde(default)]
    pub selected: String,
    #[serde(default)]
    pub ali_enable: bool,
    #[serde(default)]
    pub wy_enable: bool,
    /// Aliyun AccessKeyId
    #[serde(default)]
    pub app_id: String,
    /// Aliyun AccessKeySecret
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub sign_name: String,
    #[serde(default)]
    pub template_code: String,
    #[serde(default)]
    pub wy_app_id: String,
    #[serde(default)]
    pub wy_app_secret: String,
    #[serde(default)]
    pub wy_template_id: String,
}

impl SmsSetting {
    pub fn provider(&self) -> Option<SmsProviderKind> {
        match self.selected.as_str() {
            "ali" => Some(SmsProviderKind::Aliyun),
            "wy" => Some(SmsProviderKind::Netease),
            _ => None,
        }
    }
}

/// Static username/password channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserSetting {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
}

// ============================================================================
// Bookkeeping records
// ============================================================================

/// Last heartbeat reported by a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub gw_id: String,
    pub sys_uptime: Option<i64>,
    pub sys_memfree: Option<i64>,
    pub sys_load: Option<f64>,
    pub wifidog_uptime: Option<i64>,
    pub remote_address: Option<String>,
    pub last_seen: i64,
    pub online: bool,
}

/// Traffic counters reported for one client behind a gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub gw_id: String,
    pub mac: String,
    pub ip: Option<String>,
    pub token: Option<String>,
    pub name: Option<String>,
    pub incoming: i64,
    pub outgoing: i64,
    pub last_seen: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_roundtrip() {
        for channel in [Channel::Wfc, Channel::Weixin, Channel::Sms, Channel::User] {
            assert_eq!(Channel::parse(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::parse("alipay"), None);
    }

    #[test]
    fn gateway_setting_defaults_from_minimal_yaml() {
        let setting: GatewaySetting = serde_yml::from_str("gw_id: GW1\n").unwrap();
        assert_eq!(setting.gw_id, "GW1");
        assert!(!setting.wificoin.enable);
        assert_eq!(setting.duration, DEFAULT_DURATION_SECS);
        assert_eq!(setting.duration_hours(), 1.0);
        assert!(setting.portal_url.is_none());
    }

    #[test]
    fn sms_provider_selection() {
        let mut sms = SmsSetting::default();
        assert_eq!(sms.provider(), None);
        sms.selected = "ali".to_string();
        assert_eq!(sms.provider(), Some(SmsProviderKind::Aliyun));
        sms.selected = "wy".to_string();
        assert_eq!(sms.provider(), Some(SmsProviderKind::Netease));
    }

    #[test]
    fn token_for_order_copies_gateway_identity() {
        let order = Order {
            order_number: "o1".to_string(),
            order_time: 0,
            to_amount: 1100,
            gw_address: "10.0.0.1".to_string(),
            gw_port: 2060,
            gw_id: "GW1".to_string(),
            sta_mac: "AA:BB:CC:DD:EE:FF".to_string(),
        };
        let token = Token::for_order("t".to_string(), &order, Channel::User);
        assert_eq!(token.gw_address, "10.0.0.1");
        assert_eq!(token.gw_port, 2060);
        assert_eq!(token.sta_mac.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(token.order_number.as_deref(), Some("o1"));
        assert_eq!(token.channel, Some(Channel::User));
    }
}
