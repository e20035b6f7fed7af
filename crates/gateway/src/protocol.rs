// WifiDog Protocol Types
//
// Wire shapes of the legacy WifiDog gateway protocol and of the portal
// callbacks: query strings in, plain text or `{ret_code, ret_msg, extra}`
// envelopes out.
//
// Protocol flow:
// 1. Firmware redirects the client to `login`; an order is created
// 2. The user completes one channel; its callback mints a token
// 3. The browser is sent to the firmware's local `auth?token=`
// 4. Firmware asks `auth?stage=login` whether the token exists

use serde::{Deserialize, Serialize};
use std::fmt;
use wifiauth_store::{CounterReport, Heartbeat};

/// Reply envelope of the JSON endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    pub ret_code: i32,
    pub ret_msg: String,
    pub extra: String,
}

impl ApiReply {
    pub const SUCCESS: i32 = 0;
    pub const FAILED: i32 = 1002;

    pub const MSG_INVALID_PARAMS: &'static str = "用户输入参数无效";
    pub const MSG_INVALID_INPUT: &'static str = "用户输入的参数无效";
    pub const MSG_GATEWAY_MISSING: &'static str = "网关设备不存在";
    pub const MSG_SYSTEM_ERROR: &'static str = "系统错误";
    pub const MSG_SMS_UNCONFIGURED: &'static str = "请添加阿里云或者网易云短信配置";
    pub const MSG_BAD_CREDENTIALS: &'static str = "user or password is error";
    pub const MSG_NO_ORDER: &'static str = "no such order";

    pub fn success(extra: impl Into<String>) -> Self {
        Self {
            ret_code: Self::SUCCESS,
            ret_msg: "SUCCESS".to_string(),
            extra: extra.into(),
        }
    }

    pub fn failed(extra: impl Into<String>) -> Self {
        Self {
            ret_code: Self::FAILED,
            ret_msg: "FAILED".to_string(),
            extra: extra.into(),
        }
    }

    pub fn invalid_params() -> Self {
        Self::failed(Self::MSG_INVALID_PARAMS)
    }

    pub fn gateway_missing() -> Self {
        Self::failed(Self::MSG_GATEWAY_MISSING)
    }

    pub fn system_error() -> Self {
        Self::failed(Self::MSG_SYSTEM_ERROR)
    }

    pub fn is_success(&self) -> bool {
        self.ret_code == Self::SUCCESS
    }
}

/// A required query parameter was missing or malformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidParams {
    pub name: &'static str,
}

impl fmt::Display for InvalidParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing or invalid parameter: {}", self.name)
    }
}

impl std::error::Error for InvalidParams {}

fn required(value: &Option<String>, name: &'static str) -> Result<String, InvalidParams> {
    match value {
        Some(v) => Ok(v.clone()),
        None => Err(InvalidParams { name }),
    }
}

/// Counter values arrive as decimal strings; anything else counts as zero
fn counter(value: &Option<String>) -> i64 {
    value
        .as_deref()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

// ============================================================================
// auth stages
// ============================================================================

/// `stage` of `GET|POST /wifidog/auth`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStage {
    Login,
    Counters,
    CountersV2,
    Logout,
    Illegal(String),
}

impl AuthStage {
    pub fn parse(stage: &str) -> Self {
        match stage {
            "login" => Self::Login,
            "counters" => Self::Counters,
            "counters_v2" => Self::CountersV2,
            "logout" => Self::Logout,
            other => Self::Illegal(other.to_string()),
        }
    }
}

/// `Auth: <code>` line the firmware parses
pub fn auth_line(code: i32) -> String {
    format!("Auth: {}", code)
}

pub const ILLEGAL_STAGE: &str = "illegal stage";

// ============================================================================
// Firmware-facing queries
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PingQuery {
    pub gw_id: Option<String>,
    pub sys_uptime: Option<String>,
    pub sys_memfree: Option<String>,
    pub sys_load: Option<String>,
    pub wifidog_uptime: Option<String>,
}

impl PingQuery {
    pub fn heartbeat(&self, remote_address: Option<String>) -> Result<Heartbeat, InvalidParams> {
        Ok(Heartbeat {
            gw_id: required(&self.gw_id, "gw_id")?,
            sys_uptime: self.sys_uptime.as_deref().and_then(|v| v.parse().ok()),
            sys_memfree: self.sys_memfree.as_deref().and_then(|v| v.parse().ok()),
            sys_load: self.sys_load.as_deref().and_then(|v| v.parse().ok()),
            wifidog_uptime: self.wifidog_uptime.as_deref().and_then(|v| v.parse().ok()),
            remote_address,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginQuery {
    pub gw_id: Option<String>,
    pub gw_address: Option<String>,
    pub gw_port: Option<String>,
    pub mac: Option<String>,
    pub ssid: Option<String>,
    pub channel_path: Option<String>,
    pub url: Option<String>,
}

/// Validated `login` request
#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub gw_id: String,
    pub gw_address: String,
    pub gw_port: u16,
    pub sta_mac: String,
    pub ssid: String,
}

impl LoginQuery {
    pub fn validate(&self) -> Result<LoginRequest, InvalidParams> {
        let gw_port = required(&self.gw_port, "gw_port")?
            .trim()
            .parse::<u16>()
            .map_err(|_| InvalidParams { name: "gw_port" })?;
        Ok(LoginRequest {
            gw_id: required(&self.gw_id, "gw_id")?,
            gw_address: required(&self.gw_address, "gw_address")?,
            gw_port,
            sta_mac: required(&self.mac, "mac")?,
            ssid: self.ssid.clone().unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthQuery {
    pub stage: Option<String>,
    pub token: Option<String>,
    pub gw_id: Option<String>,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub incoming: Option<String>,
    pub outgoing: Option<String>,
}

impl AuthQuery {
    pub fn stage(&self) -> Result<AuthStage, InvalidParams> {
        required(&self.stage, "stage").map(|s| AuthStage::parse(&s))
    }

    pub fn counter_report(&self) -> CounterReport {
        CounterReport {
            gw_id: self.gw_id.clone(),
            ip: self.ip.clone(),
            mac: self.mac.clone(),
            token: self.token.clone(),
            incoming: counter(&self.incoming),
            outgoing: counter(&self.outgoing),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfflineQuery {
    pub gw_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortalQuery {
    pub gw_id: Option<String>,
}

impl PortalQuery {
    pub fn validate(&self) -> Result<String, InvalidParams> {
        required(&self.gw_id, "gw_id")
    }
}

// ============================================================================
// Channel callback queries
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeixinQuery {
    pub extend: Option<String>,
    #[serde(rename = "openId")]
    pub open_id: Option<String>,
    pub tid: Option<String>,
    pub sign: Option<String>,
    pub timestamp: Option<String>,
}

impl WeixinQuery {
    pub fn validate(&self) -> Result<wifiauth_channels::WeixinCallback, InvalidParams> {
        Ok(wifiauth_channels::WeixinCallback {
            extend: required(&self.extend, "extend")?,
            open_id: required(&self.open_id, "openId")?,
            tid: required(&self.tid, "tid")?,
            sign: required(&self.sign, "sign")?,
            timestamp: required(&self.timestamp, "timestamp")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WfcQuery {
    pub order_number: Option<String>,
    pub txid: Option<String>,
}

impl WfcQuery {
    /// `(order_number, txid)`
    pub fn validate(&self) -> Result<(String, String), InvalidParams> {
        Ok((
            required(&self.order_number, "orderNumber")?,
            required(&self.txid, "txid")?,
        ))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsSendQuery {
    pub order_number: Option<String>,
    pub phone_number: Option<String>,
    pub client_mac: Option<String>,
}

impl SmsSendQuery {
    /// `(order_number, phone_number)`
    pub fn validate(&self) -> Result<(String, String), InvalidParams> {
        Ok((
            required(&self.order_number, "orderNumber")?,
            required(&self.phone_number, "phoneNumber")?,
        ))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsCheckQuery {
    pub order_number: Option<String>,
    pub phone_number: Option<String>,
    pub check_code: Option<String>,
    pub client_mac: Option<String>,
}

impl SmsCheckQuery {
    pub fn validate(&self) -> Result<(String, wifiauth_channels::SmsCodeCheck), InvalidParams> {
        let order_number = required(&self.order_number, "orderNumber")?;
        Ok((
            order_number,
            wifiauth_channels::SmsCodeCheck {
                phone_number: required(&self.phone_number, "phoneNumber")?,
                check_code: required(&self.check_code, "checkCode")?,
            },
        ))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub order_number: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl UserQuery {
    pub fn validate(&self) -> Result<(String, wifiauth_channels::Credentials), InvalidParams> {
        let order_number = required(&self.order_number, "orderNumber")?;
        Ok((
            order_number,
            wifiauth_channels::Credentials {
                user: required(&self.user, "user")?,
                password: required(&self.password, "password")?,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_parse_with_illegal_fallback() {
        assert_eq!(AuthStage::parse("login"), AuthStage::Login);
        assert_eq!(AuthStage::parse("counters"), AuthStage::Counters);
        assert_eq!(AuthStage::parse("counters_v2"), AuthStage::CountersV2);
        assert_eq!(AuthStage::parse("logout"), AuthStage::Logout);
        assert_eq!(
            AuthStage::parse("LOGIN"),
            AuthStage::Illegal("LOGIN".to_string())
        );
    }

    #[test]
    fn envelope_serializes_with_wire_names() {
        let json = serde_json::to_value(ApiReply::invalid_params()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"ret_code": 1002, "ret_msg": "FAILED", "extra": "用户输入参数无效"})
        );
        assert!(ApiReply::success("x").is_success());
    }

    #[test]
    fn login_requires_gateway_identity() {
        let query = LoginQuery {
            gw_id: Some("GW1".to_string()),
            gw_address: Some("10.0.0.1".to_string()),
            gw_port: Some("2060".to_string()),
            mac: Some("AA".to_string()),
            ..Default::default()
        };
        let request = query.validate().unwrap();
        assert_eq!(request.gw_port, 2060);
        assert_eq!(request.ssid, "");

        let mut missing = query.clone();
        missing.mac = None;
        assert_eq!(missing.validate().unwrap_err().name, "mac");

        let mut bad_port = query;
        bad_port.gw_port = Some("http".to_string());
        assert_eq!(bad_port.validate().unwrap_err().name, "gw_port");
    }

    #[test]
    fn counters_tolerate_garbage_numbers() {
        let query = AuthQuery {
            stage: Some("counters".to_string()),
            incoming: Some("42".to_string()),
            outgoing: Some("n/a".to_string()),
            ..Default::default()
        };
        let report = query.counter_report();
        assert_eq!(report.incoming, 42);
        assert_eq!(report.outgoing, 0);
    }

    #[test]
    fn weixin_callback_needs_every_field() {
        let query = WeixinQuery {
            extend: Some("o1".to_string()),
            open_id: Some("oid".to_string()),
            tid: Some("t".to_string()),
            sign: Some("s".to_string()),
            timestamp: None,
        };
        assert_eq!(query.validate().unwrap_err().name, "timestamp");
    }
}
