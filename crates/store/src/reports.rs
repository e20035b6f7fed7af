//! Reports gateway firmware pushes for bookkeeping (`ping`, `counters`,
//! `counters_v2`).

use serde::{Deserialize, Serialize};

/// Heartbeat carried by `GET /wifidog/ping`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heartbeat {
    pub gw_id: String,
    pub sys_uptime: Option<i64>,
    pub sys_memfree: Option<i64>,
    pub sys_load: Option<f64>,
    pub wifidog_uptime: Option<i64>,
    pub remote_address: Option<String>,
}

/// Counters carried by `GET /wifidog/auth?stage=counters`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterReport {
    pub gw_id: Option<String>,
    pub ip: Option<String>,
    pub mac: Option<String>,
    pub token: Option<String>,
    pub incoming: i64,
    pub outgoing: i64,
}

/// Body of `POST /wifidog/auth?stage=counters_v2`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountersV2Report {
    #[serde(default)]
    pub gw_id: String,
    #[serde(default)]
    pub clients: Vec<CountersV2Client>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountersV2Client {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub incoming: i64,
    #[serde(default)]
    pub outgoing: i64,
}

/// Reply to `counters_v2`: tells the firmware which clients stay allowed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountersV2Reply {
    pub gw_id: String,
    pub auth_op: Vec<AuthOp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthOp {
    pub id: i64,
    /// 1 keeps the client online, 0 logs it out
    pub auth_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_v2_report_tolerates_missing_fields() {
        let body = r#"{"gw_id":"GW1","clients":[{"id":3,"mac":"AA","incoming":10}]}"#;
        let report: CountersV2Report = serde_json::from_str(body).unwrap();
        assert_eq!(report.gw_id, "GW1");
        assert_eq!(report.clients.len(), 1);
        assert_eq!(report.clients[0].id, 3);
        assert_eq!(report.clients[0].outgoing, 0);
        assert!(report.clients[0].token.is_none());
    }
}
