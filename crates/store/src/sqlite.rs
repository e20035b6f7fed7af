//! SQLite implementation of every repository trait.
//!
//! One connection behind a mutex. Statements run on tokio's blocking pool and
//! each one completes before the next starts, which serializes concurrent
//! upserts.

use crate::reports::{AuthOp, CounterReport, CountersV2Reply, CountersV2Report, Heartbeat};
use crate::{
    ClientRegistry, DeviceRegistry, GatewaySettings, OrderRepository, StoreError, TokenRepository,
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use wifiauth_core::{unix_now, Channel, Client, Device, GatewaySetting, Order, Token};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    order_number TEXT PRIMARY KEY,
    order_time   INTEGER NOT NULL,
    to_amount    INTEGER NOT NULL,
    gw_address   TEXT NOT NULL,
    gw_port      INTEGER NOT NULL,
    gw_id        TEXT NOT NULL,
    sta_mac      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS tokens (
    token        TEXT PRIMARY KEY,
    order_number TEXT,
    start_time   INTEGER NOT NULL,
    gw_address   TEXT NOT NULL,
    gw_port      INTEGER NOT NULL,
    gw_id        TEXT NOT NULL,
    sta_mac      TEXT,
    channel      TEXT,
    phone_number TEXT,
    check_code   TEXT,
    tid          TEXT
);
CREATE TABLE IF NOT EXISTS gateway_settings (
    gw_id   TEXT PRIMARY KEY,
    setting TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS devices (
    gw_id          TEXT PRIMARY KEY,
    sys_uptime     INTEGER,
    sys_memfree    INTEGER,
    sys_load       REAL,
    wifidog_uptime INTEGER,
    remote_address TEXT,
    last_seen      INTEGER NOT NULL,
    online         INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS clients (
    gw_id     TEXT NOT NULL,
    mac       TEXT NOT NULL,
    ip        TEXT,
    token     TEXT,
    name      TEXT,
    incoming  INTEGER NOT NULL DEFAULT 0,
    outgoing  INTEGER NOT NULL DEFAULT 0,
    last_seen INTEGER NOT NULL,
    PRIMARY KEY (gw_id, mac)
);
"#;

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        tracing::info!("Opened store at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool
    async fn call<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| StoreError::Task("connection lock poisoned".to_string()))?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }

    /// Register or replace a gateway's channel configuration
    pub async fn put_gateway_setting(&self, setting: &GatewaySetting) -> Result<(), StoreError> {
        if setting.gw_id.trim().is_empty() {
            return Err(StoreError::InvalidRecord(
                "gateway setting needs a gw_id".to_string(),
            ));
        }
        let json = serde_json::to_string(setting)?;
        let gw_id = setting.gw_id.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO gateway_settings (gw_id, setting) VALUES (?1, ?2)
                 ON CONFLICT(gw_id) DO UPDATE SET setting = excluded.setting",
                params![gw_id, json],
            )?;
            tracing::info!("Gateway setting stored for {}", gw_id);
            Ok(())
        })
        .await
    }

    pub async fn list_gateway_ids(&self) -> Result<Vec<String>, StoreError> {
        self.call(|conn| {
            let mut stmt = conn.prepare("SELECT gw_id FROM gateway_settings ORDER BY gw_id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })
        .await
    }

    pub async fn device(&self, gw_id: &str) -> Result<Option<Device>, StoreError> {
        let gw_id = gw_id.to_string();
        self.call(move |conn| {
            let device = conn
                .query_row(
                    "SELECT gw_id, sys_uptime, sys_memfree, sys_load, wifidog_uptime,
                            remote_address, last_seen, online
                     FROM devices WHERE gw_id = ?1",
                    params![gw_id],
                    |row| {
                        Ok(Device {
                            gw_id: row.get(0)?,
                            sys_uptime: row.get(1)?,
                            sys_memfree: row.get(2)?,
                            sys_load: row.get(3)?,
                            wifidog_uptime: row.get(4)?,
                            remote_address: row.get(5)?,
                            last_seen: row.get(6)?,
                            online: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(device)
        })
        .await
    }

    pub async fn client(&self, gw_id: &str, mac: &str) -> Result<Option<Client>, StoreError> {
        let (gw_id, mac) = (gw_id.to_string(), mac.to_string());
        self.call(move |conn| {
            let client = conn
                .query_row(
                    "SELECT gw_id, mac, ip, token, name, incoming, outgoing, last_seen
                     FROM clients WHERE gw_id = ?1 AND mac = ?2",
                    params![gw_id, mac],
                    |row| {
                        Ok(Client {
                            gw_id: row.get(0)?,
                            mac: row.get(1)?,
                            ip: row.get(2)?,
                            token: row.get(3)?,
                            name: row.get(4)?,
                            incoming: row.get(5)?,
                            outgoing: row.get(6)?,
                            last_seen: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(client)
        })
        .await
    }
}

fn order_from_row(row: &Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        order_number: row.get(0)?,
        order_time: row.get(1)?,
        to_amount: row.get(2)?,
        gw_address: row.get(3)?,
        gw_port: row.get(4)?,
        gw_id: row.get(5)?,
        sta_mac: row.get(6)?,
    })
}

fn token_from_row(row: &Row<'_>) -> rusqlite::Result<Token> {
    let channel: Option<String> = row.get(7)?;
    Ok(Token {
        token: row.get(0)?,
        order_number: row.get(1)?,
        start_time: row.get(2)?,
        gw_address: row.get(3)?,
        gw_port: row.get(4)?,
        gw_id: row.get(5)?,
        sta_mac: row.get(6)?,
        channel: channel.as_deref().and_then(Channel::parse),
        phone_number: row.get(8)?,
        check_code: row.get(9)?,
        tid: row.get(10)?,
    })
}

/// Upsert a client row and return whether its token is currently granted
#[allow(clippy::too_many_arguments)]
fn touch_client(
    conn: &Connection,
    gw_id: &str,
    mac: &str,
    ip: Option<&str>,
    token: Option<&str>,
    name: Option<&str>,
    incoming: i64,
    outgoing: i64,
) -> rusqlite::Result<bool> {
    conn.execute(
        "INSERT INTO clients (gw_id, mac, ip, token, name, incoming, outgoing, last_seen)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(gw_id, mac) DO UPDATE SET
             ip = COALESCE(excluded.ip, clients.ip),
             token = COALESCE(excluded.token, clients.token),
             name = COALESCE(excluded.name, clients.name),
             incoming = excluded.incoming,
             outgoing = excluded.outgoing,
             last_seen = excluded.last_seen",
        params![gw_id, mac, ip, token, name, incoming, outgoing, unix_now()],
    )?;

    match token {
        Some(token) => token_granted(conn, token),
        None => Ok(false),
    }
}

fn token_granted(conn: &Connection, token: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM tokens WHERE token = ?1",
        params![token],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

#[async_trait]
impl OrderRepository for SqliteStore {
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        let order = order.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO orders (order_number, order_time, to_amount, gw_address, gw_port, gw_id, sta_mac)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(order_number) DO UPDATE SET
                     order_time = excluded.order_time,
                     to_amount = excluded.to_amount,
                     gw_address = excluded.gw_address,
                     gw_port = excluded.gw_port,
                     gw_id = excluded.gw_id,
                     sta_mac = excluded.sta_mac",
                params![
                    order.order_number,
                    order.order_time,
                    order.to_amount,
                    order.gw_address,
                    order.gw_port,
                    order.gw_id,
                    order.sta_mac
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_order(&self, order_number: &str) -> Result<Option<Order>, StoreError> {
        let order_number = order_number.to_string();
        self.call(move |conn| {
            let order = conn
                .query_row(
                    "SELECT order_number, order_time, to_amount, gw_address, gw_port, gw_id, sta_mac
                     FROM orders WHERE order_number = ?1",
                    params![order_number],
                    order_from_row,
                )
                .optional()?;
            Ok(order)
        })
        .await
    }
}

#[async_trait]
impl TokenRepository for SqliteStore {
    async fn upsert_token(&self, token: &Token) -> Result<(), StoreError> {
        let token = token.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO tokens (token, order_number, start_time, gw_address, gw_port, gw_id,
                                     sta_mac, channel, phone_number, check_code, tid)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(token) DO UPDATE SET
                     order_number = excluded.order_number,
                     start_time = excluded.start_time,
                     gw_address = excluded.gw_address,
                     gw_port = excluded.gw_port,
                     gw_id = excluded.gw_id,
                     sta_mac = excluded.sta_mac,
                     channel = excluded.channel,
                     phone_number = excluded.phone_number,
                     check_code = excluded.check_code,
                     tid = excluded.tid",
                params![
                    token.token,
                    token.order_number,
                    token.start_time,
                    token.gw_address,
                    token.gw_port,
                    token.gw_id,
                    token.sta_mac,
                    token.channel.map(|c| c.as_str()),
                    token.phone_number,
                    token.check_code,
                    token.tid
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn find_token(&self, token: &str) -> Result<Option<Token>, StoreError> {
        let token = token.to_string();
        self.call(move |conn| {
            let found = conn
                .query_row(
                    "SELECT token, order_number, start_time, gw_address, gw_port, gw_id,
                            sta_mac, channel, phone_number, check_code, tid
                     FROM tokens WHERE token = ?1",
                    params![token],
                    token_from_row,
                )
                .optional()?;
            Ok(found)
        })
        .await
    }
}

#[async_trait]
impl GatewaySettings for SqliteStore {
    async fn gateway_setting(&self, gw_id: &str) -> Result<Option<GatewaySetting>, StoreError> {
        let gw_id = gw_id.to_string();
        let raw: Option<String> = self
            .call(move |conn| {
                let raw = conn
                    .query_row(
                        "SELECT setting FROM gateway_settings WHERE gw_id = ?1",
                        params![gw_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(raw)
            })
            .await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl DeviceRegistry for SqliteStore {
    async fn record_heartbeat(&self, heartbeat: &Heartbeat) -> Result<(), StoreError> {
        let heartbeat = heartbeat.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO devices (gw_id, sys_uptime, sys_memfree, sys_load, wifidog_uptime,
                                      remote_address, last_seen, online)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
                 ON CONFLICT(gw_id) DO UPDATE SET
                     sys_uptime = excluded.sys_uptime,
                     sys_memfree = excluded.sys_memfree,
                     sys_load = excluded.sys_load,
                     wifidog_uptime = excluded.wifidog_uptime,
                     remote_address = excluded.remote_address,
                     last_seen = excluded.last_seen,
                     online = 1",
                params![
                    heartbeat.gw_id,
                    heartbeat.sys_uptime,
                    heartbeat.sys_memfree,
                    heartbeat.sys_load,
                    heartbeat.wifidog_uptime,
                    heartbeat.remote_address,
                    unix_now()
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn mark_offline(&self, gw_id: &str) -> Result<(), StoreError> {
        let gw_id = gw_id.to_string();
        self.call(move |conn| {
            let updated = conn.execute(
                "UPDATE devices SET online = 0, last_seen = ?2 WHERE gw_id = ?1",
                params![gw_id, unix_now()],
            )?;
            if updated == 0 {
                tracing::debug!("Offline notice for unknown device {}", gw_id);
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ClientRegistry for SqliteStore {
    async fn update_counters(&self, report: &CounterReport) -> Result<i32, StoreError> {
        let report = report.clone();
        self.call(move |conn| {
            let granted = match (report.gw_id.as_deref(), report.mac.as_deref()) {
                (Some(gw_id), Some(mac)) => touch_client(
                    conn,
                    gw_id,
                    mac,
                    report.ip.as_deref(),
                    report.token.as_deref(),
                    None,
                    report.incoming,
                    report.outgoing,
                )?,
                // Nothing to attribute the counters to; answer on the token alone.
                _ => match report.token.as_deref() {
                    Some(token) => token_granted(conn, token)?,
                    None => false,
                },
            };
            Ok(i32::from(granted))
        })
        .await
    }

    async fn update_counters_v2(
        &self,
        report: &CountersV2Report,
    ) -> Result<CountersV2Reply, StoreError> {
        let report = report.clone();
        self.call(move |conn| {
            let mut auth_op = Vec::with_capacity(report.clients.len());
            for client in &report.clients {
                let granted = touch_client(
                    conn,
                    &report.gw_id,
                    &client.mac,
                    client.ip.as_deref(),
                    client.token.as_deref(),
                    client.name.as_deref(),
                    client.incoming,
                    client.outgoing,
                )?;
                auth_op.push(AuthOp {
                    id: client.id,
                    auth_code: i32::from(granted),
                });
            }
            Ok(CountersV2Reply {
                gw_id: report.gw_id,
                auth_op,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reports::CountersV2Client;

    fn order(number: &str, to_amount: i64) -> Order {
        Order {
            order_number: number.to_string(),
            order_time: 1_700_000_000,
            to_amount,
            gw_address: "10.0.0.1".to_string(),
            gw_port: 2060,
            gw_id: "GW1".to_string(),
            sta_mac: "AA:BB:CC:DD:EE:FF".to_string(),
        }
    }

    fn token(value: &str) -> Token {
        Token::for_order(value.to_string(), &order("o1", 1100), Channel::Wfc)
    }

    #[tokio::test]
    async fn order_upsert_overwrites_instead_of_duplicating() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_order(&order("o1", 1100)).await.unwrap();
        store.upsert_order(&order("o1", 2200)).await.unwrap();

        let found = store.find_order("o1").await.unwrap().unwrap();
        assert_eq!(found.to_amount, 2200);

        let count: i64 = store
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.find_order("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn token_roundtrip_keeps_channel_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut t = token("abc");
        t.channel = Some(Channel::Sms);
        t.phone_number = Some("13800000000".to_string());
        t.check_code = Some("0420".to_string());
        store.upsert_token(&t).await.unwrap();

        let found = store.find_token("abc").await.unwrap().unwrap();
        assert_eq!(found, t);
        assert!(store.token_exists("abc").await.unwrap());
        assert!(!store.token_exists("other").await.unwrap());
    }

    #[tokio::test]
    async fn gateway_setting_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut setting = GatewaySetting::new("GW1");
        setting.wificoin.enable = true;
        setting.wificoin.to_amount = 100;
        store.put_gateway_setting(&setting).await.unwrap();

        assert_eq!(store.gateway_setting("GW1").await.unwrap(), Some(setting));
        assert!(store.gateway_setting("GW2").await.unwrap().is_none());
        assert_eq!(store.list_gateway_ids().await.unwrap(), vec!["GW1"]);
    }

    #[tokio::test]
    async fn gateway_setting_requires_id() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.put_gateway_setting(&GatewaySetting::new(" ")).await;
        assert!(matches!(result, Err(StoreError::InvalidRecord(_))));
    }

    #[tokio::test]
    async fn heartbeat_then_offline() {
        let store = SqliteStore::open_in_memory().unwrap();
        let heartbeat = Heartbeat {
            gw_id: "GW1".to_string(),
            sys_uptime: Some(120),
            sys_load: Some(0.5),
            ..Default::default()
        };
        store.record_heartbeat(&heartbeat).await.unwrap();
        let device = store.device("GW1").await.unwrap().unwrap();
        assert!(device.online);
        assert_eq!(device.sys_uptime, Some(120));

        store.mark_offline("GW1").await.unwrap();
        assert!(!store.device("GW1").await.unwrap().unwrap().online);

        // unknown devices are ignored
        store.mark_offline("GW9").await.unwrap();
    }

    #[tokio::test]
    async fn counters_answer_with_token_existence() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_token(&token("granted")).await.unwrap();

        let mut report = CounterReport {
            gw_id: Some("GW1".to_string()),
            mac: Some("AA".to_string()),
            token: Some("granted".to_string()),
            incoming: 10,
            outgoing: 20,
            ..Default::default()
        };
        assert_eq!(store.update_counters(&report).await.unwrap(), 1);
        let client = store.client("GW1", "AA").await.unwrap().unwrap();
        assert_eq!(client.incoming, 10);
        assert_eq!(client.outgoing, 20);

        report.token = Some("unknown".to_string());
        assert_eq!(store.update_counters(&report).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn counters_v2_reply_has_one_op_per_client() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.upsert_token(&token("granted")).await.unwrap();

        let report = CountersV2Report {
            gw_id: "GW1".to_string(),
            clients: vec![
                CountersV2Client {
                    id: 1,
                    mac: "AA".to_string(),
                    token: Some("granted".to_string()),
                    ..Default::default()
                },
                CountersV2Client {
                    id: 2,
                    mac: "BB".to_string(),
                    token: Some("stale".to_string()),
                    ..Default::default()
                },
            ],
        };
        let reply = store.update_counters_v2(&report).await.unwrap();
        assert_eq!(reply.gw_id, "GW1");
        assert_eq!(
            reply.auth_op,
            vec![
                AuthOp { id: 1, auth_code: 1 },
                AuthOp { id: 2, auth_code: 0 }
            ]
        );
    }
}
