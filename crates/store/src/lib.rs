//! wifiauth_store
//!
//! Repository traits the authentication core depends on, plus a SQLite
//! implementation of all of them. The core only ever sees the traits, so
//! handlers and channel adapters receive their repositories as
//! `Arc<dyn Trait>` and hold no state of their own.

pub mod reports;
pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;
use wifiauth_core::{GatewaySetting, Order, Token, WifiAuthError};

pub use reports::{
    AuthOp, CounterReport, CountersV2Client, CountersV2Reply, CountersV2Report, Heartbeat,
};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("store task failed: {0}")]
    Task(String),
}

impl From<StoreError> for WifiAuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => WifiAuthError::from(e),
            StoreError::Database(e) => WifiAuthError::from(e),
            StoreError::Json(e) => WifiAuthError::from(e),
            StoreError::InvalidRecord(msg) | StoreError::Task(msg) => WifiAuthError::Other(msg),
        }
    }
}

/// Orders keyed by order number
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Insert, or overwrite every field of the order with the same number
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn find_order(&self, order_number: &str) -> Result<Option<Order>, StoreError>;
}

/// Tokens keyed by token value
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Insert, or overwrite the token with the same value
    async fn upsert_token(&self, token: &Token) -> Result<(), StoreError>;

    async fn find_token(&self, token: &str) -> Result<Option<Token>, StoreError>;

    async fn token_exists(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.find_token(token).await?.is_some())
    }
}

/// Read-only view of per-gateway channel configuration
#[async_trait]
pub trait GatewaySettings: Send + Sync {
    async fn gateway_setting(&self, gw_id: &str) -> Result<Option<GatewaySetting>, StoreError>;
}

/// Device heartbeat bookkeeping
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    async fn record_heartbeat(&self, heartbeat: &Heartbeat) -> Result<(), StoreError>;

    async fn mark_offline(&self, gw_id: &str) -> Result<(), StoreError>;
}

/// Client traffic-counter bookkeeping
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Legacy `counters` stage; the returned code is sent back as `Auth: <code>`
    async fn update_counters(&self, report: &CounterReport) -> Result<i32, StoreError>;

    /// `counters_v2` stage; one auth op per reported client
    async fn update_counters_v2(
        &self,
        report: &CountersV2Report,
    ) -> Result<CountersV2Reply, StoreError>;
}
