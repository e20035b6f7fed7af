// Order Manager
//
// Creates priced access orders on `login` and resolves them for callbacks.

use crate::protocol::LoginRequest;
use rand::Rng;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info};
use wifiauth_core::{unix_now, GatewaySetting, Order, WifiAuthError};
use wifiauth_store::{GatewaySettings, OrderRepository};

/// Random offset added to the base price so concurrent orders of one
/// gateway can be told apart by amount alone
pub const AMOUNT_OFFSET: RangeInclusive<i64> = 1000..=9998;

pub fn random_offset() -> i64 {
    rand::thread_rng().gen_range(AMOUNT_OFFSET)
}

pub fn new_order_number() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub struct OrderManager {
    settings: Arc<dyn GatewaySettings>,
    orders: Arc<dyn OrderRepository>,
}

impl OrderManager {
    pub fn new(settings: Arc<dyn GatewaySettings>, orders: Arc<dyn OrderRepository>) -> Self {
        Self { settings, orders }
    }

    /// Create and persist a fresh order for the client behind `request`.
    ///
    /// Fails with a gateway-not-registered domain error when the gateway has
    /// no channel configuration.
    pub async fn create_order(
        &self,
        request: &LoginRequest,
    ) -> Result<(Order, GatewaySetting), WifiAuthError> {
        let setting = self
            .settings
            .gateway_setting(&request.gw_id)
            .await?
            .ok_or_else(|| WifiAuthError::gateway_not_registered(&request.gw_id))?;

        let order = Order {
            order_number: new_order_number(),
            order_time: unix_now(),
            to_amount: setting.wificoin.to_amount + random_offset(),
            gw_address: request.gw_address.clone(),
            gw_port: request.gw_port,
            gw_id: request.gw_id.clone(),
            sta_mac: request.sta_mac.clone(),
        };
        self.orders.upsert_order(&order).await?;

        info!(
            "Order {} created for {} on {} (amount {})",
            order.order_number, order.sta_mac, order.gw_id, order.to_amount
        );
        Ok((order, setting))
    }

    pub async fn find_order(&self, order_number: &str) -> Result<Option<Order>, WifiAuthError> {
        let order = self.orders.find_order(order_number).await?;
        if order.is_none() {
            debug!("Order {} not found", order_number);
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wifiauth_store::SqliteStore;

    fn request(gw_id: &str) -> LoginRequest {
        LoginRequest {
            gw_id: gw_id.to_string(),
            gw_address: "10.0.0.1".to_string(),
            gw_port: 2060,
            sta_mac: "AA:BB:CC:DD:EE:FF".to_string(),
            ssid: String::new(),
        }
    }

    async fn manager() -> OrderManager {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let mut setting = GatewaySetting::new("GW1");
        setting.wificoin.to_amount = 100;
        store.put_gateway_setting(&setting).await.unwrap();
        OrderManager::new(store.clone(), store)
    }

    #[test]
    fn offsets_stay_in_range() {
        for _ in 0..1000 {
            assert!(AMOUNT_OFFSET.contains(&random_offset()));
        }
    }

    #[test]
    fn order_numbers_are_unique_simple_uuids() {
        let a = new_order_number();
        let b = new_order_number();
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
        assert!(!a.contains('-'));
    }

    #[tokio::test]
    async fn create_order_prices_and_persists() {
        let manager = manager().await;
        let (order, setting) = manager.create_order(&request("GW1")).await.unwrap();
        assert_eq!(setting.gw_id, "GW1");
        assert!((1100..=10098).contains(&order.to_amount));
        assert_eq!(order.gw_port, 2060);

        let found = manager.find_order(&order.order_number).await.unwrap();
        assert_eq!(found, Some(order));
    }

    #[tokio::test]
    async fn unknown_gateway_is_a_domain_error() {
        let manager = manager().await;
        let err = manager.create_order(&request("GW9")).await.unwrap_err();
        assert!(err.is_domain());
        assert!(manager.find_order("nope").await.unwrap().is_none());
    }
}
