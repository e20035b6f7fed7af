use wifiauth_core::{Channel, GatewaySetting, Order, Token};
use wifiauth_store::{GatewaySettings, OrderRepository, SqliteStore, TokenRepository};

fn order() -> Order {
    Order {
        order_number: "9f1c".to_string(),
        order_time: 1_700_000_000,
        to_amount: 1500,
        gw_address: "192.168.1.1".to_string(),
        gw_port: 2060,
        gw_id: "GW1".to_string(),
        sta_mac: "AA:BB:CC:DD:EE:FF".to_string(),
    }
}

#[tokio::test]
async fn store_persists_across_reopen() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("wifiauth.db");

    {
        let store = SqliteStore::open(&path).expect("open");
        store.upsert_order(&order()).await.expect("order");
        let token = Token::for_order("tok".to_string(), &order(), Channel::Wfc);
        store.upsert_token(&token).await.expect("token");
        store
            .put_gateway_setting(&GatewaySetting::new("GW1"))
            .await
            .expect("setting");
    }

    let store = SqliteStore::open(&path).expect("reopen");
    assert_eq!(store.find_order("9f1c").await.unwrap(), Some(order()));
    assert!(store.token_exists("tok").await.unwrap());
    assert!(store.gateway_setting("GW1").await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_token_upserts_leave_one_record() {
    let store = SqliteStore::open_in_memory().expect("open");
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let token = Token::for_order("same".to_string(), &order(), Channel::User);
            store.upsert_token(&token).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    let token = store.find_token("same").await.unwrap().unwrap();
    assert_eq!(token.channel, Some(Channel::User));
}
