use crate::handlers;
use crate::orders::OrderManager;
use crate::token::TokenIssuer;
use anyhow::{Context, Result};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use wifiauth_channels::{
    http_client, AliyunSms, InsightExplorer, NeteaseSms, PasswordChannel, SmsChannel,
    WeixinChannel, WfcChannel,
};
use wifiauth_core::Config;
use wifiauth_store::{
    ClientRegistry, DeviceRegistry, GatewaySettings, OrderRepository, TokenRepository,
};

/// Shared state handed to every handler
pub struct AppState {
    pub config: Config,
    pub orders: OrderManager,
    pub issuer: TokenIssuer,
    pub settings: Arc<dyn GatewaySettings>,
    pub devices: Arc<dyn DeviceRegistry>,
    pub clients: Arc<dyn ClientRegistry>,
    pub wfc: WfcChannel,
    pub weixin: WeixinChannel,
    pub sms: SmsChannel,
    pub password: PasswordChannel,
}

impl AppState {
    /// Wire every component over one store, with the providers the
    /// configuration points at
    pub fn new<S>(config: Config, store: Arc<S>) -> Self
    where
        S: OrderRepository
            + TokenRepository
            + GatewaySettings
            + DeviceRegistry
            + ClientRegistry
            + 'static,
    {
        let client = http_client(config.http_timeout_secs);
        let explorer = Arc::new(InsightExplorer::new(
            client.clone(),
            config.explorer.insight_api.clone(),
        ));
        let aliyun = Arc::new(AliyunSms::new(
            client.clone(),
            config.sms.aliyun_endpoint.clone(),
        ));
        let netease = Arc::new(NeteaseSms::new(client, config.sms.netease_endpoint.clone()));

        Self {
            orders: OrderManager::new(store.clone(), store.clone()),
            issuer: TokenIssuer::new(store.clone()),
            settings: store.clone(),
            devices: store.clone(),
            clients: store.clone(),
            wfc: WfcChannel::new(explorer),
            weixin: WeixinChannel::new(),
            sms: SmsChannel::new(store.clone(), store.clone(), aliyun, netease),
            password: PasswordChannel::new(store),
            config,
        }
    }
}

/// Build the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/wifidog/ping", get(handlers::ping))
        .route("/wifidog/login", get(handlers::login))
        .route("/wifidog/auth", get(handlers::auth).post(handlers::auth))
        .route("/wifidog/offline", get(handlers::offline))
        .route("/wifidog/portal", get(handlers::portal))
        .route("/wifidog/auth/weixin", get(handlers::auth_weixin))
        .route("/wifidog/auth/wfc", get(handlers::auth_wfc))
        .route("/wifidog/auth/sms", get(handlers::auth_sms))
        .route("/wifidog/auth/sms/check", get(handlers::auth_sms_check))
        .route("/wifidog/auth/user", get(handlers::auth_user))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Gateway server
pub struct GatewayServer {
    state: Arc<AppState>,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Bind the configured address and serve until Ctrl-C
    pub async fn start(self) -> Result<()> {
        let server = &self.state.config.server;
        let addr = format!("{}:{}", server.host, server.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        tracing::info!("Auth server listening on {}", addr);

        let app = create_router(self.state.clone());
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

        tracing::info!("Auth server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
