// Gateway HTTP Handlers
//
// One handler per WifiDog endpoint and per channel callback. Every handler
// validates its query first and answers the invalid-parameter envelope
// before touching the store.

use crate::page::LoginPage;
use crate::protocol::*;
use crate::server::AppState;
use crate::token::TokenExtras;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use wifiauth_channels::{ChannelError, PaymentProof, VerificationChannel, VerificationOutcome};
use wifiauth_core::{Channel, DomainError, Order, WifiAuthError};
use wifiauth_store::CountersV2Report;

/// Plain-text reply of the wallet callback when the payment is not found
pub const PAY_ERROR: &str = "pay error!";

fn invalid(err: InvalidParams) -> Response {
    debug!("Rejected request: {}", err);
    Json(ApiReply::invalid_params()).into_response()
}

/// Unwrap the query string, or answer the invalid-parameter envelope when it
/// does not deserialize (duplicated keys, bad numbers)
fn parsed<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    query.map(|Query(query)| query).map_err(|e| {
        debug!("Rejected query string: {}", e);
        Json(ApiReply::invalid_params()).into_response()
    })
}

/// 302 to `location`
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Envelope for an error raised by the core
fn failure_reply(err: WifiAuthError) -> ApiReply {
    match err {
        WifiAuthError::Domain(DomainError::GatewayNotRegistered { gw_id }) => {
            warn!("Gateway {} is not registered", gw_id);
            ApiReply::gateway_missing()
        }
        WifiAuthError::Domain(DomainError::OrderNotFound { .. }) => {
            ApiReply::failed(ApiReply::MSG_NO_ORDER)
        }
        WifiAuthError::Domain(DomainError::InvalidParameter { .. }) => ApiReply::invalid_params(),
        other => {
            error!("Request failed: {}", other);
            ApiReply::system_error()
        }
    }
}

/// Envelope for an error raised by a verification channel
fn channel_failure(err: ChannelError) -> ApiReply {
    match err {
        ChannelError::GatewayNotRegistered { .. } => ApiReply::gateway_missing(),
        ChannelError::SmsNotConfigured { .. } => ApiReply::failed(ApiReply::MSG_SMS_UNCONFIGURED),
        ChannelError::Network { .. } | ChannelError::Provider { .. } => {
            warn!("Provider call failed: {}", err);
            ApiReply::failed(err.to_string())
        }
        ChannelError::Store(e) => failure_reply(e.into()),
    }
}

/// Resolve an order for a JSON callback; `Err` carries the ready reply
async fn order_for_envelope(state: &AppState, order_number: &str) -> Result<Order, Response> {
    match state.orders.find_order(order_number).await {
        Ok(Some(order)) => Ok(order),
        Ok(None) => Err(Json(ApiReply::failed(ApiReply::MSG_NO_ORDER)).into_response()),
        Err(e) => Err(Json(failure_reply(e)).into_response()),
    }
}

/// Resolve an order for a browser-redirect callback
async fn order_for_redirect(state: &AppState, order_number: &str) -> Result<Order, Response> {
    match state.orders.find_order(order_number).await {
        Ok(Some(order)) => Ok(order),
        Ok(None) => Err(ApiReply::MSG_NO_ORDER.into_response()),
        Err(e) => Err(Json(failure_reply(e)).into_response()),
    }
}

/// Issue the token, then answer with the auth URL in the envelope
async fn issue_envelope(
    state: &AppState,
    order: &Order,
    channel: Channel,
    extras: TokenExtras,
) -> Response {
    match state.issuer.issue(order, channel, extras).await {
        Ok(url) => Json(ApiReply::success(url)).into_response(),
        Err(e) => Json(failure_reply(e.into())).into_response(),
    }
}

/// Issue the token, then send the browser to the firmware
async fn issue_redirect(
    state: &AppState,
    order: &Order,
    channel: Channel,
    extras: TokenExtras,
) -> Response {
    match state.issuer.issue(order, channel, extras).await {
        Ok(url) => found(&url),
        Err(e) => Json(failure_reply(e.into())).into_response(),
    }
}

// ============================================================================
// WifiDog protocol
// ============================================================================

/// GET /wifidog/ping
pub async fn ping(
    State(state): State<Arc<AppState>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    query: Result<Query<PingQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let remote_address = remote.map(|ConnectInfo(addr)| addr.ip().to_string());
    let heartbeat = match query.heartbeat(remote_address) {
        Ok(heartbeat) => heartbeat,
        Err(e) => return invalid(e),
    };
    if let Err(e) = state.devices.record_heartbeat(&heartbeat).await {
        error!("Heartbeat from {} not recorded: {}", heartbeat.gw_id, e);
    }
    "Pong".into_response()
}

/// GET /wifidog/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LoginQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let request = match query.validate() {
        Ok(request) => request,
        Err(e) => return invalid(e),
    };
    debug!(
        "Login from {} on {} (channel_path {:?}, url {:?})",
        request.sta_mac, request.gw_id, query.channel_path, query.url
    );

    let (order, setting) = match state.orders.create_order(&request).await {
        Ok(created) => created,
        Err(e) => return Json(failure_reply(e)).into_response(),
    };

    let timestamp_ms = chrono::Utc::now().timestamp_millis();
    let page = LoginPage::new(
        &state.config.portal,
        &setting,
        &order,
        &request.ssid,
        timestamp_ms,
    );
    Html(page.render()).into_response()
}

/// GET|POST /wifidog/auth
pub async fn auth(
    State(state): State<Arc<AppState>>,
    query: Result<Query<AuthQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let stage = match query.stage() {
        Ok(stage) => stage,
        Err(e) => return invalid(e),
    };
    debug!("auth stage {:?}", stage);

    match stage {
        AuthStage::Login => {
            let Some(token) = query.token.as_deref() else {
                return auth_line(0).into_response();
            };
            match state.issuer.is_granted(token).await {
                Ok(granted) => auth_line(i32::from(granted)).into_response(),
                Err(e) => {
                    error!("Token lookup failed: {}", e);
                    auth_line(0).into_response()
                }
            }
        }
        AuthStage::Counters => match state.clients.update_counters(&query.counter_report()).await {
            Ok(code) => auth_line(code).into_response(),
            Err(e) => Json(failure_reply(e.into())).into_response(),
        },
        AuthStage::CountersV2 => {
            let report: CountersV2Report = match serde_json::from_slice(&body) {
                Ok(report) => report,
                Err(e) => {
                    debug!("counters_v2 body rejected: {}", e);
                    return Json(ApiReply::invalid_params()).into_response();
                }
            };
            match state.clients.update_counters_v2(&report).await {
                Ok(reply) => Json(reply).into_response(),
                Err(e) => Json(failure_reply(e.into())).into_response(),
            }
        }
        AuthStage::Logout => auth_line(1).into_response(),
        AuthStage::Illegal(stage) => {
            debug!("Illegal auth stage {}", stage);
            ILLEGAL_STAGE.into_response()
        }
    }
}

/// GET /wifidog/offline
pub async fn offline(
    State(state): State<Arc<AppState>>,
    query: Result<Query<OfflineQuery>, QueryRejection>,
) -> Response {
    let Ok(Query(query)) = query else {
        return "OK".into_response();
    };
    if let Some(gw_id) = query.gw_id.as_deref() {
        if let Err(e) = state.devices.mark_offline(gw_id).await {
            error!("Offline notice for {} not recorded: {}", gw_id, e);
        }
    }
    "OK".into_response()
}

/// GET /wifidog/portal
pub async fn portal(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PortalQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let gw_id = match query.validate() {
        Ok(gw_id) => gw_id,
        Err(e) => return invalid(e),
    };
    let configured = match state.settings.gateway_setting(&gw_id).await {
        Ok(setting) => setting.and_then(|s| s.portal_url).filter(|url| !url.is_empty()),
        Err(e) => {
            error!("Portal lookup for {} failed: {}", gw_id, e);
            None
        }
    };
    let target = configured.unwrap_or_else(|| state.config.portal.default_portal_url.clone());
    found(&target)
}

// ============================================================================
// Channel callbacks
// ============================================================================

/// GET /wifidog/auth/weixin
pub async fn auth_weixin(
    State(state): State<Arc<AppState>>,
    query: Result<Query<WeixinQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let callback = match query.validate() {
        Ok(callback) => callback,
        Err(e) => return invalid(e),
    };
    let order = match order_for_redirect(&state, &callback.extend).await {
        Ok(order) => order,
        Err(reply) => return reply,
    };

    match state.weixin.verify(&order, &callback).await {
        Ok(VerificationOutcome::Accepted) => {
            let extras = TokenExtras {
                tid: Some(callback.tid.clone()),
                ..Default::default()
            };
            issue_redirect(&state, &order, Channel::Weixin, extras).await
        }
        Ok(outcome) => {
            warn!("WeChat callback for {} refused: {:?}", order.order_number, outcome);
            Json(ApiReply::invalid_params()).into_response()
        }
        Err(e) => Json(channel_failure(e)).into_response(),
    }
}

/// GET /wifidog/auth/wfc
pub async fn auth_wfc(
    State(state): State<Arc<AppState>>,
    query: Result<Query<WfcQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let (order_number, txid) = match query.validate() {
        Ok(v) => v,
        Err(e) => return invalid(e),
    };
    let order = match order_for_redirect(&state, &order_number).await {
        Ok(order) => order,
        Err(reply) => return reply,
    };

    match state.wfc.verify(&order, &PaymentProof { txid }).await {
        Ok(VerificationOutcome::Accepted) => {
            issue_redirect(&state, &order, Channel::Wfc, TokenExtras::default()).await
        }
        Ok(_) => PAY_ERROR.into_response(),
        Err(e) => {
            warn!("Payment check for {} failed: {}", order.order_number, e);
            PAY_ERROR.into_response()
        }
    }
}

/// GET /wifidog/auth/sms
pub async fn auth_sms(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SmsSendQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let (order_number, phone_number) = match query.validate() {
        Ok(v) => v,
        Err(e) => return invalid(e),
    };
    let order = match order_for_envelope(&state, &order_number).await {
        Ok(order) => order,
        Err(reply) => return reply,
    };
    if let Some(mac) = query.client_mac.as_deref() {
        debug!("SMS requested by client {} for {}", mac, order.order_number);
    }

    match state.sms.send_code(&order, &phone_number).await {
        Ok(_) => Json(ApiReply::success("code sent")).into_response(),
        Err(e) => Json(channel_failure(e)).into_response(),
    }
}

/// GET /wifidog/auth/sms/check
pub async fn auth_sms_check(
    State(state): State<Arc<AppState>>,
    query: Result<Query<SmsCheckQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let (order_number, check) = match query.validate() {
        Ok(v) => v,
        Err(e) => return invalid(e),
    };
    let order = match order_for_envelope(&state, &order_number).await {
        Ok(order) => order,
        Err(reply) => return reply,
    };

    match state.sms.verify(&order, &check).await {
        Ok(VerificationOutcome::Accepted) => {
            let extras = TokenExtras {
                phone_number: Some(check.phone_number.clone()),
                check_code: Some(check.check_code.clone()),
                ..Default::default()
            };
            issue_envelope(&state, &order, Channel::Sms, extras).await
        }
        Ok(_) => Json(ApiReply::failed(ApiReply::MSG_INVALID_INPUT)).into_response(),
        Err(e) => Json(channel_failure(e)).into_response(),
    }
}

/// GET /wifidog/auth/user
pub async fn auth_user(
    State(state): State<Arc<AppState>>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Response {
    let query = match parsed(query) {
        Ok(query) => query,
        Err(reply) => return reply,
    };
    let (order_number, credentials) = match query.validate() {
        Ok(v) => v,
        Err(e) => return invalid(e),
    };
    let order = match order_for_envelope(&state, &order_number).await {
        Ok(order) => order,
        Err(reply) => return reply,
    };

    match state.password.verify(&order, &credentials).await {
        Ok(VerificationOutcome::Accepted) => {
            info!("User {} signed in on {}", credentials.user, order.gw_id);
            issue_envelope(&state, &order, Channel::User, TokenExtras::default()).await
        }
        Ok(_) => Json(ApiReply::failed(ApiReply::MSG_BAD_CREDENTIALS)).into_response(),
        Err(e) => Json(channel_failure(e)).into_response(),
    }
}

/// GET /health
pub async fn health() -> Response {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
    .into_response()
}
