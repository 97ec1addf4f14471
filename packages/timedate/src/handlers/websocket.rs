use axum::{
    extract::{State, WebSocketUpgrade, ws::rejection::WebSocketUpgradeRejection},
    http::{HeaderMap, header},
    response::Response,
};
use futures::StreamExt;
use tracing::warn;

use crate::AppState;
use crate::error::ApiError;
use crate::ws::{SessionContext, run_session};

/// GET /ws/time - upgrade to a time-streaming session
///
/// Plain HTTP requests get `426`; upgrades from an origin outside the allow
/// list get `403` before any session state exists.
pub async fn time_stream_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    let ws = ws.map_err(|_| ApiError::UpgradeRequired)?;

    // No Origin header means a non-browser client.
    let origin = match headers.get(header::ORIGIN) {
        None => Some(""),
        Some(value) => value.to_str().ok(),
    };
    let admitted = origin.is_some_and(|o| state.origin_matcher.is_allowed(o));
    if !admitted {
        let origin = origin.unwrap_or("<non-ascii>").to_string();
        state.metrics.upgrade_rejected();
        warn!("Rejected WebSocket upgrade from origin {:?}", origin);
        return Err(ApiError::OriginNotAllowed(origin));
    }

    let ctx = SessionContext {
        time_service: state.time_service,
        config: state.config.websocket.clone(),
        metrics: Some(state.metrics.clone()),
        shutdown: state.shutdown.clone(),
    };

    Ok(ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        run_session(sink, stream, ctx).await;
    }))
}
