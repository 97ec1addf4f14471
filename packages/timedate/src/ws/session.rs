//! One streaming session: a broadcast loop pushing `time_update` on every
//! tick and a command loop applying `subscribe` requests, joined on the
//! connection's task and torn down through [`ConnectionLifecycle`].

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lifecycle::{CloseReason, ConnectionLifecycle};
use super::protocol::{ClientMessage, ServerMessage};
use super::subscription::SubscriptionHandle;
use crate::config::WebSocketConfig;
use crate::metrics::ServerMetrics;
use crate::time_service::{TimeError, TimeService};

/// Failures that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("send failed: {0}")]
    Send(String),

    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("failed to encode update: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Time(#[from] TimeError),
}

impl SessionError {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            Self::Send(_) | Self::Encode(_) => CloseReason::WriteFailed,
            Self::SendTimeout(_) => CloseReason::WriteTimedOut,
            Self::Time(_) => CloseReason::UnknownTimezone,
        }
    }
}

/// Everything a session needs from the server.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub time_service: TimeService,
    pub config: WebSocketConfig,
    pub metrics: Option<Arc<ServerMetrics>>,
    /// Server-wide shutdown; the session token is derived from it.
    pub shutdown: CancellationToken,
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: CloseReason,
    pub updates_sent: u64,
    pub commands_applied: u64,
}

/// Drive a session until either side fails or the server shuts down.
///
/// Generic over the transport so tests can use in-memory channels.
pub async fn run_session<S, R, E>(sink: S, stream: R, ctx: SessionContext) -> SessionReport
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let conn_id = uuid::Uuid::new_v4().to_string();
    let lifecycle = ConnectionLifecycle::new(&ctx.shutdown);
    if let Err(e) = lifecycle.open() {
        warn!(conn_id = %conn_id, "{}", e);
    }
    let subscription = SubscriptionHandle::new();

    if let Some(ref m) = ctx.metrics {
        m.connection_opened();
    }
    info!(conn_id = %conn_id, "WebSocket session opened");

    let ((mut sink, updates_sent), commands_applied) = tokio::join!(
        broadcast_loop(sink, &ctx, &lifecycle, &subscription, &conn_id),
        command_loop(stream, &ctx, &lifecycle, &subscription, &conn_id),
    );

    // Neither loop recorded a reason: the parent token was cancelled.
    lifecycle.begin_close(CloseReason::Shutdown);
    let reason = lifecycle.close_reason().unwrap_or(CloseReason::Shutdown);

    if lifecycle.finish_close() {
        match tokio::time::timeout(ctx.config.write_timeout, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(conn_id = %conn_id, "Failed to close WebSocket: {}", e),
            Err(_) => debug!(conn_id = %conn_id, "Timed out closing WebSocket"),
        }
    }

    if let Some(ref m) = ctx.metrics {
        m.connection_closed(reason);
    }
    info!(
        conn_id = %conn_id,
        reason = %reason,
        "WebSocket session closed (updates_sent={}, commands_applied={})",
        updates_sent,
        commands_applied
    );

    SessionReport {
        reason,
        updates_sent,
        commands_applied,
    }
}

/// Push one update per tick. Returns the sink for teardown.
async fn broadcast_loop<S>(
    mut sink: S,
    ctx: &SessionContext,
    lifecycle: &ConnectionLifecycle,
    subscription: &SubscriptionHandle,
    conn_id: &str,
) -> (S, u64)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let period = ctx.config.tick_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let token = lifecycle.token();
    let mut sent = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match send_update(&mut sink, ctx, subscription, token).await {
            Ok(true) => {
                sent += 1;
                if let Some(ref m) = ctx.metrics {
                    m.message_sent();
                }
            }
            Ok(false) => break,
            Err(e) => {
                match &e {
                    SessionError::Time(_) => warn!(conn_id = %conn_id, "Ending session: {}", e),
                    _ => debug!(conn_id = %conn_id, "Ending session: {}", e),
                }
                lifecycle.begin_close(e.close_reason());
                break;
            }
        }
    }

    (sink, sent)
}

/// Render and send one update. `Ok(false)` means cancelled mid-send.
async fn send_update<S>(
    sink: &mut S,
    ctx: &SessionContext,
    subscription: &SubscriptionHandle,
    token: &CancellationToken,
) -> Result<bool, SessionError>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let sub = subscription.current().await;
    let snapshot = ctx.time_service.current_time(&sub.timezone, sub.format)?;
    let text = serde_json::to_string(&ServerMessage::time_update(snapshot))?;

    let write_timeout = ctx.config.write_timeout;
    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(false),
        result = tokio::time::timeout(write_timeout, sink.send(Message::Text(text.into()))) => {
            match result {
                Ok(Ok(())) => Ok(true),
                Ok(Err(e)) => Err(SessionError::Send(e.to_string())),
                Err(_) => Err(SessionError::SendTimeout(write_timeout)),
            }
        }
    }
}

/// Read client frames until the peer goes away or the session is cancelled.
async fn command_loop<R, E>(
    mut stream: R,
    ctx: &SessionContext,
    lifecycle: &ConnectionLifecycle,
    subscription: &SubscriptionHandle,
    conn_id: &str,
) -> u64
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let token = lifecycle.token();
    let mut applied = 0u64;

    loop {
        let frame = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            frame = stream.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                if let Some(ref m) = ctx.metrics {
                    m.command_received();
                }
                match apply_command(&text, subscription, conn_id).await {
                    CommandOutcome::Applied => {
                        applied += 1;
                        if let Some(ref m) = ctx.metrics {
                            m.subscription_applied();
                        }
                    }
                    CommandOutcome::Ignored => {}
                    CommandOutcome::Malformed => {
                        lifecycle.begin_close(CloseReason::ReadFailed);
                        break;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(conn_id = %conn_id, "Client closed connection");
                lifecycle.begin_close(CloseReason::PeerClosed);
                break;
            }
            Some(Err(e)) => {
                debug!(conn_id = %conn_id, "WebSocket receive failed: {}", e);
                lifecycle.begin_close(CloseReason::ReadFailed);
                break;
            }
            // binary, ping, pong
            Some(Ok(_)) => {}
        }
    }

    applied
}

/// What a text frame did to the subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandOutcome {
    /// A `subscribe` that changed at least one field.
    Applied,
    Ignored,
    /// Not an inbound message; the read counts as failed.
    Malformed,
}

async fn apply_command(
    text: &str,
    subscription: &SubscriptionHandle,
    conn_id: &str,
) -> CommandOutcome {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(conn_id = %conn_id, "Unparseable client message: {}", e);
            return CommandOutcome::Malformed;
        }
    };

    match msg.as_update() {
        Some(update) if !update.is_empty() => {
            let sub = subscription.apply(update).await;
            debug!(
                conn_id = %conn_id,
                "Subscription updated: timezone={}, format={}",
                sub.timezone,
                sub.format.name()
            );
            CommandOutcome::Applied
        }
        Some(_) => CommandOutcome::Ignored,
        None => {
            debug!(conn_id = %conn_id, "Ignoring client action {:?}", msg.action);
            CommandOutcome::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    const TICK: Duration = Duration::from_millis(100);

    type Inbound = Result<Message, String>;

    struct Harness {
        inbound: mpsc::UnboundedSender<Inbound>,
        outbound: mpsc::UnboundedReceiver<Message>,
        shutdown: CancellationToken,
        metrics: Arc<ServerMetrics>,
        task: tokio::task::JoinHandle<SessionReport>,
    }

    fn start() -> Harness {
        let (out_tx, out_rx) = mpsc::unbounded::<Message>();
        let (in_tx, in_rx) = mpsc::unbounded::<Inbound>();
        let shutdown = CancellationToken::new();
        let metrics = Arc::new(ServerMetrics::new());
        let ctx = SessionContext {
            time_service: TimeService::new(),
            config: WebSocketConfig {
                tick_interval: TICK,
                write_timeout: Duration::from_secs(1),
            },
            metrics: Some(metrics.clone()),
            shutdown: shutdown.clone(),
        };
        let task = tokio::spawn(run_session(out_tx, in_rx, ctx));
        Harness {
            inbound: in_tx,
            outbound: out_rx,
            shutdown,
            metrics,
            task,
        }
    }

    fn send_text(h: &Harness, text: &str) {
        h.inbound
            .unbounded_send(Ok(Message::Text(text.to_string().into())))
            .unwrap();
    }

    async fn next_update(h: &mut Harness) -> serde_json::Value {
        loop {
            match h.outbound.next().await {
                Some(Message::Text(text)) => return serde_json::from_str(&text).unwrap(),
                Some(Message::Close(_)) | None => panic!("session ended before an update"),
                Some(_) => continue,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_subscription_is_utc() {
        let mut h = start();
        let update = next_update(&mut h).await;
        assert_eq!(update["type"], "time_update");
        assert_eq!(update["data"]["timezone"], "UTC");
        assert_eq!(update["data"]["unix_offset"], 0);
        let formatted = update["data"]["formatted"].as_str().unwrap();
        assert!(formatted.ends_with("AM") || formatted.ends_with("PM"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_update_after_one_period() {
        let mut h = start();
        let start = Instant::now();
        next_update(&mut h).await;
        assert!(start.elapsed() >= TICK);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_switches_timezone() {
        let mut h = start();
        send_text(&h, r#"{"action":"subscribe","timezone":"Asia/Tokyo"}"#);

        let update = next_update(&mut h).await;
        assert_eq!(update["data"]["timezone"], "Asia/Tokyo");
        assert_eq!(update["data"]["unix_offset"], 32400);
        assert_eq!(h.metrics.snapshot().messages.subscriptions_applied, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_with_empty_timezone_keeps_zone() {
        let mut h = start();
        send_text(&h, r#"{"action":"subscribe","timezone":"Europe/Paris"}"#);
        send_text(&h, r#"{"action":"subscribe","timezone":"","format":"24hour"}"#);

        let update = next_update(&mut h).await;
        assert_eq!(update["data"]["timezone"], "Europe/Paris");
        let formatted = update["data"]["formatted"].as_str().unwrap();
        assert_eq!(formatted.len(), "14:30:45".len());
        assert!(!formatted.contains('M'));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_action_and_binary_frames_ignored() {
        let mut h = start();
        send_text(&h, r#"{"action":"unsubscribe","timezone":"Asia/Tokyo"}"#);
        send_text(&h, r#"{"action":"subscribe","type":"subscribe"}"#);
        h.inbound
            .unbounded_send(Ok(Message::Binary(vec![1, 2, 3].into())))
            .unwrap();

        let update = next_update(&mut h).await;
        assert_eq!(update["data"]["timezone"], "UTC");
        assert_eq!(h.metrics.snapshot().messages.commands_received, 2);
        assert_eq!(h.metrics.snapshot().messages.subscriptions_applied, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_frame_ends_session() {
        let mut h = start();
        next_update(&mut h).await;

        send_text(&h, "{not json");
        let report = tokio::time::timeout(TICK, &mut h.task).await.unwrap().unwrap();
        assert_eq!(report.reason, CloseReason::ReadFailed);
        assert_eq!(report.updates_sent, 1);
        assert_eq!(report.commands_applied, 0);
        assert!(h.outbound.next().await.is_none());
        assert_eq!(h.metrics.snapshot().closes.read_error, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrongly_typed_fields_end_session() {
        let h = start();
        send_text(&h, r#"{"action":"subscribe","timezone":42}"#);
        let report = h.task.await.unwrap();
        assert_eq!(report.reason, CloseReason::ReadFailed);
        assert_eq!(report.updates_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_failure_stops_broadcast_within_one_tick() {
        let mut h = start();
        next_update(&mut h).await;

        h.inbound.unbounded_send(Err("connection reset".to_string())).unwrap();
        let report = tokio::time::timeout(TICK, &mut h.task).await.unwrap().unwrap();
        assert_eq!(report.reason, CloseReason::ReadFailed);
        assert_eq!(report.updates_sent, 1);

        // sink closed once, nothing further sent
        assert!(h.outbound.next().await.is_none());
        assert_eq!(h.metrics.snapshot().closes.read_error, 1);
        assert_eq!(h.metrics.snapshot().connections.active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_peer_close_ends_session() {
        let h = start();
        h.inbound.unbounded_send(Ok(Message::Close(None))).unwrap();
        let report = h.task.await.unwrap();
        assert_eq!(report.reason, CloseReason::PeerClosed);
        assert_eq!(report.updates_sent, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_end_counts_as_peer_close() {
        let Harness { inbound, task, .. } = start();
        drop(inbound);
        assert_eq!(task.await.unwrap().reason, CloseReason::PeerClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_receiver_is_write_failure() {
        let Harness {
            inbound,
            outbound,
            metrics,
            task,
            ..
        } = start();
        drop(outbound);

        let report = task.await.unwrap();
        assert_eq!(report.reason, CloseReason::WriteFailed);
        assert_eq!(metrics.snapshot().closes.write_error, 1);
        drop(inbound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_timezone_is_fatal() {
        let mut h = start();
        send_text(&h, r#"{"action":"subscribe","timezone":"Mars/Olympus_Mons"}"#);

        let report = (&mut h.task).await.unwrap();
        assert_eq!(report.reason, CloseReason::UnknownTimezone);
        assert_eq!(report.updates_sent, 0);
        assert_eq!(report.commands_applied, 1);
        assert!(h.outbound.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_session() {
        let mut h = start();
        next_update(&mut h).await;

        h.shutdown.cancel();
        let report = (&mut h.task).await.unwrap();
        assert_eq!(report.reason, CloseReason::Shutdown);
        assert_eq!(h.metrics.snapshot().closes.shutdown, 1);
    }

    #[test]
    fn test_session_error_reasons() {
        assert_eq!(
            SessionError::Send("gone".into()).close_reason(),
            CloseReason::WriteFailed
        );
        assert_eq!(
            SessionError::SendTimeout(Duration::from_secs(1)).close_reason(),
            CloseReason::WriteTimedOut
        );
        assert_eq!(
            SessionError::Time(TimeError::UnknownTimezone("X".into())).close_reason(),
            CloseReason::UnknownTimezone
        );
    }
}
