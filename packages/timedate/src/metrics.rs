//! Server metrics for observability
//!
//! Counters for streaming sessions and upgrade admission, exposed as JSON.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::ws::CloseReason;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently open streaming sessions
    pub active_connections: AtomicU64,
    /// Total sessions since server start
    pub total_connections: AtomicU64,
    /// Upgrade requests refused by origin admission
    pub rejected_upgrades: AtomicU64,

    // Message metrics
    /// `time_update` messages sent
    pub messages_sent: AtomicU64,
    /// Text frames received from clients
    pub commands_received: AtomicU64,
    /// `subscribe` commands applied to a session
    pub subscriptions_applied: AtomicU64,

    // Close reasons
    pub closed_by_peer: AtomicU64,
    pub closed_read_error: AtomicU64,
    pub closed_write_error: AtomicU64,
    pub closed_unknown_timezone: AtomicU64,
    pub closed_shutdown: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self, reason: CloseReason) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
        let counter = match reason {
            CloseReason::PeerClosed => &self.closed_by_peer,
            CloseReason::ReadFailed => &self.closed_read_error,
            CloseReason::WriteFailed | CloseReason::WriteTimedOut => &self.closed_write_error,
            CloseReason::UnknownTimezone => &self.closed_unknown_timezone,
            CloseReason::Shutdown => &self.closed_shutdown,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn upgrade_rejected(&self) {
        self.rejected_upgrades.fetch_add(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_sent(&self) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscription_applied(&self) {
        self.subscriptions_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
                rejected: self.rejected_upgrades.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                sent: self.messages_sent.load(Ordering::Relaxed),
                commands_received: self.commands_received.load(Ordering::Relaxed),
                subscriptions_applied: self.subscriptions_applied.load(Ordering::Relaxed),
            },
            closes: CloseMetrics {
                peer: self.closed_by_peer.load(Ordering::Relaxed),
                read_error: self.closed_read_error.load(Ordering::Relaxed),
                write_error: self.closed_write_error.load(Ordering::Relaxed),
                unknown_timezone: self.closed_unknown_timezone.load(Ordering::Relaxed),
                shutdown: self.closed_shutdown.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub closes: CloseMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub sent: u64,
    pub commands_received: u64,
    pub subscriptions_applied: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseMetrics {
    pub peer: u64,
    pub read_error: u64,
    pub write_error: u64,
    pub unknown_timezone: u64,
    pub shutdown: u64,
}
