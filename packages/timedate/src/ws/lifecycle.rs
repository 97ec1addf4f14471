//! Connection lifecycle: `Connecting -> Open -> Closing -> Closed`.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Why a session left `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    PeerClosed,
    ReadFailed,
    WriteFailed,
    WriteTimedOut,
    UnknownTimezone,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PeerClosed => "peer_closed",
            Self::ReadFailed => "read_failed",
            Self::WriteFailed => "write_failed",
            Self::WriteTimedOut => "write_timed_out",
            Self::UnknownTimezone => "unknown_timezone",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal connection transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: ConnectionState,
    pub to: ConnectionState,
}

/// State of one connection plus the token both session loops watch.
///
/// The token is a child of the server shutdown token, so cancelling the
/// parent cancels every live session.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: AtomicU8,
    token: CancellationToken,
    reason: OnceLock<CloseReason>,
}

impl ConnectionLifecycle {
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
            token: parent.child_token(),
            reason: OnceLock::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// First reason recorded by [`begin_close`](Self::begin_close).
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.reason.get().copied()
    }

    fn transition(&self, from: ConnectionState, to: ConnectionState) -> Result<(), TransitionError> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|actual| TransitionError {
                from: ConnectionState::from_u8(actual),
                to,
            })
    }

    /// `Connecting -> Open`, once the upgrade has completed.
    pub fn open(&self) -> Result<(), TransitionError> {
        self.transition(ConnectionState::Connecting, ConnectionState::Open)
    }

    /// `Open -> Closing`. Cancels the token.
    ///
    /// Returns `false` if the session was already closing; the first reason wins.
    pub fn begin_close(&self, reason: CloseReason) -> bool {
        let _ = self.reason.set(reason);
        let moved = self
            .transition(ConnectionState::Open, ConnectionState::Closing)
            .is_ok();
        self.token.cancel();
        moved
    }

    /// `Closing -> Closed`. Returns `true` only for the call that performed
    /// the transition, so the transport is closed exactly once.
    pub fn finish_close(&self) -> bool {
        self.transition(ConnectionState::Closing, ConnectionState::Closed)
            .is_ok()
    }
}
