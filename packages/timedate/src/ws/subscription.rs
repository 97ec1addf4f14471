//! Per-connection subscription state shared by the broadcast and command loops.

use std::sync::Arc;
use tokio::sync::Mutex;

use super::protocol::SubscriptionUpdate;
use crate::models::TimeFormat;

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// What the client currently wants to see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// IANA zone id; not validated until the next tick renders it
    pub timezone: String,
    pub format: TimeFormat,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            format: TimeFormat::default(),
        }
    }
}

impl Subscription {
    fn apply(&mut self, update: SubscriptionUpdate) {
        if let Some(timezone) = update.timezone {
            self.timezone = timezone;
        }
        if let Some(format) = update.format {
            self.format = format;
        }
    }
}

/// Shared handle to one connection's [`Subscription`].
///
/// The lock is held only long enough to copy the value out or overwrite a
/// field, never across an await on the socket.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionHandle(Arc<Mutex<Subscription>>);

impl SubscriptionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Subscription {
        self.0.lock().await.clone()
    }

    /// Apply a field-wise update and return the resulting subscription.
    pub async fn apply(&self, update: SubscriptionUpdate) -> Subscription {
        let mut sub = self.0.lock().await;
        sub.apply(update);
        sub.clone()
    }
}
