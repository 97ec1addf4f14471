//! WebSocket Protocol Types
//!
//! Message types for the time-streaming WebSocket.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{TimeFormat, TimeSnapshot};

/// The only client action with defined semantics.
pub const SUBSCRIBE_ACTION: &str = "subscribe";

/// Messages from client to server.
///
/// `action` is free-form; anything other than `subscribe` is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl ClientMessage {
    pub fn subscribe(timezone: Option<&str>, format: Option<&str>) -> Self {
        Self {
            action: SUBSCRIBE_ACTION.to_string(),
            timezone: timezone.map(String::from),
            format: format.map(String::from),
        }
    }

    /// The subscription change this message asks for, if any.
    ///
    /// Empty fields count as absent.
    pub fn as_update(&self) -> Option<SubscriptionUpdate> {
        if self.action != SUBSCRIBE_ACTION {
            return None;
        }
        Some(SubscriptionUpdate {
            timezone: self.timezone.clone().filter(|tz| !tz.is_empty()),
            format: self
                .format
                .as_deref()
                .filter(|f| !f.is_empty())
                .map(TimeFormat::from_name),
        })
    }
}

/// Field-wise overwrite of a subscription. `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub timezone: Option<String>,
    pub format: Option<TimeFormat>,
}

impl SubscriptionUpdate {
    pub fn is_empty(&self) -> bool {
        self.timezone.is_none() && self.format.is_none()
    }
}

/// Messages from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    TimeUpdate {
        data: TimeSnapshot,
        /// Send time, RFC 3339 UTC
        timestamp: String,
    },
}

impl ServerMessage {
    pub fn time_update(data: TimeSnapshot) -> Self {
        Self::TimeUpdate {
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}
