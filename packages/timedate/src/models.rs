use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Time
// =============================================================================

/// Display format for the `formatted` clock string.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum TimeFormat {
    /// `2:30:45 PM`
    #[default]
    #[serde(rename = "12hour")]
    #[value(name = "12hour")]
    TwelveHour,
    /// `14:30:45`
    #[serde(rename = "24hour")]
    #[value(name = "24hour")]
    TwentyFourHour,
    /// `2024-01-03T14:30:45-05:00`
    #[serde(rename = "ISO8601")]
    #[value(name = "ISO8601")]
    Iso8601,
}

impl TimeFormat {
    pub const ALL: [TimeFormat; 3] = [Self::Iso8601, Self::TwelveHour, Self::TwentyFourHour];

    /// Resolve a client-supplied format name.
    ///
    /// Unrecognized names select ISO 8601, the formatter's fallback.
    pub fn from_name(name: &str) -> Self {
        match name {
            "12hour" => Self::TwelveHour,
            "24hour" => Self::TwentyFourHour,
            _ => Self::Iso8601,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::TwelveHour => "12hour",
            Self::TwentyFourHour => "24hour",
            Self::Iso8601 => "ISO8601",
        }
    }
}

/// Current time in one zone. Recomputed on every request or tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSnapshot {
    /// Zone-local RFC 3339 timestamp
    pub timestamp: String,
    pub timezone: String,
    pub unix: i64,
    /// Seconds east of UTC
    pub unix_offset: i32,
    pub formatted: String,
    /// Long calendar date, e.g. `Wednesday, January 3, 2024`
    pub date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConvertRequest {
    pub from_timezone: String,
    pub to_timezone: String,
    /// RFC 3339 instant to convert
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConvertResponse {
    pub original: TimeSnapshot,
    pub converted: TimeSnapshot,
    pub offset_hours: f64,
    pub offset_minutes: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneInfo {
    pub name: String,
    /// Hours east of UTC (fractional for zones like Asia/Kolkata)
    pub offset: f64,
    pub current: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatInfo {
    pub name: String,
    pub description: String,
    pub example: String,
}

// =============================================================================
// Service
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_secs: u64,
    pub connections: u64,
}
