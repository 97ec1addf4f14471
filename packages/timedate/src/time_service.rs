//! Time snapshots, zone conversion and the curated zone list.
//!
//! Zone lookups go through the compiled-in chrono-tz database, so an identifier
//! is valid exactly when `chrono_tz::Tz` can parse it (case-sensitive).

use chrono::{DateTime, Offset, SecondsFormat, TimeZone, Utc};
use chrono_tz::Tz;

use crate::models::{
    FormatInfo, TimeConvertRequest, TimeConvertResponse, TimeFormat, TimeSnapshot, TimezoneInfo,
};

/// Zones listed by `GET /api/v1/timezones`.
pub const CURATED_ZONES: &[&str] = &[
    "UTC",
    "Africa/Cairo",
    "Africa/Casablanca",
    "Africa/Johannesburg",
    "Africa/Lagos",
    "Africa/Nairobi",
    "America/Anchorage",
    "America/Argentina/Buenos_Aires",
    "America/Bogota",
    "America/Caracas",
    "America/Chicago",
    "America/Denver",
    "America/Halifax",
    "America/Los_Angeles",
    "America/Mexico_City",
    "America/New_York",
    "America/Phoenix",
    "America/Santiago",
    "America/Sao_Paulo",
    "Asia/Bangkok",
    "Asia/Dubai",
    "Asia/Hong_Kong",
    "Asia/Istanbul",
    "Asia/Jakarta",
    "Asia/Jerusalem",
    "Asia/Kabul",
    "Asia/Karachi",
    "Asia/Kolkata",
    "Asia/Kuala_Lumpur",
    "Asia/Manila",
    "Asia/Seoul",
    "Asia/Shanghai",
    "Asia/Singapore",
    "Asia/Taipei",
    "Asia/Tehran",
    "Asia/Tokyo",
    "Atlantic/Azores",
    "Atlantic/Cape_Verde",
    "Australia/Adelaide",
    "Australia/Brisbane",
    "Australia/Darwin",
    "Australia/Melbourne",
    "Australia/Perth",
    "Australia/Sydney",
    "Europe/Amsterdam",
    "Europe/Athens",
    "Europe/Berlin",
    "Europe/Brussels",
    "Europe/Budapest",
    "Europe/Dublin",
    "Europe/Lisbon",
    "Europe/London",
    "Europe/Luxembourg",
    "Europe/Madrid",
    "Europe/Moscow",
    "Europe/Oslo",
    "Europe/Paris",
    "Europe/Prague",
    "Europe/Rome",
    "Europe/Stockholm",
    "Europe/Vienna",
    "Europe/Warsaw",
    "Europe/Zurich",
    "Pacific/Auckland",
    "Pacific/Fiji",
    "Pacific/Guam",
    "Pacific/Honolulu",
    "Pacific/Pago_Pago",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("invalid timezone: {0}")]
    UnknownTimezone(String),

    #[error("invalid timestamp format: {0}")]
    InvalidTimestamp(String),
}

/// Stateless provider of [`TimeSnapshot`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeService;

impl TimeService {
    pub fn new() -> Self {
        Self
    }

    /// Snapshot of the current instant in `timezone`.
    pub fn current_time(&self, timezone: &str, format: TimeFormat) -> Result<TimeSnapshot, TimeError> {
        self.snapshot_at(Utc::now(), timezone, format)
    }

    /// Snapshot of a given instant in `timezone`.
    pub fn snapshot_at(
        &self,
        instant: DateTime<Utc>,
        timezone: &str,
        format: TimeFormat,
    ) -> Result<TimeSnapshot, TimeError> {
        let tz = parse_timezone(timezone)?;
        Ok(snapshot(&instant.with_timezone(&tz), timezone, format))
    }

    pub fn convert_time(&self, req: &TimeConvertRequest) -> Result<TimeConvertResponse, TimeError> {
        let instant = DateTime::parse_from_rfc3339(&req.timestamp)
            .map_err(|_| TimeError::InvalidTimestamp(req.timestamp.clone()))?
            .with_timezone(&Utc);

        let original = self.snapshot_at(instant, &req.from_timezone, TimeFormat::TwelveHour)?;
        let converted = self.snapshot_at(instant, &req.to_timezone, TimeFormat::TwelveHour)?;
        let offset_seconds = converted.unix_offset - original.unix_offset;

        Ok(TimeConvertResponse {
            original,
            converted,
            offset_hours: f64::from(offset_seconds) / 3600.0,
            offset_minutes: offset_seconds / 60,
        })
    }

    pub fn available_timezones(&self) -> Vec<TimezoneInfo> {
        let now = Utc::now();
        CURATED_ZONES
            .iter()
            .filter_map(|name| {
                let tz = parse_timezone(name).ok()?;
                let local = now.with_timezone(&tz);
                Some(TimezoneInfo {
                    name: name.to_string(),
                    offset: f64::from(offset_seconds(&local)) / 3600.0,
                    current: format_time(&local, TimeFormat::TwelveHour),
                })
            })
            .collect()
    }

    pub fn time_formats(&self) -> Vec<FormatInfo> {
        TimeFormat::ALL
            .iter()
            .map(|format| {
                let (description, example) = match format {
                    TimeFormat::Iso8601 => ("ISO 8601 format", "2024-01-03T14:30:45Z"),
                    TimeFormat::TwelveHour => ("12-hour format", "2:30:45 PM"),
                    TimeFormat::TwentyFourHour => ("24-hour format", "14:30:45"),
                };
                FormatInfo {
                    name: format.name().to_string(),
                    description: description.to_string(),
                    example: example.to_string(),
                }
            })
            .collect()
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, TimeError> {
    name.parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimezone(name.to_string()))
}

pub fn format_time<T: TimeZone>(time: &DateTime<T>, format: TimeFormat) -> String
where
    T::Offset: std::fmt::Display,
{
    match format {
        TimeFormat::TwelveHour => time.format("%-I:%M:%S %p").to_string(),
        TimeFormat::TwentyFourHour => time.format("%H:%M:%S").to_string(),
        TimeFormat::Iso8601 => time.to_rfc3339_opts(SecondsFormat::Secs, true),
    }
}

pub fn format_date<T: TimeZone>(time: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    time.format("%A, %B %-d, %Y").to_string()
}

fn offset_seconds(time: &DateTime<Tz>) -> i32 {
    time.offset().fix().local_minus_utc()
}

fn snapshot(local: &DateTime<Tz>, timezone: &str, format: TimeFormat) -> TimeSnapshot {
    TimeSnapshot {
        timestamp: local.to_rfc3339_opts(SecondsFormat::Secs, true),
        timezone: timezone.to_string(),
        unix: local.timestamp(),
        unix_offset: offset_seconds(local),
        formatted: format_time(local, format),
        date: format_date(local),
    }
}
