use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;
use crate::models::{
    FormatInfo, TimeConvertRequest, TimeConvertResponse, TimeFormat, TimeSnapshot, TimezoneInfo,
};
use crate::ws::subscription::DEFAULT_TIMEZONE;

#[derive(Debug, Deserialize)]
pub struct TimeQuery {
    pub timezone: Option<String>,
}

/// GET /api/v1/time?timezone=<zone> - current time, UTC when no zone given
pub async fn get_current_time(
    State(state): State<AppState>,
    Query(query): Query<TimeQuery>,
) -> Result<Json<TimeSnapshot>, ApiError> {
    let timezone = query
        .timezone
        .filter(|tz| !tz.is_empty())
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let snapshot = state
        .time_service
        .current_time(&timezone, TimeFormat::TwelveHour)?;
    Ok(Json(snapshot))
}

/// GET /api/v1/time/{*timezone} - zone ids contain slashes, so the rest of
/// the path is the zone
pub async fn get_time_in_zone(
    State(state): State<AppState>,
    Path(timezone): Path<String>,
) -> Result<Json<TimeSnapshot>, ApiError> {
    let timezone = timezone.trim_start_matches('/');
    if timezone.is_empty() {
        return Err(ApiError::MissingTimezone);
    }
    let snapshot = state
        .time_service
        .current_time(timezone, TimeFormat::TwelveHour)?;
    Ok(Json(snapshot))
}

/// GET /api/v1/time/ - zone segment left empty
pub async fn missing_timezone() -> ApiError {
    ApiError::MissingTimezone
}

/// POST /api/v1/time/convert
pub async fn convert_time(
    State(state): State<AppState>,
    payload: Result<Json<TimeConvertRequest>, JsonRejection>,
) -> Result<Json<TimeConvertResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::InvalidBody(e.body_text()))?;
    Ok(Json(state.time_service.convert_time(&req)?))
}

/// GET /api/v1/timezones
pub async fn list_timezones(State(state): State<AppState>) -> Json<Vec<TimezoneInfo>> {
    Json(state.time_service.available_timezones())
}

/// GET /api/v1/formats
pub async fn list_formats(State(state): State<AppState>) -> Json<Vec<FormatInfo>> {
    Json(state.time_service.time_formats())
}
