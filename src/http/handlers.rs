//! Route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::http::response::ApiError;
use crate::service::{LineStatusResponse, TubeStatusService, UnplannedDisruptionsResponse};
use crate::tfl::{DateRange, Line, TflClient};

/// Shared handler state.
#[derive(Clone, Debug)]
pub struct AppState {
    pub tfl: Arc<TflClient>,
    pub status: Arc<TubeStatusService>,
}

impl AppState {
    pub fn new(tfl: Arc<TflClient>) -> Self {
        let status = Arc::new(TubeStatusService::new(tfl.clone()));
        Self { tfl, status }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub async fn healthz() -> &'static str {
    "ok"
}

/// `GET /api/line/{line_id}/status`
pub async fn line_status(
    State(state): State<AppState>,
    Path(line_id): Path<String>,
    Query(query): Query<StatusQuery>,
    uri: Uri,
) -> Result<Json<LineStatusResponse>, ApiError> {
    let path = uri.path();

    if !is_valid_line_id(&line_id) {
        return Err(ApiError::bad_request(
            "lineId must match [a-z0-9-]+ (e.g. 'central')",
            path,
        ));
    }
    let range = parse_range(query.from.as_deref(), query.to.as_deref())
        .map_err(|message| ApiError::bad_request(message, path))?;

    state
        .status
        .get_line_status(&line_id, range)
        .await
        .map(Json)
        .map_err(|err| ApiError::from_tfl_error(&err, path))
}

/// `GET /api/disruptions/unplanned`
pub async fn unplanned_disruptions(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Json<UnplannedDisruptionsResponse>, ApiError> {
    state
        .status
        .get_all_unplanned_disruptions()
        .await
        .map(Json)
        .map_err(|err| ApiError::from_tfl_error(&err, uri.path()))
}

/// `GET /api/lines/status`
pub async fn all_lines_status(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<Json<Vec<Line>>, ApiError> {
    state
        .tfl
        .get_all_tube_line_status()
        .await
        .map(Json)
        .map_err(|err| ApiError::from_tfl_error(&err, uri.path()))
}

/// Fallback for every unrouted path.
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "Expected /api/line/{lineId}/status",
        uri.path(),
    )
}

pub fn is_valid_line_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Both dates must parse when given; the range applies only when both are.
/// Blank values count as absent.
pub fn parse_range(from: Option<&str>, to: Option<&str>) -> Result<Option<DateRange>, String> {
    let from = non_blank(from).map(parse_date).transpose()?;
    let to = non_blank(to).map(parse_date).transpose()?;

    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(format!("'from' ({from}) is after 'to' ({to})")),
        (Some(from), Some(to)) => Ok(Some(DateRange { from, to })),
        _ => Ok(None),
    }
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{raw}'. Use yyyy-MM-dd"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_id_validation() {
        assert!(is_valid_line_id("central"));
        assert!(is_valid_line_id("hammersmith-city"));
        assert!(is_valid_line_id("dlr2"));
        assert!(!is_valid_line_id(""));
        assert!(!is_valid_line_id("Central"));
        assert!(!is_valid_line_id("central;drop"));
        assert!(!is_valid_line_id("../etc"));
    }

    #[test]
    fn test_range_requires_both_dates() {
        assert_eq!(parse_range(None, None), Ok(None));
        assert_eq!(parse_range(Some("2024-01-01"), None), Ok(None));

        let range = parse_range(Some("2024-01-01"), Some("2024-01-03")).unwrap().unwrap();
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.to, NaiveDate::from_ymd_opt(2024, 1, 3).unwrap());
    }

    #[test]
    fn test_blank_dates_are_absent() {
        assert_eq!(parse_range(Some(""), Some("")), Ok(None));
        assert_eq!(parse_range(Some("  "), None), Ok(None));
        assert_eq!(parse_range(Some(""), Some("2024-01-03")), Ok(None));
    }

    #[test]
    fn test_malformed_dates_rejected() {
        assert!(parse_range(Some("01/02/2024"), Some("2024-01-03")).is_err());
        // A lone malformed date is still an error.
        assert!(parse_range(None, Some("tomorrow")).is_err());
        assert!(parse_range(Some("2024-01-05"), Some("2024-01-01")).is_err());
    }
}
