use crate::features::api::error::ApiError;
use crate::features::api::router::AppState;
use crate::features::system_metrics::{
    round2, MetricSample, PageRequest, TimeWindow, DEFAULT_PAGE_SIZE,
};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Parameters are kept as strings so a malformed page number falls back to
/// its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    page: Option<String>,
    #[serde(rename = "pageSize")]
    page_size: Option<String>,
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    start: Option<String>,
    end: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub data: Vec<MetricSample>,
    #[serde(rename = "totalRecords", skip_serializing_if = "Option::is_none")]
    pub total_records: Option<i64>,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct AverageBody {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    pub sample_count: i64,
}

#[derive(Debug, Serialize)]
pub struct AverageResponse {
    pub data: AverageBody,
    pub time: DateTime<Utc>,
}

fn parse_number(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .unwrap_or(default)
}

/// Parses an RFC 3339 timestamp and normalises it to UTC.
pub fn parse_timestamp(field: &'static str, value: Option<&str>) -> Result<DateTime<Utc>, ApiError> {
    let value = value.ok_or(ApiError::MissingParameter(field))?;
    DateTime::parse_from_rfc3339(value.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| ApiError::InvalidTimestamp { field, source })
}

fn parse_window(start: Option<&str>, end: Option<&str>) -> Result<TimeWindow, ApiError> {
    Ok(TimeWindow::new(
        parse_timestamp("start", start)?,
        parse_timestamp("end", end)?,
    ))
}

/// `GET /metrics/`
pub async fn list_metrics(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError> {
    debug!("list_metrics {:?}", params);

    let request = PageRequest::new(
        parse_number(params.page.as_deref(), 1),
        parse_number(params.page_size.as_deref(), DEFAULT_PAGE_SIZE as i64),
    );
    let window = match (params.start.as_deref(), params.end.as_deref()) {
        (None, None) => None,
        (start, end) => Some(parse_window(start, end)?),
    };

    let page = state.store.list_page(request, window).await?;
    if page.samples.is_empty() {
        return Err(ApiError::NotFound("No metrics found"));
    }

    Ok(Json(ListResponse {
        data: page.samples,
        total_records: Some(page.total_records),
        time: Utc::now(),
    }))
}

/// `GET /metrics?start=..&end=..`
pub async fn metrics_by_time_range(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<ListResponse>, ApiError> {
    debug!("metrics_by_time_range {:?}", params);

    let window = parse_window(params.start.as_deref(), params.end.as_deref())?;
    let samples = state.store.list_range(window).await?;
    if samples.is_empty() {
        return Err(ApiError::NotFound("No metrics found in the given time range"));
    }

    Ok(Json(ListResponse {
        data: samples,
        total_records: None,
        time: Utc::now(),
    }))
}

/// `GET /metrics/average?start=..&end=..`
pub async fn average_metrics(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<AverageResponse>, ApiError> {
    debug!("average_metrics {:?}", params);

    let window = parse_window(params.start.as_deref(), params.end.as_deref())?;
    let average = state.store.average(window).await?;

    // Decided on the row count: a window of genuine 0% readings is not "no data".
    match (average.cpu_percent, average.mem_percent) {
        (Some(cpu), Some(mem)) if !average.is_empty() => Ok(Json(AverageResponse {
            data: AverageBody {
                cpu_percent: round2(cpu),
                mem_percent: round2(mem),
                sample_count: average.sample_count,
            },
            time: Utc::now(),
        })),
        _ => Err(ApiError::NotFound("No metrics found in the given time range")),
    }
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
