//! HTTP handlers for the dashboard API.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tracing::error;

use climatology::{finite_mean, finite_min_max};
use renderer::{render_anomaly, render_sst, RenderOptions, RenderedMap};
use sst_common::time::DataDay;
use sst_common::{Grid, SstError};

use crate::pipeline;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Finite-value statistics of one grid.
#[derive(Debug, Clone, Serialize)]
pub struct GridSummary {
    pub shape: [usize; 2],
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f32>,
}

impl GridSummary {
    fn of(grid: &Grid) -> Self {
        let (n_lat, n_lon) = grid.shape();
        let min_max = finite_min_max(&grid.values);
        Self {
            shape: [n_lat, n_lon],
            min: min_max.map(|(min, _)| min),
            max: min_max.map(|(_, max)| max),
            mean: finite_mean(&grid.values),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SstSummaryResponse {
    pub date: String,
    pub observed: GridSummary,
    pub notices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClimatologySummary {
    pub window: String,
    pub contributing_years: usize,
    pub skipped_years: Vec<i32>,
    pub stats: Option<GridSummary>,
}

#[derive(Debug, Serialize)]
pub struct AnomalySummaryResponse {
    pub date: String,
    pub observed: GridSummary,
    pub climatology: ClimatologySummary,
    /// None when the climatology was unavailable.
    pub anomaly: Option<GridSummary>,
    pub notices: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Convert a pipeline error into a JSON error response.
///
/// Every failure is reported in place of the affected product; nothing
/// here terminates the process.
fn error_response(err: &SstError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!(error = %err, "Request failed");
    }

    let body = ErrorBody {
        error: err.to_string(),
        hint: err.user_hint(),
    };
    (status, Json(body)).into_response()
}

fn parse_day(state: &AppState, date: &str) -> Result<DataDay, Response> {
    DataDay::parse(date, state.today()).map_err(|e| error_response(&e))
}

fn png_response(map: &RenderedMap) -> Response {
    match map.to_png() {
        Ok(png) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/png")
            .header(header::CACHE_CONTROL, "public, max-age=3600")
            .body(Body::from(png))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()),
        Err(e) => error_response(&SstError::Render(e.to_string())),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/sst/:date - observed-day summary.
pub async fn sst_summary_handler(
    Path(date): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let day = match parse_day(&state, &date) {
        Ok(day) => day,
        Err(resp) => return resp,
    };

    match pipeline::observed(&state, day).await {
        Ok(Some(grid)) => Json(SstSummaryResponse {
            date: day.to_string(),
            observed: GridSummary::of(&grid),
            notices: Vec::new(),
        })
        .into_response(),
        Ok(None) => error_response(&SstError::NoData { date: day.date() }),
        Err(e) => error_response(&e),
    }
}

/// GET /api/anomaly/:date - full pipeline summary.
///
/// When zero climatology years contribute, the response still carries the
/// observed summary; the anomaly field is null and the notices say why.
pub async fn anomaly_summary_handler(
    Path(date): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let day = match parse_day(&state, &date) {
        Ok(day) => day,
        Err(resp) => return resp,
    };

    let outcome = match pipeline::anomaly_product(&state, day).await {
        Ok(outcome) => outcome,
        Err(e) => return error_response(&e),
    };

    let response = AnomalySummaryResponse {
        date: day.to_string(),
        observed: GridSummary::of(&outcome.observed),
        climatology: ClimatologySummary {
            window: state.config.climatology.window().to_string(),
            contributing_years: outcome.climatology.contributing_years.len(),
            skipped_years: outcome.climatology.skipped_years.clone(),
            stats: outcome.climatology.grid.as_ref().map(GridSummary::of),
        },
        anomaly: outcome.anomaly.as_ref().map(GridSummary::of),
        notices: outcome.notices,
    };
    Json(response).into_response()
}

/// GET /maps/sst/:date - observed heat map PNG.
pub async fn sst_map_handler(
    Path(date): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let day = match parse_day(&state, &date) {
        Ok(day) => day,
        Err(resp) => return resp,
    };

    let grid = match pipeline::observed(&state, day).await {
        Ok(Some(grid)) => grid,
        Ok(None) => return error_response(&SstError::NoData { date: day.date() }),
        Err(e) => return error_response(&e),
    };

    let opts = RenderOptions {
        cell_px: state.config.render.cell_px,
    };
    match render_sst(&grid, opts) {
        Ok(map) => png_response(&map),
        Err(e) => error_response(&SstError::Render(e.to_string())),
    }
}

/// GET /maps/anomaly/:date - diverging anomaly map PNG, centered at zero.
pub async fn anomaly_map_handler(
    Path(date): Path<String>,
    Extension(state): Extension<Arc<AppState>>,
) -> Response {
    let day = match parse_day(&state, &date) {
        Ok(day) => day,
        Err(resp) => return resp,
    };

    let outcome = match pipeline::anomaly_product(&state, day).await {
        Ok(outcome) => outcome,
        Err(e) => return error_response(&e),
    };

    let Some(anomaly_grid) = outcome.anomaly else {
        let (key, _) = day.to_key().normalized();
        return error_response(&SstError::ClimatologyUnavailable {
            month: key.month,
            day: key.day,
        });
    };

    let opts = RenderOptions {
        cell_px: state.config.render.cell_px,
    };
    match render_anomaly(&anomaly_grid, opts) {
        Ok(map) => png_response(&map),
        Err(e) => error_response(&SstError::Render(e.to_string())),
    }
}

/// GET /api/cache/stats - daily grid cache statistics.
pub async fn cache_stats_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    let stats = state.cache.stats();
    Json(CacheStatsResponse {
        entries: state.cache.len().await,
        capacity: state.cache.capacity(),
        hits: stats.hits(),
        misses: stats.misses(),
        hit_rate_percent: stats.hit_rate(),
    })
    .into_response()
}

/// GET /health - liveness.
pub async fn health_handler() -> Response {
    Json(HealthResponse {
        service: "dashboard-api",
        status: "ok",
    })
    .into_response()
}

/// GET /ready - readiness.
pub async fn ready_handler() -> Response {
    Json(HealthResponse {
        service: "dashboard-api",
        status: "ready",
    })
    .into_response()
}

/// GET /metrics - Prometheus exposition.
pub async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> Response {
    handle.render().into_response()
}
