//! Dashboard routes: figures, CSV upload, and the AI analyses.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use super::ApiError;
use super::auth::SignedIn;
use crate::services::analytics::DashboardView;
use crate::services::now_ms;
use crate::services::suggestions::{
    self, BusinessInsights, ChartRecommendations, DashboardSuggestions, PredictiveAnalysis, SuggestionError,
    UserProfile,
};
use crate::services::upload::{self, CsvUpload, SalesSummary, UploadError};
use crate::state::AppState;

const FILE_NAME_HEADER: &str = "x-file-name";

fn suggestion_error(err: &SuggestionError) -> ApiError {
    let status = match err {
        SuggestionError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        SuggestionError::Generation { .. } => StatusCode::BAD_GATEWAY,
    };
    ApiError::from_error(status, err)
}

fn upload_error(err: &UploadError) -> ApiError {
    let status = match err {
        UploadError::NoFileSelected | UploadError::InvalidFileType => StatusCode::BAD_REQUEST,
        UploadError::ProcessingFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    ApiError::from_error(status, err)
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Chart series as generic records, for prompts that take raw data.
fn chart_records(view: &DashboardView) -> Vec<serde_json::Value> {
    view.chart
        .iter()
        .filter_map(|point| serde_json::to_value(point).ok())
        .collect()
}

// =============================================================================
// FIGURES
// =============================================================================

/// `GET /api/dashboard`
pub async fn get_dashboard(_auth: SignedIn, State(state): State<AppState>) -> Json<DashboardView> {
    Json(state.dashboard())
}

// =============================================================================
// UPLOAD
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub summary: SalesSummary,
}

/// `POST /api/upload`
///
/// Public check of a raw CSV body. The file name rides in `X-File-Name`.
/// The summary is returned but never replaces the dashboard figures.
pub async fn upload(headers: HeaderMap, body: Bytes) -> Result<Json<UploadResponse>, ApiError> {
    let summary = summarize(&headers, &body)?;
    Ok(Json(UploadResponse { message: format!("Processed {} records", summary.rows), summary }))
}

/// `POST /api/dashboard/upload`
///
/// Same body as `POST /api/upload`; on success the summary replaces the dashboard figures.
pub async fn import_sales(
    _auth: SignedIn,
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let summary = summarize(&headers, &body)?;
    state.replace_sales(summary.clone());
    tracing::info!(rows = summary.rows, "dashboard figures replaced by upload");
    Ok(Json(UploadResponse { message: format!("Imported {} records", summary.rows), summary }))
}

fn summarize(headers: &HeaderMap, body: &[u8]) -> Result<SalesSummary, ApiError> {
    let file = CsvUpload {
        file_name: header_text(headers, FILE_NAME_HEADER),
        content_type: header_text(headers, CONTENT_TYPE.as_str()),
        body,
    };
    upload::process(&file).map_err(|e| {
        tracing::warn!(error = %e, file_name = ?file.file_name, "upload rejected");
        upload_error(&e)
    })
}

// =============================================================================
// AI ANALYSES
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SuggestionsRequest {
    pub profile: Option<UserProfile>,
}

/// `POST /api/dashboard/suggestions`
pub async fn suggestions(
    SignedIn(session): SignedIn,
    State(state): State<AppState>,
    Json(body): Json<SuggestionsRequest>,
) -> Result<Json<DashboardSuggestions>, ApiError> {
    let view = state.dashboard();
    let data = serde_json::json!({
        "metrics": view.metrics,
        "chartData": view.chart,
        "categoryData": view.categories,
        "user": session.email,
        "timestamp": now_ms(),
    });
    let profile = body.profile.unwrap_or_default();
    suggestions::dashboard_suggestions(state.llm(), &profile, &data)
        .await
        .map(Json)
        .map_err(|e| suggestion_error(&e))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChartRequest {
    pub chart_type: String,
    /// Records to analyze. Defaults to the dashboard's monthly series.
    pub data: Option<Vec<serde_json::Value>>,
}

impl Default for ChartRequest {
    fn default() -> Self {
        Self { chart_type: "bar".into(), data: None }
    }
}

/// `POST /api/dashboard/chart-recommendations`
pub async fn chart_recommendations(
    _auth: SignedIn,
    State(state): State<AppState>,
    Json(body): Json<ChartRequest>,
) -> Result<Json<ChartRecommendations>, ApiError> {
    let records = body.data.unwrap_or_else(|| chart_records(&state.dashboard()));
    suggestions::chart_recommendations(state.llm(), &records, &body.chart_type)
        .await
        .map(Json)
        .map_err(|e| suggestion_error(&e))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct InsightsRequest {
    pub time_range: String,
}

impl Default for InsightsRequest {
    fn default() -> Self {
        Self { time_range: "the last 6 months".into() }
    }
}

/// `POST /api/dashboard/insights`
pub async fn insights(
    _auth: SignedIn,
    State(state): State<AppState>,
    Json(body): Json<InsightsRequest>,
) -> Result<Json<BusinessInsights>, ApiError> {
    let metrics = serde_json::to_value(state.dashboard().metrics).unwrap_or_default();
    suggestions::business_insights(state.llm(), &metrics, &body.time_range)
        .await
        .map(Json)
        .map_err(|e| suggestion_error(&e))
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ForecastRequest {
    pub forecast_period: String,
    /// History to forecast from. Defaults to the dashboard's monthly series.
    pub data: Option<Vec<serde_json::Value>>,
}

impl Default for ForecastRequest {
    fn default() -> Self {
        Self { forecast_period: "the next quarter".into(), data: None }
    }
}

/// `POST /api/dashboard/forecast`
pub async fn forecast(
    _auth: SignedIn,
    State(state): State<AppState>,
    Json(body): Json<ForecastRequest>,
) -> Result<Json<PredictiveAnalysis>, ApiError> {
    let history = body.data.unwrap_or_else(|| chart_records(&state.dashboard()));
    suggestions::predictive_analysis(state.llm(), &history, &body.forecast_period)
        .await
        .map(Json)
        .map_err(|e| suggestion_error(&e))
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
