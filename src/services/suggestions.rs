//! AI suggestions: four prompt/response pairs over the dashboard data.
//!
//! DESIGN
//! ======
//! Each generator renders a prompt, asks the model for JSON, and parses the
//! answer into a typed payload. Models often wrap JSON in Markdown fences,
//! so fences are stripped first. An answer that still does not parse is not
//! an error: the caller gets the generator's documented default payload and
//! the raw text goes to the log. Only a failed model call is an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;
use crate::llm::{LlmError, TextGenerator};

const CHART_SAMPLE_RECORDS: usize = 5;
const FORECAST_HISTORY_RECORDS: usize = 10;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SuggestionError {
    #[error("Failed to generate {what}. Please try again.")]
    Generation {
        what: &'static str,
        #[source]
        source: LlmError,
    },
    #[error("AI features are not configured")]
    NotConfigured,
}

impl ErrorCode for SuggestionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Generation { .. } => "E_GENERATION_FAILED",
            Self::NotConfigured => "E_AI_NOT_CONFIGURED",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Generation { .. })
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    #[default]
    Stable,
}

/// Who the suggestions are for. Unset fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub industry: String,
    pub role: String,
    pub experience_level: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self { industry: "Technology".into(), role: "Manager".into(), experience_level: "Intermediate".into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSuggestions {
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub additional_metrics: Vec<String>,
    pub trends: String,
    pub priority: Level,
}

impl Default for DashboardSuggestions {
    fn default() -> Self {
        Self {
            insights: Vec::new(),
            recommendations: Vec::new(),
            additional_metrics: Vec::new(),
            trends: ANALYSIS_COMPLETED.into(),
            priority: Level::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartRecommendations {
    pub recommended_chart: String,
    pub color_scheme: Vec<String>,
    pub layout_tips: Vec<String>,
    pub interactive_features: Vec<String>,
    pub reasoning: String,
}

impl Default for ChartRecommendations {
    fn default() -> Self {
        Self::fallback("bar")
    }
}

impl ChartRecommendations {
    /// Keeps the chart the user already has.
    #[must_use]
    pub fn fallback(current_chart: &str) -> Self {
        Self {
            recommended_chart: current_chart.to_owned(),
            color_scheme: strings(&["#667eea", "#764ba2", "#f093fb"]),
            layout_tips: strings(&["Optimize for mobile viewing"]),
            interactive_features: strings(&["Tooltips", "Zoom"]),
            reasoning: ANALYSIS_COMPLETED.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BusinessInsights {
    pub kpi_analysis: String,
    pub growth_trends: Vec<String>,
    pub concerns: Vec<String>,
    pub strategic_recommendations: Vec<String>,
    pub confidence: Level,
}

impl Default for BusinessInsights {
    fn default() -> Self {
        Self {
            kpi_analysis: ANALYSIS_COMPLETED.into(),
            growth_trends: strings(&["Positive trend observed"]),
            concerns: strings(&["Monitor for changes"]),
            strategic_recommendations: strings(&["Continue current strategy"]),
            confidence: Level::Medium,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastPoint {
    pub period: String,
    pub value: serde_json::Value,
}

impl Default for ForecastPoint {
    fn default() -> Self {
        Self { period: String::new(), value: serde_json::Value::Null }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceInterval {
    pub lower: serde_json::Value,
    pub upper: serde_json::Value,
}

impl Default for ConfidenceInterval {
    fn default() -> Self {
        Self { lower: serde_json::Value::Null, upper: serde_json::Value::Null }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PredictiveAnalysis {
    pub trend: Trend,
    pub seasonal_patterns: String,
    pub forecast: Vec<ForecastPoint>,
    pub confidence_interval: ConfidenceInterval,
    pub risk_factors: Vec<String>,
    pub accuracy: Level,
}

impl Default for PredictiveAnalysis {
    fn default() -> Self {
        Self {
            trend: Trend::Stable,
            seasonal_patterns: "No clear seasonal pattern".into(),
            forecast: vec![ForecastPoint { period: "next_month".into(), value: "estimated_value".into() }],
            confidence_interval: ConfidenceInterval { lower: "min_value".into(), upper: "max_value".into() },
            risk_factors: strings(&["Market volatility"]),
            accuracy: Level::Medium,
        }
    }
}

const ANALYSIS_COMPLETED: &str = "Analysis completed";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

// =============================================================================
// GENERATORS
// =============================================================================

/// Insights, recommendations and metrics to track for the dashboard.
///
/// # Errors
///
/// [`SuggestionError::NotConfigured`] without a model, or
/// [`SuggestionError::Generation`] if the model call fails.
pub async fn dashboard_suggestions(
    llm: Option<&dyn TextGenerator>,
    profile: &UserProfile,
    dashboard: &serde_json::Value,
) -> Result<DashboardSuggestions, SuggestionError> {
    let prompt = format!(
        "You are the AI assistant of a business dashboard. Analyze the user profile and dashboard metrics \
         below and give actionable insights and suggestions.\n\n\
         User profile:\n- Industry: {industry}\n- Role: {role}\n- Experience level: {experience}\n\n\
         Dashboard metrics:\n{metrics}\n\n\
         Provide:\n\
         1. 3-5 actionable business insights based on the metrics\n\
         2. 2-3 recommendations for improving dashboard performance\n\
         3. 1-2 additional metrics worth tracking\n\
         4. A brief summary of key trends\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"insights\": [\"...\"], \"recommendations\": [\"...\"], \"additionalMetrics\": [\"...\"], \
         \"trends\": \"...\", \"priority\": \"high|medium|low\"}}",
        industry = profile.industry,
        role = profile.role,
        experience = profile.experience_level,
        metrics = pretty(dashboard),
    );
    generate_json(llm, "AI suggestions", &prompt, DashboardSuggestions::default).await
}

/// Best chart type and presentation for the given records.
///
/// # Errors
///
/// See [`dashboard_suggestions`].
pub async fn chart_recommendations(
    llm: Option<&dyn TextGenerator>,
    records: &[serde_json::Value],
    chart_type: &str,
) -> Result<ChartRecommendations, SuggestionError> {
    let sample = &records[..records.len().min(CHART_SAMPLE_RECORDS)];
    let prompt = format!(
        "You are a data visualization expert. Recommend the best chart type and visualization approach \
         for this data.\n\n\
         Data sample (first {CHART_SAMPLE_RECORDS} records):\n{sample}\n\
         Current chart type: {chart_type}\n\
         Data points: {count}\n\n\
         Provide:\n\
         1. The recommended chart type\n\
         2. Color scheme suggestions\n\
         3. Layout optimization tips\n\
         4. Interactive features to consider\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"recommendedChart\": \"...\", \"colorScheme\": [\"...\"], \"layoutTips\": [\"...\"], \
         \"interactiveFeatures\": [\"...\"], \"reasoning\": \"...\"}}",
        sample = pretty(&serde_json::Value::from(sample.to_vec())),
        count = records.len(),
    );
    generate_json(llm, "chart recommendations", &prompt, || ChartRecommendations::fallback(chart_type)).await
}

/// KPI analysis, growth trends and concerns over a time range.
///
/// # Errors
///
/// See [`dashboard_suggestions`].
pub async fn business_insights(
    llm: Option<&dyn TextGenerator>,
    metrics: &serde_json::Value,
    time_range: &str,
) -> Result<BusinessInsights, SuggestionError> {
    let prompt = format!(
        "You are a business analyst. Give insights on these metrics over {time_range}.\n\n\
         Metrics:\n{metrics}\n\n\
         Provide:\n\
         1. Key performance indicator analysis\n\
         2. Growth trends\n\
         3. Potential areas of concern\n\
         4. Strategic recommendations\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"kpiAnalysis\": \"...\", \"growthTrends\": [\"...\"], \"concerns\": [\"...\"], \
         \"strategicRecommendations\": [\"...\"], \"confidence\": \"high|medium|low\"}}",
        metrics = pretty(metrics),
    );
    generate_json(llm, "business insights", &prompt, BusinessInsights::default).await
}

/// Trend, seasonality and forecast from the most recent history.
///
/// # Errors
///
/// See [`dashboard_suggestions`].
pub async fn predictive_analysis(
    llm: Option<&dyn TextGenerator>,
    history: &[serde_json::Value],
    forecast_period: &str,
) -> Result<PredictiveAnalysis, SuggestionError> {
    let recent = &history[history.len().saturating_sub(FORECAST_HISTORY_RECORDS)..];
    let prompt = format!(
        "You are a data scientist. Perform a predictive analysis of this historical data for {forecast_period}.\n\n\
         Historical data (last {FORECAST_HISTORY_RECORDS} records):\n{recent}\n\n\
         Provide:\n\
         1. Trend analysis\n\
         2. Seasonal patterns\n\
         3. Forecast values\n\
         4. Confidence intervals\n\
         5. Risk factors\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"trend\": \"increasing|decreasing|stable\", \"seasonalPatterns\": \"...\", \
         \"forecast\": [{{\"period\": \"...\", \"value\": \"...\"}}], \
         \"confidenceInterval\": {{\"lower\": \"...\", \"upper\": \"...\"}}, \
         \"riskFactors\": [\"...\"], \"accuracy\": \"high|medium|low\"}}",
        recent = pretty(&serde_json::Value::from(recent.to_vec())),
    );
    generate_json(llm, "predictive analysis", &prompt, PredictiveAnalysis::default).await
}

// =============================================================================
// RESPONSE HANDLING
// =============================================================================

async fn generate_json<T, F>(
    llm: Option<&dyn TextGenerator>,
    what: &'static str,
    prompt: &str,
    fallback: F,
) -> Result<T, SuggestionError>
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let llm = llm.ok_or(SuggestionError::NotConfigured)?;
    let text = llm.generate(prompt).await.map_err(|source| {
        tracing::warn!(what, error = %source, "generation failed");
        SuggestionError::Generation { what, source }
    })?;
    Ok(parse_or_fallback(&text, what, fallback))
}

/// Parse model output as `T`, or log it and use `fallback`.
pub(crate) fn parse_or_fallback<T, F>(text: &str, what: &str, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    match serde_json::from_str(strip_code_fences(text)) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(what, error = %e, raw = %text, "model answered with malformed JSON; using default payload");
            fallback()
        }
    }
}

/// Remove a surrounding Markdown code fence (with or without a language tag).
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) on the opening line.
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
#[path = "suggestions_test.rs"]
mod tests;
