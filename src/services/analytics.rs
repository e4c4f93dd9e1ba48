//! Dashboard analytics: the figures behind `/dashboard`.
//!
//! Until a CSV has been uploaded the dashboard shows a fixed demonstration
//! data set. After an upload, the figures come from its `SalesSummary`.

use serde::{Deserialize, Serialize};

use super::upload::SalesSummary;

/// Colours assigned to categories in share order.
pub const CATEGORY_PALETTE: [&str; 5] = ["#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_sales: f64,
    pub total_customers: u64,
    pub average_rating: f64,
    /// Percent change of the last month over the one before.
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: String,
    pub sales: f64,
    pub customers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    /// Percent of total sales.
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub message: String,
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Sample,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardView {
    pub source: DataSource,
    pub metrics: Metrics,
    /// `metrics.total_sales` as whole US dollars, e.g. `$125,000`.
    pub total_sales_display: String,
    pub chart: Vec<MonthlyPoint>,
    pub categories: Vec<CategoryShare>,
    pub recent_activity: Vec<Activity>,
}

// =============================================================================
// BUILDERS
// =============================================================================

/// Dashboard for the latest upload, or the sample data when there is none.
#[must_use]
pub fn dashboard(summary: Option<&SalesSummary>) -> DashboardView {
    summary.map_or_else(sample_dashboard, dashboard_from_summary)
}

#[must_use]
pub fn sample_dashboard() -> DashboardView {
    let metrics = Metrics { total_sales: 125_000.0, total_customers: 2847, average_rating: 4.6, growth_rate: 12.5 };

    let chart = [
        ("Jan", 15_000.0, 250),
        ("Feb", 18_000.0, 280),
        ("Mar", 22_000.0, 320),
        ("Apr", 19_000.0, 290),
        ("May", 25_000.0, 380),
        ("Jun", 28_000.0, 420),
    ]
    .into_iter()
    .map(|(month, sales, customers)| MonthlyPoint { month: month.to_owned(), sales, customers })
    .collect();

    let categories = [("Electronics", 35.0), ("Clothing", 25.0), ("Home & Garden", 20.0), ("Sports", 15.0), ("Books", 5.0)]
        .into_iter()
        .zip(CATEGORY_PALETTE)
        .map(|((category, value), color)| CategoryShare { category: category.to_owned(), value, color: color.to_owned() })
        .collect();

    let recent_activity = [
        ("New sale recorded: $2,450", "2 hours ago"),
        ("New customer registered", "4 hours ago"),
        ("Customer review submitted: 5 stars", "6 hours ago"),
    ]
    .into_iter()
    .map(|(message, time)| Activity { message: message.to_owned(), time: time.to_owned() })
    .collect();

    DashboardView {
        source: DataSource::Sample,
        total_sales_display: format_currency(metrics.total_sales),
        metrics,
        chart,
        categories,
        recent_activity,
    }
}

fn dashboard_from_summary(summary: &SalesSummary) -> DashboardView {
    let metrics = Metrics {
        total_sales: summary.total_sales,
        total_customers: summary.total_customers,
        average_rating: summary.average_rating.unwrap_or(0.0),
        growth_rate: summary.growth_rate.unwrap_or(0.0),
    };
    let source_name = summary.file_name.as_deref().unwrap_or("sales data");
    let recent_activity = vec![Activity {
        message: format!("Uploaded {source_name}: {} records", summary.rows),
        time: "just now".to_owned(),
    }];

    DashboardView {
        source: DataSource::Upload,
        total_sales_display: format_currency(metrics.total_sales),
        metrics,
        chart: summary.monthly.clone(),
        categories: summary.categories.clone(),
        recent_activity,
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Whole US dollars with thousands separators: `125000.0` → `$125,000`.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_currency(amount: f64) -> String {
    let rounded = amount.round() as i64;
    let digits = rounded.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0 { format!("-${grouped}") } else { format!("${grouped}") }
}

/// Round to one decimal place.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
#[path = "analytics_test.rs"]
mod tests;
