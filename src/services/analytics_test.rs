use super::*;
use crate::services::upload::{CsvUpload, process};

#[test]
fn sample_dashboard_figures() {
    let view = sample_dashboard();
    assert_eq!(view.source, DataSource::Sample);
    assert_eq!(view.metrics.total_customers, 2847);
    assert!((view.metrics.average_rating - 4.6).abs() < f64::EPSILON);
    assert!((view.metrics.growth_rate - 12.5).abs() < f64::EPSILON);
    assert_eq!(view.total_sales_display, "$125,000");
    assert_eq!(view.chart.len(), 6);
    assert_eq!(view.chart[0].month, "Jan");
    assert_eq!(view.chart[5].customers, 420);
    assert_eq!(view.recent_activity.len(), 3);
}

#[test]
fn sample_categories_sum_to_one_hundred() {
    let view = sample_dashboard();
    let total: f64 = view.categories.iter().map(|c| c.value).sum();
    assert!((total - 100.0).abs() < f64::EPSILON);
    assert_eq!(view.categories[0].category, "Electronics");
    assert_eq!(view.categories[0].color, "#3B82F6");
    assert_eq!(view.categories[4].color, "#8B5CF6");
}

#[test]
fn dashboard_without_upload_is_sample() {
    assert_eq!(dashboard(None), sample_dashboard());
}

#[test]
fn dashboard_from_upload() {
    let summary = process(&CsvUpload {
        file_name: Some("q1.csv"),
        content_type: Some("text/csv"),
        body: b"month,amount,customer,rating\nJan,1000,Ada,5\nFeb,1500,Bo,4\n",
    })
    .unwrap();

    let view = dashboard(Some(&summary));
    assert_eq!(view.source, DataSource::Upload);
    assert_eq!(view.total_sales_display, "$2,500");
    assert_eq!(view.metrics.total_customers, 2);
    assert!((view.metrics.average_rating - 4.5).abs() < f64::EPSILON);
    assert!((view.metrics.growth_rate - 50.0).abs() < f64::EPSILON);
    assert_eq!(view.chart, summary.monthly);
    assert_eq!(view.recent_activity[0].message, "Uploaded q1.csv: 2 records");
}

#[test]
fn format_currency_groups_thousands() {
    assert_eq!(format_currency(0.0), "$0");
    assert_eq!(format_currency(999.0), "$999");
    assert_eq!(format_currency(1000.0), "$1,000");
    assert_eq!(format_currency(125_000.0), "$125,000");
    assert_eq!(format_currency(1_234_567.89), "$1,234,568");
    assert_eq!(format_currency(-2450.0), "-$2,450");
}

#[test]
fn round1_keeps_one_decimal() {
    assert!((round1(12.34) - 12.3).abs() < 1e-9);
    assert!((round1(12.36) - 12.4).abs() < 1e-9);
}

#[test]
fn dashboard_serializes_snake_case() {
    let json = serde_json::to_value(sample_dashboard()).unwrap();
    assert_eq!(json["source"], "sample");
    assert_eq!(json["metrics"]["total_sales"], 125_000.0);
    assert!(json["recent_activity"].is_array());
}
