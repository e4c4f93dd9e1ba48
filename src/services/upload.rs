//! Sales CSV upload: validate the file, parse it, summarize it.
//!
//! DESIGN
//! ======
//! Processing is all-or-nothing: any failure returns an `UploadError` and
//! leaves the previous summary in place. A file needs one sales amount
//! column (`amount`, `sales`, `revenue` or `total`, matched case-insensitively);
//! `customer`, `category`, `month` (or `date`) and `rating` are optional and
//! enrich the summary when present.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::ErrorCode;

use super::analytics::{CATEGORY_PALETTE, CategoryShare, MonthlyPoint, round1};

const AMOUNT_COLUMNS: [&str; 4] = ["amount", "sales", "revenue", "total"];
const CSV_MIME_TYPES: [&str; 2] = ["text/csv", "application/csv"];
const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Please select a CSV file to upload")]
    NoFileSelected,
    #[error("Please select a valid CSV file")]
    InvalidFileType,
    #[error("Upload failed: {0}")]
    ProcessingFailed(String),
}

impl ErrorCode for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoFileSelected => "E_NO_FILE_SELECTED",
            Self::InvalidFileType => "E_INVALID_FILE_TYPE",
            Self::ProcessingFailed(_) => "E_PROCESSING_FAILED",
        }
    }
}

/// One uploaded file as it arrived over HTTP.
#[derive(Debug, Clone, Copy)]
pub struct CsvUpload<'a> {
    pub file_name: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub body: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

/// Aggregate view of one uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub file_name: Option<String>,
    pub rows: usize,
    pub total_sales: f64,
    /// Distinct customers, or the row count when the file names none.
    pub total_customers: u64,
    pub average_rating: Option<f64>,
    pub growth_rate: Option<f64>,
    pub monthly: Vec<MonthlyPoint>,
    pub categories: Vec<CategoryShare>,
    #[serde(skip)]
    pub records: Vec<SalesRecord>,
}

// =============================================================================
// PROCESSING
// =============================================================================

/// Validate and summarize an uploaded file.
///
/// # Errors
///
/// - [`UploadError::NoFileSelected`] for an empty body.
/// - [`UploadError::InvalidFileType`] when neither the content type nor the
///   file name identify a CSV file, or either contradicts it.
/// - [`UploadError::ProcessingFailed`] when the CSV cannot be read, has no
///   amount column, has no data rows, or holds an unreadable value.
pub fn process(upload: &CsvUpload<'_>) -> Result<SalesSummary, UploadError> {
    if upload.body.is_empty() {
        return Err(UploadError::NoFileSelected);
    }
    if !is_csv(upload.file_name, upload.content_type) {
        return Err(UploadError::InvalidFileType);
    }

    let records = parse_records(upload.body)?;
    if records.is_empty() {
        return Err(UploadError::ProcessingFailed("the file has no data rows".into()));
    }

    let summary = summarize(upload.file_name, records);
    tracing::info!(
        rows = summary.rows,
        total_sales = summary.total_sales,
        months = summary.monthly.len(),
        "sales file processed"
    );
    Ok(summary)
}

fn is_csv(file_name: Option<&str>, content_type: Option<&str>) -> bool {
    let type_ok = content_type.map(|raw| {
        let mime = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        CSV_MIME_TYPES.contains(&mime.as_str())
    });
    let name_ok = file_name.map(|name| name.to_ascii_lowercase().ends_with(".csv"));

    match (type_ok, name_ok) {
        (None, None) => false,
        (type_ok, name_ok) => type_ok.unwrap_or(true) && name_ok.unwrap_or(true),
    }
}

struct Columns {
    amount: usize,
    customer: Option<usize>,
    category: Option<usize>,
    month: Option<usize>,
    date: Option<usize>,
    rating: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, UploadError> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let position = |wanted: &str| names.iter().position(|n| n == wanted);

        let amount = AMOUNT_COLUMNS
            .iter()
            .find_map(|c| position(c))
            .ok_or_else(|| UploadError::ProcessingFailed("missing a sales amount column (amount, sales, revenue or total)".into()))?;

        Ok(Self {
            amount,
            customer: position("customer"),
            category: position("category"),
            month: position("month"),
            date: position("date"),
            rating: position("rating"),
        })
    }
}

fn parse_records(body: &[u8]) -> Result<Vec<SalesRecord>, UploadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body);

    let headers = reader
        .headers()
        .map_err(|e| UploadError::ProcessingFailed(format!("unreadable header row: {e}")))?
        .clone();
    let columns = Columns::locate(&headers)?;

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let row = row.map_err(|e| UploadError::ProcessingFailed(format!("line {line}: {e}")))?;
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).filter(|v| !v.is_empty());

        let raw_amount = row.get(columns.amount).unwrap_or_default();
        let amount = parse_amount(raw_amount)
            .ok_or_else(|| UploadError::ProcessingFailed(format!("line {line}: invalid amount '{raw_amount}'")))?;

        let rating = match cell(columns.rating) {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .ok()
                    .filter(|r| r.is_finite())
                    .ok_or_else(|| UploadError::ProcessingFailed(format!("line {line}: invalid rating '{raw}'")))?,
            ),
            None => None,
        };

        let month = cell(columns.month)
            .map(month_label)
            .or_else(|| cell(columns.date).map(month_from_date));

        records.push(SalesRecord {
            amount,
            customer: cell(columns.customer).map(str::to_owned),
            category: cell(columns.category).map(str::to_owned),
            month,
            rating,
        });
    }
    Ok(records)
}

/// Accepts `1234.5`, `$1,234.50`, and `-20`.
fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, '$' | ',' | ' ')).collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `3`, `03`, `mar`, `March` → `Mar`. Anything else is kept as written.
fn month_label(raw: &str) -> String {
    if let Some(label) = raw.parse::<usize>().ok().and_then(month_by_number) {
        return label.to_owned();
    }
    let lower = raw.to_ascii_lowercase();
    MONTHS
        .iter()
        .find(|m| lower.len() >= 3 && lower.starts_with(&m.to_ascii_lowercase()))
        .map_or_else(|| raw.to_owned(), |m| (*m).to_owned())
}

/// `2024-03-15` and `2024/03` read the second field; `03/15/2024` reads the first.
fn month_from_date(raw: &str) -> String {
    let parts: Vec<&str> = raw.split(['-', '/']).collect();
    let month_part = match parts.as_slice() {
        [year, month, ..] if year.len() == 4 => Some(*month),
        [month, _, ..] => Some(*month),
        _ => None,
    };
    month_part
        .and_then(|m| m.parse::<usize>().ok())
        .and_then(month_by_number)
        .map_or_else(|| raw.to_owned(), str::to_owned)
}

fn month_by_number(n: usize) -> Option<&'static str> {
    n.checked_sub(1).and_then(|i| MONTHS.get(i).copied())
}

fn calendar_index(label: &str) -> Option<usize> {
    MONTHS.iter().position(|m| *m == label)
}

// =============================================================================
// SUMMARY
// =============================================================================

#[allow(clippy::cast_precision_loss)]
fn summarize(file_name: Option<&str>, records: Vec<SalesRecord>) -> SalesSummary {
    let total_sales: f64 = records.iter().map(|r| r.amount).sum();
    let total_customers = customer_count(&records);

    let ratings: Vec<f64> = records.iter().filter_map(|r| r.rating).collect();
    let average_rating = (!ratings.is_empty()).then(|| round1(ratings.iter().sum::<f64>() / ratings.len() as f64));

    let monthly = monthly_series(&records);
    let growth_rate = match monthly.as_slice() {
        [.., previous, last] if previous.sales != 0.0 => {
            Some(round1((last.sales - previous.sales) / previous.sales * 100.0))
        }
        _ => None,
    };

    SalesSummary {
        file_name: file_name.map(str::to_owned),
        rows: records.len(),
        total_sales,
        total_customers,
        average_rating,
        growth_rate,
        monthly,
        categories: category_shares(&records, total_sales),
        records,
    }
}

fn customer_count<'a>(records: impl IntoIterator<Item = &'a SalesRecord>) -> u64 {
    let mut rows = 0_usize;
    let mut named: HashSet<&str> = HashSet::new();
    for record in records {
        rows += 1;
        if let Some(customer) = record.customer.as_deref() {
            named.insert(customer);
        }
    }
    let count = if named.is_empty() { rows } else { named.len() };
    u64::try_from(count).unwrap_or(u64::MAX)
}

/// Months in calendar order when every label is a known month, first-seen
/// order otherwise. Records without a month are left out.
fn monthly_series(records: &[SalesRecord]) -> Vec<MonthlyPoint> {
    let mut order: Vec<&str> = Vec::new();
    for month in records.iter().filter_map(|r| r.month.as_deref()) {
        if !order.contains(&month) {
            order.push(month);
        }
    }
    if let Some(indexed) = order.iter().map(|m| calendar_index(m)).collect::<Option<Vec<usize>>>() {
        let mut pairs: Vec<(usize, &str)> = indexed.into_iter().zip(order).collect();
        pairs.sort_by_key(|(index, _)| *index);
        order = pairs.into_iter().map(|(_, month)| month).collect();
    }

    order
        .into_iter()
        .map(|month| {
            let in_month = || records.iter().filter(move |r| r.month.as_deref() == Some(month));
            MonthlyPoint {
                month: month.to_owned(),
                sales: in_month().map(|r| r.amount).sum(),
                customers: customer_count(in_month()),
            }
        })
        .collect()
}

/// Category shares of total sales, largest first, coloured in that order.
fn category_shares(records: &[SalesRecord], total_sales: f64) -> Vec<CategoryShare> {
    let mut sums: Vec<(String, f64)> = Vec::new();
    for record in records {
        let Some(category) = record.category.as_deref() else { continue };
        match sums.iter_mut().find(|(name, _)| name == category) {
            Some((_, sum)) => *sum += record.amount,
            None => sums.push((category.to_owned(), record.amount)),
        }
    }
    sums.sort_by(|a, b| b.1.total_cmp(&a.1));

    sums.into_iter()
        .enumerate()
        .map(|(i, (category, sum))| CategoryShare {
            category,
            value: if total_sales == 0.0 { 0.0 } else { round1(sum / total_sales * 100.0) },
            color: CATEGORY_PALETTE[i % CATEGORY_PALETTE.len()].to_owned(),
        })
        .collect()
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
