//! Homebrew analytics documents.
//!
//! Each document published under `api/analytics/<kind>/<window>.json` has the
//! shape:
//!
//! ```json
//! {
//!   "category": "install",
//!   "total_items": 2,
//!   "start_date": "2024-01-01",
//!   "end_date": "2024-01-30",
//!   "total_count": 13344,
//!   "items": [
//!     { "number": 1, "formula": "wget", "count": "12,345", "percent": "92.51" },
//!     { "number": 2, "formula": "jq", "count": "999", "percent": "7.49" }
//!   ]
//! }
//! ```
//!
//! Only `end_date` and `items` are required. Counts stay as the formatted
//! strings the service publishes; [`normalize_count`] converts them one item
//! at a time so a single bad row never invalidates the whole document.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{NormalizeError, ParseError};

/// One fetched analytics document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsDocument {
    /// Category name (e.g. "install", "build_error").
    #[serde(default, deserialize_with = "deserialize_text")]
    pub category: String,

    /// Number of entries the service reports for the window.
    #[serde(default, deserialize_with = "deserialize_total")]
    pub total_items: Option<u64>,

    /// First day of the measurement window, as published.
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub start_date: Option<String>,

    /// Last day of the measurement window.
    pub end_date: NaiveDate,

    /// Aggregate count across all entries.
    #[serde(default, deserialize_with = "deserialize_total")]
    pub total_count: Option<u64>,

    /// Per-package rows in document order.
    pub items: Vec<AnalyticsItem>,
}

/// One row of an analytics document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsItem {
    /// Rank within the document.
    #[serde(default, deserialize_with = "deserialize_total")]
    pub number: Option<u64>,

    /// Package name.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub formula: String,

    /// Formatted count, e.g. "1,234". Empty when absent or `null`.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub count: String,

    /// Formatted share of the total, e.g. "0.12".
    #[serde(default, deserialize_with = "deserialize_text")]
    pub percent: String,
}

impl AnalyticsDocument {
    /// Decode a document from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The instant the measurement window ends: midnight UTC of `end_date`.
    ///
    /// Samples derived from this document carry this timestamp rather than the
    /// time they were scraped.
    pub fn end_timestamp(&self) -> DateTime<Utc> {
        self.end_date.and_time(NaiveTime::MIN).and_utc()
    }

    /// Items whose package name is exactly `formula`, in document order.
    pub fn items_named<'a>(&'a self, formula: &'a str) -> impl Iterator<Item = &'a AnalyticsItem> {
        self.items.iter().filter(move |item| item.formula == formula)
    }
}

impl AnalyticsItem {
    /// Numeric value of this item's count.
    pub fn value(&self) -> Result<f64, NormalizeError> {
        normalize_count(&self.count)
    }
}

/// Convert a formatted count such as `"1,234,567"` into a gauge value.
///
/// All `,` grouping separators are removed before parsing. Anything left that
/// is not a finite, non-negative number is rejected.
pub fn normalize_count(count: &str) -> Result<f64, NormalizeError> {
    let digits: String = count.chars().filter(|c| *c != ',').collect();
    if digits.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let value: f64 = digits
        .parse()
        .map_err(|_| NormalizeError::Invalid(count.to_string()))?;

    if !value.is_finite() || value.is_sign_negative() {
        return Err(NormalizeError::OutOfRange(count.to_string()));
    }

    Ok(value)
}

/// A scalar field as published: a string, a bare number, or `null`.
///
/// Row fields are decoded through this so that an odd value in one row
/// reaches the normalizer (or is ignored) instead of failing the document.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Text(String),
    Number(serde_json::Number),
    Other(serde::de::IgnoredAny),
}

impl RawScalar {
    fn into_text(self) -> Option<String> {
        match self {
            RawScalar::Text(s) => Some(s),
            RawScalar::Number(n) => Some(n.to_string()),
            RawScalar::Other(_) => None,
        }
    }
}

/// Strings and numbers become text; `null` and anything else become `""`.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(RawScalar::deserialize(deserializer)?
        .into_text()
        .unwrap_or_default())
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(RawScalar::deserialize(deserializer)?.into_text())
}

/// Informational totals the exporter never reads: anything that is not a
/// non-negative integer becomes `None`.
fn deserialize_total<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match RawScalar::deserialize(deserializer)? {
        RawScalar::Number(n) => n.as_u64(),
        _ => None,
    })
}
