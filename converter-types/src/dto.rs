//! Raw CurrencyBeacon payloads and their normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::{ConversionResult, Currency};

// ─────────────────────────────────────────────────────────────────────────────
// Currency directory
// ─────────────────────────────────────────────────────────────────────────────

/// One entry of the `/currencies` response, keyed by code upstream.
///
/// Every field is optional: the provider occasionally ships partial or
/// null-filled records, which normalization discards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyRecord {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub short_code: Option<String>,
    pub code: Option<String>,
    pub symbol: Option<String>,
    pub precision: Option<u32>,
    pub subunit: Option<u32>,
    pub symbol_first: Option<bool>,
    pub decimal_mark: Option<String>,
    pub thousands_separator: Option<String>,
}

impl CurrencyRecord {
    /// Maps the record to a [`Currency`], or `None` if it lacks a name or short code.
    pub fn into_currency(self) -> Option<Currency> {
        let name = non_empty(self.name)?;
        let code = non_empty(self.short_code)?;
        let symbol = non_empty(self.symbol).unwrap_or_else(|| code.clone());
        Some(Currency { name, code, symbol })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Normalizes a `/currencies` body into currencies, preserving document order.
///
/// Entries that are not objects, or that fail to map, are dropped silently.
pub fn normalize_currencies(body: Map<String, Value>) -> Vec<Currency> {
    body.into_iter()
        .filter_map(|(_, value)| serde_json::from_value::<CurrencyRecord>(value).ok())
        .filter_map(CurrencyRecord::into_currency)
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversion
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a successful `/convert` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertEnvelope {
    pub response: ConversionResult,
}
