//! Conversion request identity and result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a single conversion lookup, passed through from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub value: f64,
    pub rate: f64,
}

/// Identity of a conversion: any change to any part requires a new fetch.
///
/// `amount` is kept as the raw text the user typed so that "1" and "1.0"
/// are distinct keys, exactly as they are distinct requests upstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    pub from: String,
    pub to: String,
    pub amount: String,
}

impl RequestKey {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            amount: amount.into(),
        }
    }

    /// True when none of the three parts is blank.
    pub fn is_complete(&self) -> bool {
        !self.from.trim().is_empty() && !self.to.trim().is_empty() && !self.amount.trim().is_empty()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}->{}", self.amount, self.from, self.to)
    }
}
