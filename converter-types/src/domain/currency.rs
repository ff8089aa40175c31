//! A currency the provider can convert from or to.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A selectable currency.
///
/// `code` is the unique ISO-style short code ("USD"); `symbol` falls back to
/// the code when the provider does not supply one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    pub code: String,
    pub symbol: String,
}

impl Currency {
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            symbol: symbol.into(),
        }
    }

    /// Display ordering for option lists: by name, case-insensitive first.
    pub fn cmp_by_name(&self, other: &Currency) -> Ordering {
        self.name
            .to_lowercase()
            .cmp(&other.name.to_lowercase())
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}

/// Returns a copy of `currencies` sorted for display.
pub fn sorted_by_name(currencies: &[Currency]) -> Vec<Currency> {
    let mut sorted = currencies.to_vec();
    sorted.sort_by(Currency::cmp_by_name);
    sorted
}
