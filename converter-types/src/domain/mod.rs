//! Domain models for the currency converter.

pub mod conversion;
pub mod currency;

pub use conversion::{ConversionResult, RequestKey};
pub use currency::{Currency, sorted_by_name};
