//! # Converter Types
//!
//! Domain types and port traits for the currency converter.
//! This crate has ZERO IO dependencies - only data structures,
//! normalization rules, and trait definitions.
//!
//! ## Layout
//!
//! - `domain/` - Pure domain types (Currency, ConversionResult, RequestKey)
//! - `ports/` - Trait definitions that provider adapters must implement
//! - `dto/` - Raw CurrencyBeacon records and response envelopes
//! - `error/` - Fetch, configuration and input error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod ports;

// Re-export commonly used types
pub use domain::{ConversionResult, Currency, RequestKey, sorted_by_name};
pub use dto::{ConvertEnvelope, CurrencyRecord, normalize_currencies};
pub use error::{ConfigError, ConversionFetchError, CurrenciesFetchError, InputError};
pub use ports::{ConversionProvider, CurrencyDirectory};
