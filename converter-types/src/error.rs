//! Error types for the currency converter.
//!
//! Fetch errors are deliberately opaque: every upstream cause (transport,
//! status, malformed body, invalid input) collapses into one fixed message.

/// The currency directory could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Failed to fetch currencies")]
pub struct CurrenciesFetchError;

/// A conversion could not be performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Failed to convert currency")]
pub struct ConversionFetchError;

/// Required provider configuration is absent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variables: {}", .0.join(", "))]
    MissingVariables(Vec<&'static str>),
}

impl ConfigError {
    /// Names of the variables that were not set.
    pub fn missing(&self) -> &[&'static str] {
        match self {
            ConfigError::MissingVariables(vars) => vars,
        }
    }
}

/// Rejected user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Converter is not configured")]
    Unconfigured,
}
