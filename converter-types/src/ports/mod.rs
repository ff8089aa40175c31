//! Port traits (interfaces for provider adapters).
//!
//! The session depends on these traits, not on the HTTP client,
//! so tests can drive it with in-memory providers.

mod conversion;
mod directory;

pub use conversion::ConversionProvider;
pub use directory::CurrencyDirectory;
