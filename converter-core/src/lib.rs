//! # Converter Core
//!
//! Request pipeline and view state for the currency converter.
//!
//! ## Layout
//!
//! - `query_cache` - Keyed result cache with staleness and in-flight de-duplication
//! - `debounce` - Trailing-edge debouncer with an owned timer handle
//! - `view` - Form state machine and text rendering
//! - `session` - Event loop tying the above to a provider
//!
//! The session is generic over the provider ports, allowing the HTTP
//! client or an in-memory provider to be injected.

pub mod debounce;
pub mod query_cache;
pub mod session;
pub mod view;

#[cfg(test)]
mod session_tests;

pub use debounce::Debouncer;
pub use query_cache::{QueryCache, QueryOptions, QuerySnapshot, QueryStatus};
pub use session::{ConverterSession, SessionOptions, SessionUpdate, is_valid_amount};
pub use view::{ConversionState, ConverterForm, ConverterView, CurrencyListState, ViewState};
