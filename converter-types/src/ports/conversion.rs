//! Conversion provider port.

use crate::domain::{ConversionResult, RequestKey};
use crate::error::ConversionFetchError;

/// Performs single conversion lookups.
///
/// Implementations must reject incomplete keys with [`ConversionFetchError`]
/// before doing any IO.
#[async_trait::async_trait]
pub trait ConversionProvider: Send + Sync + 'static {
    async fn convert(&self, key: &RequestKey) -> Result<ConversionResult, ConversionFetchError>;
}
