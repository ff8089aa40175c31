//! Currency directory port.

use crate::domain::Currency;
use crate::error::CurrenciesFetchError;

/// Source of the supported currency list.
#[async_trait::async_trait]
pub trait CurrencyDirectory: Send + Sync + 'static {
    /// Fetches the normalized currency list in provider order.
    async fn fetch_currencies(&self) -> Result<Vec<Currency>, CurrenciesFetchError>;
}
