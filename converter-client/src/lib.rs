//! # Converter Client
//!
//! A typed Rust client for the CurrencyBeacon API.
//!
//! The inherent methods report detailed [`ClientError`]s; the port
//! implementations log that detail and collapse it into the single
//! error kind the rest of the converter works with.

pub mod config;

pub use config::{API_KEY_VAR, API_URL_VAR, ApiConfig};

use converter_types::{
    ConversionFetchError, ConversionProvider, ConversionResult, ConvertEnvelope,
    CurrenciesFetchError, Currency, CurrencyDirectory, RequestKey, normalize_currencies,
};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameters")]
    InvalidParameters,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        // The request URL carries the API key.
        ClientError::Http(err.without_url())
    }
}

/// CurrencyBeacon API client.
#[derive(Clone)]
pub struct CurrencyBeaconClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl CurrencyBeaconClient {
    /// Creates a new client from validated configuration.
    pub fn new(config: ApiConfig) -> Self {
        Self::with_http(config, Client::new())
    }

    /// Creates a client on top of a preconfigured reqwest client.
    pub fn with_http(config: ApiConfig, http: Client) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            http,
        }
    }

    /// Lists supported currencies in provider order.
    pub async fn currencies(&self) -> Result<Vec<Currency>, ClientError> {
        let body: serde_json::Map<String, serde_json::Value> = self.get("/currencies", &[]).await?;
        Ok(normalize_currencies(body))
    }

    /// Converts `key.amount` from `key.from` to `key.to`.
    pub async fn conversion(&self, key: &RequestKey) -> Result<ConversionResult, ClientError> {
        if !key.is_complete() {
            return Err(ClientError::InvalidParameters);
        }

        let envelope: ConvertEnvelope = self
            .get(
                "/convert",
                &[
                    ("from", key.from.as_str()),
                    ("to", key.to.as_str()),
                    ("amount", key.amount.as_str()),
                ],
            )
            .await?;
        Ok(envelope.response)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .or_else(|| v.get("message"))
                        .and_then(|e| e.as_str())
                        .map(String::from)
                })
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait::async_trait]
impl CurrencyDirectory for CurrencyBeaconClient {
    async fn fetch_currencies(&self) -> Result<Vec<Currency>, CurrenciesFetchError> {
        self.currencies().await.map_err(|err| {
            tracing::warn!(error = %err, "currency directory request failed");
            CurrenciesFetchError
        })
    }
}

#[async_trait::async_trait]
impl ConversionProvider for CurrencyBeaconClient {
    async fn convert(&self, key: &RequestKey) -> Result<ConversionResult, ConversionFetchError> {
        self.conversion(key).await.map_err(|err| {
            tracing::warn!(error = %err, key = %key, "conversion request failed");
            ConversionFetchError
        })
    }
}
