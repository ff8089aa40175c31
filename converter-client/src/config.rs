//! Provider configuration.

use converter_types::ConfigError;

/// Environment variable holding the CurrencyBeacon API key.
pub const API_KEY_VAR: &str = "CURRENCY_BEACON_API_KEY";
/// Environment variable holding the CurrencyBeacon base URL.
pub const API_URL_VAR: &str = "CURRENCY_BEACON_API_URL";

/// Credentials and endpoint for the CurrencyBeacon API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl ApiConfig {
    /// Validates both settings at once.
    ///
    /// Blank values count as missing; the error names every absent variable.
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Result<Self, ConfigError> {
        let api_key = api_key.filter(|v| !v.trim().is_empty());
        let base_url = base_url.filter(|v| !v.trim().is_empty());

        match (api_key, base_url) {
            (Some(api_key), Some(base_url)) => Ok(Self {
                api_key: api_key.trim().to_string(),
                base_url: base_url.trim().trim_end_matches('/').to_string(),
            }),
            (api_key, base_url) => {
                let mut missing = Vec::new();
                if api_key.is_none() {
                    missing.push(API_KEY_VAR);
                }
                if base_url.is_none() {
                    missing.push(API_URL_VAR);
                }
                Err(ConfigError::MissingVariables(missing))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_with_both_values() {
        let config = ApiConfig::new(Some("key".into()), Some("https://api.test.com".into())).unwrap();
        assert_eq!(config.api_key, "key");
        assert_eq!(config.base_url, "https://api.test.com");
    }

    #[test]
    fn test_config_trims_trailing_slash() {
        let config = ApiConfig::new(Some("key".into()), Some("https://api.test.com/v1/".into())).unwrap();
        assert_eq!(config.base_url, "https://api.test.com/v1");
    }

    #[test]
    fn test_missing_key() {
        let err = ApiConfig::new(None, Some("https://api.test.com".into())).unwrap_err();
        assert_eq!(err.missing(), &[API_KEY_VAR]);
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let err = ApiConfig::new(Some("  ".into()), Some(String::new())).unwrap_err();
        assert_eq!(err.missing(), &[API_KEY_VAR, API_URL_VAR]);
    }
}
