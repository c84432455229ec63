//! Azure Document Intelligence credentials.
//!
//! These are loaded once at startup and handed to the analyzer explicitly.

use std::{env, fmt};

use crate::prelude::*;

/// Environment variable holding the service endpoint URL.
pub const ENDPOINT_VAR: &str = "AZURE_DI_ENDPOINT";

/// Environment variable holding the API key.
pub const KEY_VAR: &str = "AZURE_DI_KEY";

/// Environment variable holding the custom model ID.
pub const MODEL_ID_VAR: &str = "AZURE_DI_MODEL_ID";

/// Environment variable overriding the REST API version.
pub const API_VERSION_VAR: &str = "AZURE_DI_API_VERSION";

/// The model we use when `AZURE_DI_MODEL_ID` is not set.
pub const DEFAULT_MODEL_ID: &str = "arcolab-adi-model1-bmr";

/// The REST API version we speak by default.
pub const DEFAULT_API_VERSION: &str = "2024-11-30";

/// Connection settings for Azure Document Intelligence.
#[derive(Clone)]
pub struct AzureConfig {
    /// Service endpoint, without a trailing slash.
    pub endpoint: String,

    /// Subscription key.
    pub key: String,

    /// The model to analyze documents with.
    pub model_id: String,

    /// The `api-version` query parameter.
    pub api_version: String,
}

impl AzureConfig {
    /// Load our configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load our configuration using `lookup` to find variable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Treat blank values the same as missing ones.
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let required = |name: &str| {
            get(name).ok_or_else(|| anyhow!("environment variable {name} must be set"))
        };

        let endpoint = required(ENDPOINT_VAR)?.trim_end_matches('/').to_owned();
        let key = required(KEY_VAR)?;
        let model_id = get(MODEL_ID_VAR).unwrap_or_else(|| DEFAULT_MODEL_ID.to_owned());
        let api_version =
            get(API_VERSION_VAR).unwrap_or_else(|| DEFAULT_API_VERSION.to_owned());
        Ok(Self {
            endpoint,
            key,
            model_id,
            api_version,
        })
    }
}

// Keep the key out of our logs.
impl fmt::Debug for AzureConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &"<redacted>")
            .field("model_id", &self.model_id)
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn model_id_falls_back_to_default() {
        let config = AzureConfig::from_lookup(lookup_in(&[
            (ENDPOINT_VAR, "https://example.cognitiveservices.azure.com/"),
            (KEY_VAR, "secret"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint, "https://example.cognitiveservices.azure.com");
        assert_eq!(config.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }

    #[test]
    fn explicit_model_id_wins() {
        let config = AzureConfig::from_lookup(lookup_in(&[
            (ENDPOINT_VAR, "https://example.test"),
            (KEY_VAR, "secret"),
            (MODEL_ID_VAR, "my-model"),
        ]))
        .unwrap();
        assert_eq!(config.model_id, "my-model");
    }

    #[test]
    fn missing_key_is_an_error() {
        let err = AzureConfig::from_lookup(lookup_in(&[
            (ENDPOINT_VAR, "https://example.test"),
            (KEY_VAR, "   "),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains(KEY_VAR));
    }

    #[test]
    fn debug_output_hides_key() {
        let config = AzureConfig::from_lookup(lookup_in(&[
            (ENDPOINT_VAR, "https://example.test"),
            (KEY_VAR, "super-secret"),
        ]))
        .unwrap();
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
