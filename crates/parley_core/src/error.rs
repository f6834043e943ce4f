use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration-specific errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("TOML parse error: {0}")]
    TomlParse(String),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Error, Diagnostic, Debug)]
pub enum CoreError {
    #[error("Failed to fetch the model registry from {url}: {cause}")]
    #[diagnostic(
        code(parley_core::catalog_fetch_failed),
        help("The previous catalog stays in place; the next scheduled refresh will retry")
    )]
    CatalogFetchFailed { url: String, cause: String },

    #[error("Failed to fetch endpoints for model {model_id}: {cause}")]
    #[diagnostic(
        code(parley_core::endpoint_fetch_failed),
        help("The model is kept without endpoints and dropped by the viability filter")
    )]
    EndpointFetchFailed { model_id: String, cause: String },

    #[error("Generation with {model_id} failed: {cause}")]
    #[diagnostic(
        code(parley_core::generation_failed),
        help("The model has been blacklisted for the rest of this process")
    )]
    GenerationFailed { model_id: String, cause: String },

    #[error("Upstream provider HTTP error: {status}")]
    #[diagnostic(
        code(parley_core::provider_http_error),
        help("Request to '{url}' failed with HTTP status {status}")
    )]
    ProviderHttpError { url: String, status: u16, body: String },

    #[error("Preference store {operation} failed for user {user_id}: {cause}")]
    #[diagnostic(
        code(parley_core::preference_store),
        help("Check that the preference database is reachable and writable")
    )]
    PreferenceStore {
        operation: &'static str,
        user_id: String,
        cause: String,
    },

    #[error("Failed to fetch message {message_id}: {cause}")]
    #[diagnostic(code(parley_core::message_fetch_failed))]
    MessageFetchFailed { message_id: String, cause: String },

    #[error("Configuration error for field '{field}': {cause}")]
    #[diagnostic(
        code(parley_core::configuration_error),
        help("Check configuration file at {config_path}")
    )]
    ConfigurationError {
        config_path: String,
        field: String,
        #[source]
        cause: ConfigError,
    },

    #[error("Serialization error: {cause}")]
    #[diagnostic(
        code(parley_core::serialization_error),
        help("Failed to serialize/deserialize {data_type}")
    )]
    SerializationError {
        data_type: String,
        #[source]
        cause: serde_json::Error,
    },

    #[error("HTTP client error: {0}")]
    #[diagnostic(code(parley_core::http_client))]
    Http(#[from] reqwest::Error),
}

impl CoreError {
    /// Build a configuration error for a field with a plain-text reason.
    pub fn invalid_config(
        config_path: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let field = field.into();
        Self::ConfigurationError {
            config_path: config_path.into(),
            field: field.clone(),
            cause: ConfigError::InvalidValue {
                field,
                reason: reason.into(),
            },
        }
    }

    pub fn missing_config(config_path: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::ConfigurationError {
            config_path: config_path.into(),
            field: field.clone(),
            cause: ConfigError::MissingField(field),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failures_carry_their_cause() {
        let catalog = CoreError::CatalogFetchFailed {
            url: "https://openrouter.test/api/v1/models".to_string(),
            cause: "connection refused".to_string(),
        };
        assert_eq!(
            catalog.to_string(),
            "Failed to fetch the model registry from https://openrouter.test/api/v1/models: connection refused"
        );

        let endpoints = CoreError::EndpointFetchFailed {
            model_id: "a/b".to_string(),
            cause: "HTTP 502".to_string(),
        };
        assert!(endpoints.to_string().ends_with(": HTTP 502"));

        let message = CoreError::MessageFetchFailed {
            message_id: "42".to_string(),
            cause: "Unknown Message".to_string(),
        };
        assert!(message.to_string().contains("Unknown Message"));
    }

    #[test]
    fn test_store_and_config_errors_carry_their_cause() {
        let store = CoreError::PreferenceStore {
            operation: "set",
            user_id: "7".to_string(),
            cause: "database is locked".to_string(),
        };
        assert!(store.to_string().ends_with("database is locked"));

        let config = CoreError::missing_config("parley.toml", "discord.token");
        assert!(config.to_string().contains("Missing required field: discord.token"));
    }
}
