//! Error types for pipeline generation and the coordination API client.
//!
//! Configuration and validation problems are caught before any network call;
//! API errors carry enough classification for the retry layer to tell
//! transient failures from permanent ones.

use thiserror::Error;

/// The main error type for pipewright operations.
#[derive(Debug, Error)]
pub enum PipewrightError {
    /// Required settings were missing or invalid.
    #[error("{0}")]
    Settings(#[from] SettingsError),

    /// A generated pipeline failed structural validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A coordination API call failed.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A value could not be encoded for the wire (URL or query string).
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Error raised when the pipeline settings are incomplete or malformed.
///
/// Settings are validated once, eagerly, before any pipeline is generated;
/// downstream code never re-checks presence.
#[derive(Debug, Clone, Error)]
pub enum SettingsError {
    /// A required setting was empty or absent.
    #[error("missing required setting: {key}")]
    MissingKey {
        /// The setting name.
        key: String,
    },

    /// A setting that must be a URL did not parse as one.
    #[error("setting {key} is not a valid URL: {value}")]
    InvalidUrl {
        /// The setting name.
        key: String,
        /// The offending value.
        value: String,
    },
}

/// Error raised when a generated pipeline definition fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The resource/job names involved in the error.
    pub names: Vec<String>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            names: Vec::new(),
        }
    }

    /// Sets the names involved.
    #[must_use]
    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }
}

/// Errors from the pipeline coordination HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never completed (connection failure, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a 5xx status.
    #[error("server error ({status}) from {path}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// The pipeline or job does not exist on the server.
    ///
    /// This is a normal, expected state for pipelines that have not been
    /// created yet; callers map it to a sentinel status rather than failing.
    #[error("not found: {path}")]
    NotFound {
        /// Request path.
        path: String,
    },

    /// Authentication failed and could not be recovered by re-authenticating.
    #[error("authentication failed ({status})")]
    Auth {
        /// HTTP status code.
        status: u16,
    },

    /// The config version token did not match the server's current version.
    ///
    /// No automatic merge is attempted; the caller must re-fetch and retry
    /// the whole upsert.
    #[error("config version conflict for pipeline '{pipeline}'")]
    VersionConflict {
        /// The pipeline id.
        pipeline: String,
    },

    /// Any other 4xx response.
    #[error("client error ({status}) from {path}")]
    Client {
        /// HTTP status code.
        status: u16,
        /// Request path.
        path: String,
    },

    /// The response body could not be interpreted.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl crate::client::Transient for ApiError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Server { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Transient;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::MissingKey {
            key: "api_url".to_string(),
        };
        assert_eq!(err.to_string(), "missing required setting: api_url");
    }

    #[test]
    fn test_validation_error_names() {
        let err = PipelineValidationError::new("dangling resource")
            .with_names(vec!["site-content".to_string()]);
        assert_eq!(err.names, vec!["site-content".to_string()]);
        assert_eq!(err.to_string(), "dangling resource");
    }

    #[test]
    fn test_api_error_classification() {
        let server = ApiError::Server {
            status: 502,
            path: "/api/v1/info".to_string(),
        };
        assert!(server.is_transient());

        let not_found = ApiError::NotFound {
            path: "/api/v1/pipelines/x".to_string(),
        };
        assert!(!not_found.is_transient());

        let conflict = ApiError::VersionConflict {
            pipeline: "draft".to_string(),
        };
        assert!(!conflict.is_transient());
    }
}
