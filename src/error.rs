//! Error types for kalshi-mcp.
//!
//! # Security Note
//!
//! Error messages are carefully crafted to NEVER include credentials.
//! Variants that relate to the signing key carry the key *path* at most,
//! never the key id or key material.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {path}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    NotFound {
        /// Path where the configuration file was expected.
        path: PathBuf,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation failure.
        message: String,
    },
}

/// Errors raised while talking to the Kalshi REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The upstream answered with a non-success status (after retries, if retriable).
    #[error("Kalshi API HTTP {status} for {url}")]
    Http {
        /// Requested URL.
        url: String,
        /// Final HTTP status code.
        status: u16,
    },

    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("Kalshi API request failed for {url}: {reason}")]
    Network {
        /// Requested URL.
        url: String,
        /// Low-level failure reason.
        reason: String,
    },

    /// The response body was not valid JSON.
    #[error("Kalshi API response was not valid JSON for {url}")]
    InvalidJson {
        /// Requested URL.
        url: String,
    },

    /// The response body was JSON but not an object.
    #[error("Kalshi API returned a non-object payload for {url}")]
    NonObject {
        /// Requested URL.
        url: String,
    },

    /// An authenticated endpoint was called without signing credentials.
    #[error("Authenticated Kalshi endpoint requires KALSHI_API_KEY_ID and KALSHI_API_KEY_PATH.")]
    MissingCredentials,

    /// The private key file could not be read.
    #[error("Unable to read API key file at {path}: {source}")]
    KeyRead {
        /// Configured key path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The private key file did not contain a usable RSA key.
    #[error("Unable to load private key from {path}.")]
    KeyParse {
        /// Configured key path.
        path: PathBuf,
    },

    /// The signing operation itself failed.
    #[error("Unable to sign Kalshi API request.")]
    Signing,

    /// A field required to build the result was missing or mistyped.
    #[error("Unexpected response shape from Kalshi API: {0}")]
    UnexpectedShape(String),

    /// The HTTP client could not be constructed or the request could not be built.
    #[error("Kalshi API client error: {0}")]
    Client(String),
}

impl ApiError {
    /// Returns `true` for failures caused by local configuration rather than the upstream.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials | Self::KeyRead { .. } | Self::KeyParse { .. }
        )
    }
}

/// Safety-net failures of a cursor pagination run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PaginationError {
    /// The page cap was reached while the upstream still reported more pages.
    #[error("Exceeded max_pages while paging {endpoint}; {hint}")]
    MaxPagesExceeded {
        /// Endpoint being paged.
        endpoint: String,
        /// Advice on how to narrow the run.
        hint: String,
    },

    /// The upstream handed back a cursor it had already returned in this run.
    #[error("Kalshi {endpoint} cursor repeated; aborting pagination.")]
    CursorRepeated {
        /// Endpoint being paged.
        endpoint: String,
    },
}

/// Errors surfaced by tool handlers.
///
/// These are domain failures: the protocol layer reports them as a tool result
/// with `isError: true`, not as a JSON-RPC error.
#[derive(Error, Debug)]
pub enum ToolError {
    /// A tool argument failed validation.
    #[error("{0}")]
    InvalidArgument(String),

    /// No tool is registered under this name.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The upstream call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A pagination run was aborted.
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl ToolError {
    /// Shorthand for an argument validation failure.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Errors raised while resolving a `kalshi://` resource URI.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// The URI was empty.
    #[error("Missing resource uri")]
    MissingUri,

    /// The URI did not use the `kalshi` scheme.
    #[error("Unsupported resource scheme (expected kalshi://)")]
    UnsupportedScheme,

    /// The URI matched a route prefix but was malformed.
    #[error("{0}")]
    InvalidUri(String),

    /// No route matches the URI.
    #[error("Unknown resource uri")]
    UnknownUri,

    /// A query parameter could not be coerced to the tool argument type.
    #[error("{0}")]
    InvalidQuery(String),

    /// The tool backing the resource failed.
    #[error(transparent)]
    Tool(#[from] ToolError),
}

impl ResourceError {
    /// Returns the upstream API failure behind this error, if that is what it is.
    #[must_use]
    pub const fn upstream(&self) -> Option<&ApiError> {
        match self {
            Self::Tool(ToolError::Api(err)) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let error = ConfigError::NotFound {
            path: PathBuf::from("/path/to/config.json"),
        };
        let msg = error.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("config.json"));
    }

    #[test]
    fn validation_error_display() {
        let error = ConfigError::ValidationError {
            message: "invalid setting".to_string(),
        };
        let msg = error.to_string();
        assert!(msg.contains("invalid setting"));
    }

    #[test]
    fn http_and_network_errors_are_distinguishable() {
        let http = ApiError::Http {
            url: "https://host/markets".to_string(),
            status: 503,
        };
        let network = ApiError::Network {
            url: "https://host/markets".to_string(),
            reason: "connection refused".to_string(),
        };
        assert_eq!(http.to_string(), "Kalshi API HTTP 503 for https://host/markets");
        assert!(network.to_string().contains("connection refused"));
        assert!(!network.to_string().contains("HTTP"));
    }

    #[test]
    fn credential_errors_are_configuration_errors() {
        assert!(ApiError::MissingCredentials.is_configuration());
        assert!(ApiError::KeyParse {
            path: PathBuf::from("/keys/kalshi.pem")
        }
        .is_configuration());
        assert!(!ApiError::Signing.is_configuration());
    }

    #[test]
    fn tool_error_wraps_pagination_text() {
        let err: ToolError = PaginationError::CursorRepeated {
            endpoint: "/markets".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Kalshi /markets cursor repeated; aborting pagination."
        );
    }

    #[test]
    fn resource_error_exposes_upstream_failure() {
        let err = ResourceError::Tool(ToolError::Api(ApiError::Signing));
        assert!(err.upstream().is_some());
        assert!(ResourceError::UnknownUri.upstream().is_none());
    }
}
