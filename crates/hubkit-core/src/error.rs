// ── Core error types ──
//
// The taxonomy every node operation reports through. Adapters never leak
// raw HTTP details: the `From<hubkit_api::Error>` impl translates
// transport-layer outcomes into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Local preconditions ──────────────────────────────────────────
    /// A local check failed before any remote call (missing required
    /// field, unknown action option, bad page number). Never retried.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// The operation is not part of the node's declared protocol.
    #[error("Operation not supported: {operation} on '{path}'")]
    Unsupported { operation: String, path: String },

    // ── Connection errors ────────────────────────────────────────────
    /// Network failure or timeout. Safe to retry.
    #[error("Cannot reach {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    /// A path or id did not resolve.
    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Connector not found: {id}")]
    ConnectorNotFound { id: String },

    /// Any other non-success upstream outcome.
    #[error("Upstream error{}: {body}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Remote { status: Option<u16>, body: String },

    /// A remote field type could not be mapped onto a schema.
    #[error("Unrecognized remote field type '{kind}'")]
    Schema { kind: String },

    // ── Infrastructure ───────────────────────────────────────────────
    /// A bounded queue had no room. Safe to retry.
    #[error("Overloaded: {message}")]
    Overloaded { message: String },

    #[error("Cursor store error: {message}")]
    Storage { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used across the crate.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn unsupported(operation: impl ToString, path: impl ToString) -> Self {
        Self::Unsupported {
            operation: operation.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn not_found(path: impl ToString) -> Self {
        Self::NotFound {
            path: path.to_string(),
        }
    }

    /// Returns `true` when retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Overloaded { .. })
    }

    /// The HTTP status a host should answer with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Authentication { .. } => 401,
            Self::NotFound { .. } | Self::ConnectorNotFound { .. } => 404,
            Self::Unsupported { .. } => 405,
            Self::Remote { .. } | Self::Schema { .. } => 502,
            Self::Connection { .. } | Self::Overloaded { .. } => 503,
            Self::Storage { .. } | Self::Internal(_) => 500,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hubkit_api::Error> for CoreError {
    fn from(err: hubkit_api::Error) -> Self {
        match err {
            hubkit_api::Error::Authentication { status, message } => CoreError::Authentication {
                message: format!("HTTP {status}: {message}"),
            },
            hubkit_api::Error::TokenIssuer(message) => CoreError::Authentication { message },
            hubkit_api::Error::Transport(ref e) => {
                let url = e
                    .url()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "<unknown>".into());
                if e.is_timeout() || e.is_connect() {
                    CoreError::Connection {
                        url,
                        reason: e.to_string(),
                    }
                } else if e.status().map(|s| s.as_u16()) == Some(404) {
                    CoreError::NotFound { path: url }
                } else {
                    CoreError::Remote {
                        status: e.status().map(|s| s.as_u16()),
                        body: e.to_string(),
                    }
                }
            }
            hubkit_api::Error::InvalidUrl(e) => CoreError::Validation {
                message: format!("Invalid URL: {e}"),
            },
            hubkit_api::Error::Timeout { timeout_secs } => CoreError::Connection {
                url: String::new(),
                reason: format!("timed out after {timeout_secs}s"),
            },
            hubkit_api::Error::Tls(reason) => CoreError::Connection {
                url: String::new(),
                reason: format!("TLS error: {reason}"),
            },
            hubkit_api::Error::NotFound { url } => CoreError::NotFound { path: url },
            hubkit_api::Error::Http { status, body } => CoreError::Remote {
                status: Some(status),
                body,
            },
            hubkit_api::Error::Deserialization { message, body: _ } => CoreError::Remote {
                status: None,
                body: format!("malformed response: {message}"),
            },
        }
    }
}
