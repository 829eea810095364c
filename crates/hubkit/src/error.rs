//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use hubkit_config::ConfigError;
use hubkit_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach {url}")]
    #[diagnostic(
        code(hubkit::connection_failed),
        help("Check that the remote system is running and reachable.\nReason: {reason}")
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(hubkit::auth_failed),
        help("Verify the connector's username/password or token scope.")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured for connector '{connector}'")]
    #[diagnostic(
        code(hubkit::no_credentials),
        help("Set `password` or `password_env` under [connectors.{connector}].")
    )]
    NoCredentials { connector: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{what} '{identifier}' not found")]
    #[diagnostic(
        code(hubkit::not_found),
        help("Run: hubkit {list_command} to see what exists")
    )]
    NotFound {
        what: String,
        identifier: String,
        list_command: String,
    },

    #[error("Operation '{operation}' is not supported on '{path}'")]
    #[diagnostic(code(hubkit::unsupported))]
    Unsupported { operation: String, path: String },

    #[error("{message}")]
    #[diagnostic(code(hubkit::remote))]
    Remote { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(hubkit::validation))]
    Validation { field: String, reason: String },

    // ── Configuration / storage ──────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(hubkit::config),
        help("Check the config file and HUBKIT_* environment variables.")
    )]
    Config(Box<figment::Error>),

    #[error("Cursor store error: {message}")]
    #[diagnostic(
        code(hubkit::storage),
        help("Check `defaults.cursor_store` and the file's permissions.")
    )]
    Storage { message: String },

    #[error("Internal error: {0}")]
    #[diagnostic(code(hubkit::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Output serialization failed: {0}")]
    #[diagnostic(code(hubkit::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::PERMISSION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },
            CoreError::Unsupported { operation, path } => CliError::Unsupported { operation, path },
            CoreError::Connection { url, reason } => CliError::ConnectionFailed { url, reason },
            CoreError::Authentication { message } => CliError::AuthFailed { message },
            CoreError::NotFound { path } => CliError::NotFound {
                what: "path".into(),
                identifier: path,
                list_command: "cursors list".into(),
            },
            CoreError::ConnectorNotFound { id } => CliError::NotFound {
                what: "connector".into(),
                identifier: id,
                list_command: "config connectors".into(),
            },
            err @ (CoreError::Remote { .. }
            | CoreError::Schema { .. }
            | CoreError::Overloaded { .. }) => CliError::Remote {
                message: err.to_string(),
            },
            CoreError::Storage { message } => CliError::Storage { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { connector } => CliError::NoCredentials { connector },
            ConfigError::UnknownConnector { id } => CliError::NotFound {
                what: "connector".into(),
                identifier: id,
                list_command: "config connectors".into(),
            },
            ConfigError::Figment(err) => CliError::Config(err),
            ConfigError::Client(err) => CoreError::from(err).into(),
            ConfigError::Io(err) => CliError::Io(err),
            other @ (ConfigError::Serialization(_) | ConfigError::Logging(_)) => {
                CliError::Validation {
                    field: "config".into(),
                    reason: other.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let cases = [
            (CoreError::Validation { message: "x".into() }, exit_code::USAGE),
            (CoreError::Authentication { message: "x".into() }, exit_code::AUTH),
            (CoreError::ConnectorNotFound { id: "x".into() }, exit_code::NOT_FOUND),
            (
                CoreError::Unsupported {
                    operation: "insert".into(),
                    path: "dataSets".into(),
                },
                exit_code::PERMISSION,
            ),
            (
                CoreError::Connection {
                    url: "http://remote".into(),
                    reason: "refused".into(),
                },
                exit_code::CONNECTION,
            ),
            (CoreError::Storage { message: "x".into() }, exit_code::GENERAL),
        ];
        for (core, code) in cases {
            let label = core.to_string();
            assert_eq!(CliError::from(core).exit_code(), code, "{label}");
        }
    }

    #[test]
    fn unknown_connector_points_at_listing() {
        let err = CliError::from(ConfigError::UnknownConnector { id: "r9".into() });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "connector 'r9' not found");
    }
}
