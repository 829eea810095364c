use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::error::Error;

/// Which authentication strategy a connector uses for outbound calls.
///
/// Marker enum (no data) -- the actual secrets live in [`Credentials`].
/// Useful for branching on auth flow without carrying secret material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStrategy {
    /// No `Authorization` header.
    Anonymous,
    /// Username/password embedded in the connector configuration.
    Basic,
    /// Bearer token obtained per principal from a [`TokenIssuer`].
    Bearer,
}

/// External collaborator that exchanges a principal for a bearer token.
///
/// Token exchange itself (OAuth client credentials, SSO, ...) lives outside
/// this workspace; adapters only see the resulting token.
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    /// Issue a token valid for `scope`, acting on behalf of `principal`.
    async fn issue_token(&self, scope: &str, principal: Option<&str>)
    -> Result<SecretString, Error>;
}

/// Credentials a connector carries for its remote system.
#[derive(Clone)]
pub enum Credentials {
    Anonymous,

    /// HTTP basic auth with embedded credentials.
    Basic {
        username: String,
        password: SecretString,
    },

    /// Bearer token resolved per call through an external issuer.
    Bearer {
        issuer: Arc<dyn TokenIssuer>,
        scope: String,
    },
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(issuer: Arc<dyn TokenIssuer>, scope: impl Into<String>) -> Self {
        Self::Bearer {
            issuer,
            scope: scope.into(),
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        match self {
            Self::Anonymous => AuthStrategy::Anonymous,
            Self::Basic { .. } => AuthStrategy::Basic,
            Self::Bearer { .. } => AuthStrategy::Bearer,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Bearer { scope, .. } => f.debug_struct("Bearer").field("scope", scope).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_the_password() {
        let creds = Credentials::basic("jdoe", "1234".to_owned());
        let printed = format!("{creds:?}");
        assert!(printed.contains("jdoe"));
        assert!(!printed.contains("1234"));
        assert_eq!(creds.strategy(), AuthStrategy::Basic);
    }
}
