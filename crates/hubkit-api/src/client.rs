// Outbound JSON REST client
//
// Wraps `reqwest::Client` with base-URL resolution, credential application
// and status classification. Vendor adapters build their endpoint paths on
// top of this; nothing here knows a vendor's wire format.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest upstream body kept in an [`Error::Http`].
const MAX_ERROR_BODY: usize = 1024;

/// Raw HTTP client for one connector's remote system.
///
/// Cheap to clone; the inner `reqwest::Client` shares its connection pool.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    timeout: Duration,
}

impl RestClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        credentials: Credentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            http,
            base_url,
            credentials,
            timeout: transport.timeout,
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, credentials: Credentials) -> Self {
        Self {
            http,
            base_url,
            credentials,
            timeout: crate::transport::DEFAULT_TIMEOUT,
        }
    }

    /// The remote system's base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Resolve `path` against the base URL.
    ///
    /// Absolute URLs (e.g. callback URLs handed out by the remote system)
    /// are used as-is; anything else is appended below the base path.
    pub fn resolve(&self, path: &str) -> Result<Url, Error> {
        if let Ok(absolute) = Url::parse(path) {
            return Ok(absolute);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Resolve the auth header for `principal` once and return a client
    /// scoped to it.
    ///
    /// Bearer credentials call the token issuer here, so a request sequence
    /// issued through one `AuthorizedClient` performs a single exchange.
    pub async fn authorized(&self, principal: Option<&str>) -> Result<AuthorizedClient<'_>, Error> {
        let auth = match &self.credentials {
            Credentials::Anonymous => AuthHeader::None,
            Credentials::Basic { username, password } => AuthHeader::Basic { username, password },
            Credentials::Bearer { issuer, scope } => {
                trace!(scope = %scope, "requesting bearer token");
                AuthHeader::Bearer(issuer.issue_token(scope, principal).await?)
            }
        };
        Ok(AuthorizedClient { client: self, auth })
    }
}

enum AuthHeader<'a> {
    None,
    Basic {
        username: &'a str,
        password: &'a SecretString,
    },
    Bearer(SecretString),
}

/// A [`RestClient`] with credentials resolved for one principal.
pub struct AuthorizedClient<'a> {
    client: &'a RestClient,
    auth: AuthHeader<'a>,
}

impl AuthorizedClient<'_> {
    /// Send a GET request and decode the JSON body.
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        let url = self.client.resolve(path)?;
        self.send(Method::GET, url, None::<&Value>).await
    }

    /// Send a GET request with query-string parameters.
    ///
    /// Parameters are percent-encoded; keys keep the given order.
    pub async fn get_query(&self, path: &str, query: &[(&str, String)]) -> Result<Value, Error> {
        let mut url = self.client.resolve(path)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        self.send(Method::GET, url, None::<&Value>).await
    }

    /// Send a GET request and deserialize the body into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let value = self.get(path).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: value.to_string(),
        })
    }

    /// Send a POST request with a JSON body.
    pub async fn post(&self, path: &str, body: &(impl Serialize + Sync)) -> Result<Value, Error> {
        let url = self.client.resolve(path)?;
        self.send(Method::POST, url, Some(body)).await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put(&self, path: &str, body: &(impl Serialize + Sync)) -> Result<Value, Error> {
        let url = self.client.resolve(path)?;
        self.send(Method::PUT, url, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<Value, Error> {
        let url = self.client.resolve(path)?;
        self.send(Method::DELETE, url, None::<&Value>).await
    }

    // ── Transport mechanics ──────────────────────────────────────────

    fn apply_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            AuthHeader::None => builder,
            AuthHeader::Basic { username, password } => {
                builder.basic_auth(username, Some(password.expose_secret()))
            }
            AuthHeader::Bearer(token) => builder.bearer_auth(token.expose_secret()),
        }
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&(impl Serialize + Sync)>,
    ) -> Result<Value, Error> {
        debug!("{method} {url}");

        let mut builder = self.client.http.request(method, url.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = self
            .apply_auth(builder)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        parse_response(url, resp).await
    }

    fn classify_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout {
                timeout_secs: self.client.timeout.as_secs(),
            }
        } else {
            Error::Transport(err)
        }
    }
}

/// Map the status line onto the error taxonomy and decode the JSON body.
///
/// An empty success body decodes to `Value::Null`.
async fn parse_response(url: Url, resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Authentication {
            status: status.as_u16(),
            message: truncate(&body),
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(Error::NotFound {
            url: url.to_string(),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Http {
            status: status.as_u16(),
            body: truncate(&body),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview = truncate(&body);
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => body[..idx].to_owned(),
        None => body.to_owned(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> RestClient {
        RestClient::with_client(
            reqwest::Client::new(),
            Url::parse(base).unwrap(),
            Credentials::Anonymous,
        )
    }

    #[test]
    fn resolve_appends_below_base_path() {
        let c = client("https://apps.example.org/demo/");
        assert_eq!(
            c.resolve("api/dataSets.json").unwrap().as_str(),
            "https://apps.example.org/demo/api/dataSets.json"
        );
        assert_eq!(
            c.resolve("/api/dataSets.json").unwrap().as_str(),
            "https://apps.example.org/demo/api/dataSets.json"
        );
    }

    #[test]
    fn resolve_keeps_absolute_urls() {
        let c = client("https://apps.example.org/demo");
        assert_eq!(
            c.resolve("https://other.example.org/hook").unwrap().as_str(),
            "https://other.example.org/hook"
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "é".repeat(MAX_ERROR_BODY + 10);
        assert_eq!(truncate(&long).chars().count(), MAX_ERROR_BODY);
        assert_eq!(truncate("short"), "short");
    }
}
