//! Shared configuration for the hubkit hub and CLI.
//!
//! TOML + environment layering, credential resolution (env + plaintext),
//! and translation into `hubkit_api` transport settings and
//! `hubkit_core::HubConfig`. Also owns `init_tracing` so every binary
//! configures logging the same way.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use hubkit_api::{Credentials, RestClient, TlsMode, TokenIssuer, TransportConfig};
use hubkit_core::HubConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for connector '{connector}'")]
    NoCredentials { connector: String },

    #[error("no connector '{id}' in configuration")]
    UnknownConnector { id: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] hubkit_api::Error),

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Shared token inbound pushes must present (plaintext; prefer
    /// `HUBKIT_CALLBACK_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_token: Option<String>,

    /// Named connector profiles, keyed by connector id.
    #[serde(default)]
    pub connectors: BTreeMap<String, ConnectorProfile>,
}

impl Config {
    pub fn connector(&self, id: &str) -> Result<&ConnectorProfile, ConfigError> {
        self.connectors
            .get(id)
            .ok_or_else(|| ConfigError::UnknownConnector { id: id.into() })
    }

    /// Connector ids `principal` may use, in id order.
    pub fn connectors_visible_to(&self, principal: Option<&str>) -> Vec<&str> {
        self.connectors
            .iter()
            .filter(|(_, profile)| profile.visible_to(principal))
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Where the durable cursor store lives.
    pub fn cursor_store_path(&self) -> PathBuf {
        self.defaults
            .cursor_store
            .clone()
            .unwrap_or_else(default_cursor_store_path)
    }

    /// Hub settings derived from this config.
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            callback_token: self.callback_token.clone().map(SecretString::from),
            ..HubConfig::default()
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    /// Outbound call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor_store: Option<PathBuf>,

    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_json: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            page_size: default_page_size(),
            cursor_store: None,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_page_size() -> u32 {
    50
}
fn default_log_level() -> String {
    "info".into()
}

/// A configured connector instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectorProfile {
    /// Adapter kind, e.g. "data_platform".
    pub kind: String,

    /// Remote system base URL.
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for basic auth (plaintext; prefer `password_env`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable holding the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Bearer token scope; switches the connector to issued tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_scope: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Principal that registered the connector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    /// Visible to every principal, not only the owner.
    #[serde(default)]
    pub shared: bool,
}

impl ConnectorProfile {
    pub fn visible_to(&self, principal: Option<&str>) -> bool {
        self.shared
            || self
                .owner
                .as_deref()
                .is_none_or(|owner| principal == Some(owner))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "hubkit", "hubkit").map_or_else(
        || fallback_dir(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the cursor store, under the platform data dir.
pub fn default_cursor_store_path() -> PathBuf {
    ProjectDirs::from("org", "hubkit", "hubkit").map_or_else(
        || fallback_dir(".local/share").join("cursors.json"),
        |dirs| dirs.data_dir().join("cursors.json"),
    )
}

fn fallback_dir(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("hubkit");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment.
///
/// Environment keys use `__` as the nesting separator so field names
/// keep their underscores: `HUBKIT_DEFAULTS__PAGE_SIZE=25`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading configuration");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HUBKIT_").split("__"));

    let config: Config = figment.extract()?;
    for (id, profile) in &config.connectors {
        validate_profile(id, profile)?;
    }
    Ok(config)
}

fn validate_profile(id: &str, profile: &ConnectorProfile) -> Result<(), ConfigError> {
    parse_url(&profile.url).map(drop)?;
    if profile.token_scope.is_some() && profile.username.is_some() {
        return Err(ConfigError::Validation {
            field: format!("connectors.{id}"),
            reason: "token_scope and username are mutually exclusive".into(),
        });
    }
    Ok(())
}

fn parse_url(raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a basic-auth password: `password_env`, then plaintext.
pub fn resolve_password(
    profile: &ConnectorProfile,
    connector_id: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        connector: connector_id.into(),
    })
}

/// Pick the credential strategy a profile describes.
///
/// `token_scope` needs an `issuer`; a bare `username` means basic auth;
/// neither means anonymous.
pub fn resolve_credentials(
    profile: &ConnectorProfile,
    connector_id: &str,
    issuer: Option<Arc<dyn TokenIssuer>>,
) -> Result<Credentials, ConfigError> {
    if let Some(ref scope) = profile.token_scope {
        let issuer = issuer.ok_or_else(|| ConfigError::Validation {
            field: format!("connectors.{connector_id}.token_scope"),
            reason: "no token issuer is available".into(),
        })?;
        return Ok(Credentials::bearer(issuer, scope.clone()));
    }
    if let Some(ref username) = profile.username {
        let password = resolve_password(profile, connector_id)?;
        return Ok(Credentials::basic(username.clone(), password));
    }
    Ok(Credentials::Anonymous)
}

/// Transport settings: profile overrides on top of the global defaults.
pub fn transport_config(profile: &ConnectorProfile, defaults: &Defaults) -> TransportConfig {
    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    TransportConfig::default().with_tls(tls).with_timeout(timeout)
}

/// Build the outbound client for connector `connector_id`.
pub fn connector_client(
    config: &Config,
    connector_id: &str,
    issuer: Option<Arc<dyn TokenIssuer>>,
) -> Result<RestClient, ConfigError> {
    let profile = config.connector(connector_id)?;
    let url = parse_url(&profile.url)?;
    let credentials = resolve_credentials(profile, connector_id, issuer)?;
    let transport = transport_config(profile, &config.defaults);
    Ok(RestClient::new(url, credentials, &transport)?)
}

// ── Logging ─────────────────────────────────────────────────────────

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise each `-v` raises the level one step
/// above `defaults.log_level`.
pub fn init_tracing(defaults: &Defaults, verbosity: u8) -> Result<(), ConfigError> {
    let level = match verbosity {
        0 => defaults.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if defaults.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}
