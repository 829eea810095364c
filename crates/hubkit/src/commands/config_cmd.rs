//! Config subcommand handlers.

use std::path::Path;

use serde::Serialize;
use tabled::Tabled;

use hubkit_config::{Config, ConnectorProfile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

const REDACTED: &str = "********";
const SECRET_KEYS: &[&str] = &["password", "callback_token"];

#[derive(Serialize)]
struct ConnectorSummary<'a> {
    id: &'a str,
    kind: &'a str,
    url: &'a str,
    auth: &'static str,
    shared: bool,
}

#[derive(Tabled)]
struct ConnectorRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "Auth")]
    auth: &'static str,
    #[tabled(rename = "Shared")]
    shared: bool,
}

fn auth_kind(profile: &ConnectorProfile) -> &'static str {
    if profile.token_scope.is_some() {
        "bearer"
    } else if profile.username.is_some() {
        "basic"
    } else {
        "anonymous"
    }
}

/// Replace secret-bearing values in a serialized config.
fn redact(value: &mut toml::Value) {
    match value {
        toml::Value::Table(table) => {
            for (key, v) in table.iter_mut() {
                if SECRET_KEYS.contains(&key.as_str()) && v.is_str() {
                    *v = toml::Value::String(REDACTED.into());
                } else {
                    redact(v);
                }
            }
        }
        toml::Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

fn redacted_config(cfg: &Config) -> Result<toml::Value, CliError> {
    let mut value = toml::Value::try_from(cfg).map_err(|e| CliError::Validation {
        field: "config".into(),
        reason: format!("failed to serialize config: {e}"),
    })?;
    redact(&mut value);
    Ok(value)
}

pub fn handle(
    args: ConfigArgs,
    cfg: &Config,
    path: &Path,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let value = redacted_config(cfg)?;
            let out = output::render_single(
                global.output,
                &value,
                |v| toml::to_string_pretty(v).unwrap_or_default(),
                |v| toml::to_string(v).unwrap_or_default(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Connectors { principal } => {
            let summaries: Vec<ConnectorSummary<'_>> = cfg
                .connectors_visible_to(principal.as_deref())
                .into_iter()
                .filter_map(|id| {
                    let profile = cfg.connectors.get(id)?;
                    Some(ConnectorSummary {
                        id,
                        kind: &profile.kind,
                        url: &profile.url,
                        auth: auth_kind(profile),
                        shared: profile.shared,
                    })
                })
                .collect();
            let out = output::render_list(
                global.output,
                &summaries,
                |s| ConnectorRow {
                    id: s.id.into(),
                    kind: s.kind.into(),
                    url: s.url.into(),
                    auth: s.auth,
                    shared: s.shared,
                },
                |s| s.id.into(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_redacted_at_any_depth() {
        let cfg: Config = toml::from_str(
            r#"
                callback_token = "s3cret"

                [connectors.surveys]
                kind = "data_platform"
                url = "https://play.example.org"
                username = "admin"
                password = "district"
                password_env = "SURVEYS_PASSWORD"
            "#,
        )
        .unwrap();

        let value = redacted_config(&cfg).unwrap();
        let rendered = toml::to_string(&value).unwrap();
        assert!(!rendered.contains("s3cret"), "{rendered}");
        assert!(!rendered.contains("district"), "{rendered}");
        // Naming the variable is not a secret.
        assert!(rendered.contains("SURVEYS_PASSWORD"), "{rendered}");
        assert_eq!(value["connectors"]["surveys"]["password"].as_str(), Some(REDACTED));
    }
}
