//! Cursor subcommand handlers over the durable cursor store.

use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use hubkit_config::Config;
use hubkit_core::{Cursor, CursorKey, CursorStore, FileCursorStore, Path};

use crate::cli::{CursorsArgs, CursorsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct CursorEntry {
    connector: String,
    event: String,
    cursor: i64,
}

impl CursorEntry {
    fn new(key: &CursorKey, cursor: Cursor) -> Self {
        Self {
            connector: key.connector_id.clone(),
            event: key.event_path.to_string(),
            cursor: cursor.0,
        }
    }

    fn row(&self) -> CursorRow {
        CursorRow {
            connector: self.connector.clone(),
            event: self.event.clone(),
            cursor: self.cursor,
        }
    }

    fn detail(&self) -> String {
        format!(
            "Connector: {}\nEvent:     {}\nCursor:    {}",
            self.connector, self.event, self.cursor
        )
    }
}

#[derive(Tabled)]
struct CursorRow {
    #[tabled(rename = "Connector")]
    connector: String,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Cursor")]
    cursor: i64,
}


fn not_found(key: &CursorKey) -> CliError {
    CliError::NotFound {
        what: "cursor".into(),
        identifier: key.to_string(),
        list_command: "cursors list".into(),
    }
}

pub async fn handle(args: CursorsArgs, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let store = FileCursorStore::open(cfg.cursor_store_path()).await?;

    match args.command {
        CursorsCommand::List { connector } => {
            let entries: Vec<CursorEntry> = store
                .list()
                .await?
                .iter()
                .filter(|(key, _)| connector.as_deref().is_none_or(|id| key.connector_id == id))
                .map(|(key, cursor)| CursorEntry::new(key, *cursor))
                .collect();
            let out = output::render_list(global.output, &entries, CursorEntry::row, |e| {
                format!("{}:{}", e.connector, e.event)
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CursorsCommand::Get { connector, event } => {
            let key = CursorKey::new(connector, Path::parse(&event));
            let cursor = store.load(&key).await?.ok_or_else(|| not_found(&key))?;
            let entry = CursorEntry::new(&key, cursor);
            let out = output::render_single(global.output, &entry, CursorEntry::detail, |e| {
                e.cursor.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        CursorsCommand::Set {
            connector,
            event,
            value,
            force,
        } => {
            let key = CursorKey::new(connector, Path::parse(&event));
            let next = Cursor(value);
            if let Some(current) = store.load(&key).await? {
                if next < current && !force {
                    return Err(CliError::Validation {
                        field: "value".into(),
                        reason: format!(
                            "{next} would move the cursor back from {current}; pass --force to redeliver"
                        ),
                    });
                }
            }
            store.save(&key, next).await?;
            info!(cursor = %key, value, "cursor set");
            Ok(())
        }

        CursorsCommand::Reset { connector, event } => {
            let key = CursorKey::new(connector, Path::parse(&event));
            if !store.remove(&key).await? {
                return Err(not_found(&key));
            }
            info!(cursor = %key, "cursor reset");
            Ok(())
        }
    }
}
