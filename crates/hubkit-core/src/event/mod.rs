// ── Incremental events ──
//
// An `Event` turns a stateless remote listing into an incremental stream.
// Adapters only fetch records and build payloads; the engine owns
// ordering, cursor commits and delivery.

mod cursor;
mod engine;
mod handler;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::error::Result;
use crate::path::Path;
use crate::schema::Args;

pub use cursor::{CursorKey, CursorStore, FileCursorStore, MemoryCursorStore};
pub use engine::{EventEngine, HandlerId, SubscriptionState};
pub use handler::{ActionTrigger, ChannelHandler, Delivery, DeliverySource, EventHandler};

/// Position in an event's ordering. Never moves backwards.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cursor(pub i64);

impl Cursor {
    /// Stored after a baseline poll that found no records; every real
    /// record key sorts after it.
    pub const ORIGIN: Cursor = Cursor(i64::MIN);
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Cursor {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// One remote record and its ordering key.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub key: Cursor,
    pub data: Value,
}

impl EventRecord {
    pub fn new(key: impl Into<Cursor>, data: Value) -> Self {
        Self {
            key: key.into(),
            data,
        }
    }
}

#[async_trait]
pub trait Event: Send + Sync {
    fn path(&self) -> Path;

    fn label(&self) -> String;

    /// Payload field schema, usually flattened from a remote form
    /// definition. Independent of polling.
    async fn args(&self, _ctx: &Context) -> Result<Args> {
        Ok(Args::new())
    }

    /// Records currently available remotely. `since` is the committed
    /// cursor and may be used for server-side offsetting; records at or
    /// below it are dropped by the engine regardless.
    async fn fetch(&self, since: Option<Cursor>, ctx: &Context) -> Result<Vec<EventRecord>>;

    /// Build the delivered payload for one record.
    async fn payload(&self, record: &EventRecord, _ctx: &Context) -> Result<Value> {
        Ok(record.data.clone())
    }
}
