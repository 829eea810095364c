// ── Polling engine ──
//
// Turns `Event::fetch` into an incremental stream. Per record, in
// ascending key order: build payload, commit cursor, emit. A failure at
// any step aborts the rest of the batch and keeps what was committed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use strum::Display;
use tracing::{debug, info, instrument};

use super::cursor::{CursorKey, CursorStore};
use super::handler::{Delivery, DeliverySource, EventHandler};
use super::{Cursor, Event};
use crate::context::Context;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionState {
    Unsubscribed,
    /// Subscribed; nothing delivered yet.
    Baselined,
    /// At least one record has been delivered.
    Active,
}

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscription {
    state: SubscriptionState,
    handlers: Vec<(HandlerId, Arc<dyn EventHandler>)>,
}

/// Owns cursors and subscriptions for every event of every connector.
///
/// Concurrent polls of the same event must be serialized by the caller.
pub struct EventEngine {
    cursors: Arc<dyn CursorStore>,
    subscriptions: DashMap<CursorKey, Subscription>,
    next_handler: AtomicU64,
}

impl EventEngine {
    pub fn new(cursors: Arc<dyn CursorStore>) -> Self {
        Self {
            cursors,
            subscriptions: DashMap::new(),
            next_handler: AtomicU64::new(1),
        }
    }

    pub fn cursors(&self) -> &Arc<dyn CursorStore> {
        &self.cursors
    }

    pub async fn cursor(&self, key: &CursorKey) -> Result<Option<Cursor>> {
        self.cursors.load(key).await
    }

    pub fn subscription_state(&self, key: &CursorKey) -> SubscriptionState {
        self.subscriptions
            .get(key)
            .map_or(SubscriptionState::Unsubscribed, |s| s.state)
    }

    /// Register `handler` for `key`.
    ///
    /// With no stored cursor, one baseline fetch moves the cursor past
    /// every record that already exists; those records are never
    /// delivered. An existing cursor is resumed as is.
    #[instrument(skip_all, fields(event = %key))]
    pub async fn subscribe(
        &self,
        key: CursorKey,
        event: &dyn Event,
        handler: Arc<dyn EventHandler>,
        ctx: &Context,
    ) -> Result<HandlerId> {
        if self.cursors.load(&key).await?.is_none() {
            let records = event.fetch(None, ctx).await?;
            let baseline = records
                .iter()
                .map(|r| r.key)
                .max()
                .unwrap_or(Cursor::ORIGIN);
            self.cursors.save(&key, baseline).await?;
            info!(discarded = records.len(), cursor = %baseline, "baselined event");
        }

        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .entry(key)
            .or_insert_with(|| Subscription {
                state: SubscriptionState::Baselined,
                handlers: Vec::new(),
            })
            .handlers
            .push((id, handler));
        info!(handler = %id, "subscribed");
        Ok(id)
    }

    /// Remove one handler. Removing the last handler also removes the
    /// stored cursor. Returns `false` if the handler was not registered.
    #[instrument(skip_all, fields(event = %key, handler = %id))]
    pub async fn unsubscribe(&self, key: &CursorKey, id: HandlerId) -> Result<bool> {
        let (found, now_empty) = match self.subscriptions.get_mut(key) {
            Some(mut sub) => {
                let before = sub.handlers.len();
                sub.handlers.retain(|(h, _)| *h != id);
                (sub.handlers.len() != before, sub.handlers.is_empty())
            }
            None => (false, false),
        };

        if now_empty {
            self.subscriptions.remove_if(key, |_, s| s.handlers.is_empty());
            self.cursors.remove(key).await?;
            info!("last handler removed, cursor dropped");
        }
        Ok(found)
    }

    /// Fetch, then deliver every record newer than the cursor.
    ///
    /// Returns the payloads delivered by this call, in key order.
    #[instrument(skip_all, fields(event = %key))]
    pub async fn poll(&self, key: &CursorKey, event: &dyn Event, ctx: &Context) -> Result<Vec<Value>> {
        let mut cursor = self.cursors.load(key).await?;
        let mut records = event.fetch(cursor, ctx).await?;
        records.sort_by_key(|r| r.key);
        debug!(fetched = records.len(), cursor = ?cursor, "polled");

        let mut emitted = Vec::new();
        for record in records {
            if cursor.is_some_and(|c| record.key <= c) {
                continue;
            }
            let payload = event.payload(&record, ctx).await?;
            self.cursors.save(key, record.key).await?;
            cursor = Some(record.key);
            self.emit(key, &payload, DeliverySource::Poll).await?;
            emitted.push(payload);
        }

        if !emitted.is_empty() {
            debug!(delivered = emitted.len(), cursor = ?cursor, "advanced cursor");
        }
        Ok(emitted)
    }

    /// Hand a pushed payload to the handlers of `key` without touching
    /// its cursor.
    pub async fn deliver(&self, key: &CursorKey, payload: &Value) -> Result<usize> {
        self.emit(key, payload, DeliverySource::Push).await
    }

    async fn emit(&self, key: &CursorKey, payload: &Value, source: DeliverySource) -> Result<usize> {
        let handlers: Vec<Arc<dyn EventHandler>> = match self.subscriptions.get_mut(key) {
            Some(mut sub) => {
                if !sub.handlers.is_empty() {
                    sub.state = SubscriptionState::Active;
                }
                sub.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
            }
            None => return Ok(0),
        };

        let delivery = Delivery {
            key: key.clone(),
            payload: payload.clone(),
            source,
        };
        for handler in &handlers {
            handler.handle(&delivery).await?;
        }
        Ok(handlers.len())
    }
}

impl fmt::Debug for EventEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEngine")
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}
