// ── Event handlers ──

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::CursorKey;
use crate::action::{ActionHandle, Options};
use crate::context::Context;
use crate::error::{CoreError, Result};
use crate::mapping::Mapping;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliverySource {
    /// Produced by a poll; the cursor was committed before delivery.
    Poll,
    /// Pushed by the remote system; cursors are untouched.
    Push,
}

/// One payload on its way to a handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    #[serde(flatten)]
    pub key: CursorKey,
    pub payload: Value,
    pub source: DeliverySource,
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    /// An error aborts the rest of the current batch. The record that
    /// failed is not redelivered.
    async fn handle(&self, delivery: &Delivery) -> Result<()>;
}

/// Forwards deliveries into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ChannelHandler {
    pub fn new(tx: mpsc::UnboundedSender<Delivery>) -> Self {
        Self { tx }
    }

    /// A handler together with the receiving end of its channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventHandler for ChannelHandler {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        self.tx
            .send(delivery.clone())
            .map_err(|_| CoreError::Internal(format!("receiver for {} dropped", delivery.key)))
    }
}

/// Invokes an action with options mapped from each payload.
#[derive(Debug, Clone)]
pub struct ActionTrigger {
    action: ActionHandle,
    mapping: Mapping,
    context: Context,
}

impl ActionTrigger {
    /// `context` is the identity the action runs as, usually the owner of
    /// the subscription.
    pub fn new(action: ActionHandle, mapping: Mapping, context: Context) -> Self {
        Self {
            action,
            mapping,
            context,
        }
    }
}

#[async_trait]
impl EventHandler for ActionTrigger {
    async fn handle(&self, delivery: &Delivery) -> Result<()> {
        let options: Options = match self.mapping.apply(&delivery.payload) {
            Some(Value::Object(options)) => options,
            None => Options::new(),
            Some(other) => {
                return Err(CoreError::validation(format!(
                    "mapping for action '{}' produced {other}, expected an object",
                    self.action.path()
                )));
            }
        };
        debug!(event = %delivery.key, action = %self.action.path(), "triggering action");
        self.action.invoke(options, &self.context).await?;
        Ok(())
    }
}
