use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::entity::Entity;
use crate::error::{CoreError, Result};
use crate::path::Path;

/// Root entity of one configured remote system.
///
/// Adapters own their credentials and shared client here and build child
/// nodes on demand from `properties`.
#[async_trait]
pub trait Connector: Entity {
    /// Unique id of this configured instance.
    fn id(&self) -> &str;

    /// Adapter kind, e.g. `"surveys"`. Several connectors may share one.
    fn kind(&self) -> &str;

    /// Whether [`Connector::route_push`] is implemented.
    fn accepts_push(&self) -> bool {
        false
    }

    /// Map an inbound pushed event to the event paths whose subscribers
    /// should receive `payload`.
    async fn route_push(&self, _event_key: &str, _payload: &Value, _ctx: &Context) -> Result<Vec<Path>> {
        Err(CoreError::unsupported("push", self.id()))
    }
}
