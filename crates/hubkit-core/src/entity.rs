// ── Entity protocol ──
//
// An entity is an addressable record: a label, an ordered property map,
// and optional actions and events. Adapters implement `Entity` on small
// per-request structs that hold a parent reference plus a shared client.

use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::action::{Action, ActionHandle};
use crate::collection::Collection;
use crate::context::Context;
use crate::error::Result;
use crate::event::Event;
use crate::path::Path;
use crate::property::{Properties, Property, property_values};

/// Named actions attached to a node.
pub type Actions = IndexMap<String, Arc<dyn Action>>;
/// Named events attached to a node.
pub type Events = IndexMap<String, Arc<dyn Event>>;

#[async_trait]
pub trait Entity: Send + Sync {
    fn path(&self) -> Path;

    /// Display label. May trigger the entity's (memoized) remote fetch.
    async fn label(&self, ctx: &Context) -> Result<String>;

    async fn properties(&self, ctx: &Context) -> Result<Properties>;

    async fn actions(&self, _ctx: &Context) -> Result<Actions> {
        Ok(Actions::new())
    }

    async fn events(&self, _ctx: &Context) -> Result<Events> {
        Ok(Events::new())
    }
}

/// Plain values of an entity's properties (entity sets skipped).
pub async fn entity_values(
    entity: &dyn Entity,
    ctx: &Context,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    Ok(property_values(&entity.properties(ctx).await?))
}

/// Anything a path can resolve to.
#[derive(Clone)]
pub enum Node {
    Entity(Arc<dyn Entity>),
    EntitySet(Collection),
    /// A simple or composed property, addressed by its full path.
    Property { path: Path, property: Property },
    Action(ActionHandle),
    Event(Arc<dyn Event>),
}

impl Node {
    pub fn path(&self) -> Path {
        match self {
            Self::Entity(e) => e.path(),
            Self::EntitySet(c) => c.path(),
            Self::Property { path, .. } => path.clone(),
            Self::Action(a) => a.path(),
            Self::Event(e) => e.path(),
        }
    }

    /// Short node-kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Entity(_) => "entity",
            Self::EntitySet(_) => "entity_set",
            Self::Property { .. } => "property",
            Self::Action(_) => "action",
            Self::Event(_) => "event",
        }
    }

    pub fn as_entity(&self) -> Option<&Arc<dyn Entity>> {
        match self {
            Self::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_entity_set(&self) -> Option<&Collection> {
        match self {
            Self::EntitySet(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&ActionHandle> {
        match self {
            Self::Action(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_event(&self) -> Option<&Arc<dyn Event>> {
        match self {
            Self::Event(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("path", &self.path().to_string())
            .finish()
    }
}
