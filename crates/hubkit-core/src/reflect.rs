// ── Reflection ──
//
// Read-only description of any node for external tooling. Children are
// described as summaries; follow their `reflect_url` to expand them.
// Listing an entity set's members is the only remote query issued.

use std::future::Future;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::collection::{Collection, Filters, Operation, Protocol};
use crate::context::Context;
use crate::entity::{Entity, Node};
use crate::error::Result;
use crate::path::Path;
use crate::property::{Properties, Property};
use crate::schema::{Args, TypeSchema};

/// Maps a node path to the URL a client uses to reflect it.
pub trait UrlBuilder: Send + Sync {
    fn reflect_url(&self, path: &Path) -> String;
}

impl<F> UrlBuilder for F
where
    F: Fn(&Path) -> String + Send + Sync,
{
    fn reflect_url(&self, path: &Path) -> String {
        self(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Entity,
    EntitySet,
    Action,
    Event,
}

/// The `type` of a described node: a node kind, or a schema for
/// properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NodeType {
    Kind(NodeKind),
    Schema(TypeSchema),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityDefinition {
    pub properties: Args,
}

/// A described node, or a summary of one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reflection {
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reflect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<Protocol>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, Reflection>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub actions: IndexMap<String, Reflection>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub events: IndexMap<String, Reflection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<Reflection>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_definition: Option<EntityDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Args>,
}

impl Reflection {
    fn new(label: String, node_type: NodeType) -> Self {
        Self {
            label,
            node_type,
            path: None,
            reflect_url: None,
            protocol: None,
            properties: IndexMap::new(),
            actions: IndexMap::new(),
            events: IndexMap::new(),
            entities: None,
            entity_definition: None,
            args: None,
        }
    }

    fn located(mut self, path: Path, urls: &dyn UrlBuilder) -> Self {
        self.reflect_url = Some(urls.reflect_url(&path));
        self.path = Some(path);
        self
    }
}

/// Describe `node` and summarize its children.
pub async fn reflect(node: &Node, ctx: &Context, urls: &dyn UrlBuilder) -> Result<Reflection> {
    match node {
        Node::Entity(entity) => reflect_entity(entity.as_ref(), ctx, urls).await,
        Node::EntitySet(collection) => reflect_collection(collection, ctx, urls).await,
        Node::Property { path, property } => {
            let mut out = property_summary(property, ctx, urls).await.located(path.clone(), urls);
            if let Property::Composed(composed) = property {
                out.properties = summarize_properties(&composed.members, ctx, urls).await;
            }
            Ok(out)
        }
        Node::Action(action) => {
            let mut out = Reflection::new(action.label(), NodeType::Kind(NodeKind::Action))
                .located(action.path(), urls);
            out.args = Some(action.args(ctx).await?);
            Ok(out)
        }
        Node::Event(event) => {
            let mut out = Reflection::new(event.label(), NodeType::Kind(NodeKind::Event))
                .located(event.path(), urls);
            out.args = Some(event.args(ctx).await?);
            Ok(out)
        }
    }
}

async fn reflect_entity(entity: &dyn Entity, ctx: &Context, urls: &dyn UrlBuilder) -> Result<Reflection> {
    let path = entity.path();
    let label = label_or_fallback(&path, entity.label(ctx)).await;
    let mut out = Reflection::new(label, NodeType::Kind(NodeKind::Entity)).located(path, urls);

    out.properties = summarize_properties(&entity.properties(ctx).await?, ctx, urls).await;
    for (name, action) in entity.actions(ctx).await? {
        out.actions.insert(
            name,
            Reflection::new(action.label(), NodeType::Kind(NodeKind::Action))
                .located(action.path(), urls),
        );
    }
    for (name, event) in entity.events(ctx).await? {
        out.events.insert(
            name,
            Reflection::new(event.label(), NodeType::Kind(NodeKind::Event))
                .located(event.path(), urls),
        );
    }
    Ok(out)
}

async fn reflect_collection(
    collection: &Collection,
    ctx: &Context,
    urls: &dyn UrlBuilder,
) -> Result<Reflection> {
    let path = collection.path();
    let label = label_or_fallback(&path, collection.label(ctx)).await;
    let protocol = collection.protocol();
    let mut out = Reflection::new(label, NodeType::Kind(NodeKind::EntitySet)).located(path, urls);
    out.protocol = Some(protocol);

    for (name, action) in collection.actions(ctx).await? {
        out.actions.insert(
            name,
            Reflection::new(action.label(), NodeType::Kind(NodeKind::Action))
                .located(action.path(), urls),
        );
    }
    for (name, event) in collection.events(ctx).await? {
        out.events.insert(
            name,
            Reflection::new(event.label(), NodeType::Kind(NodeKind::Event))
                .located(event.path(), urls),
        );
    }

    if collection.lists_entities() && protocol.contains(Operation::Query) {
        let page = collection.query(&Filters::new(), 1, ctx).await?;
        let mut entities = Vec::with_capacity(page.items.len());
        for item in &page.items {
            let path = item.path();
            let label = label_or_fallback(&path, item.label(ctx)).await;
            entities.push(Reflection::new(label, NodeType::Kind(NodeKind::Entity)).located(path, urls));
        }
        out.entities = Some(entities);
    } else {
        out.entity_definition = Some(EntityDefinition {
            properties: collection.entity_properties(ctx).await?,
        });
    }
    Ok(out)
}

async fn summarize_properties(
    properties: &Properties,
    ctx: &Context,
    urls: &dyn UrlBuilder,
) -> IndexMap<String, Reflection> {
    let mut out = IndexMap::with_capacity(properties.len());
    for (name, property) in properties {
        out.insert(name.clone(), property_summary(property, ctx, urls).await);
    }
    out
}

/// `{label, type}` for values, a located summary for entity sets.
async fn property_summary(property: &Property, ctx: &Context, urls: &dyn UrlBuilder) -> Reflection {
    match property {
        Property::EntitySet(collection) => {
            let path = collection.path();
            let label = label_or_fallback(&path, collection.label(ctx)).await;
            Reflection::new(label, NodeType::Kind(NodeKind::EntitySet)).located(path, urls)
        }
        Property::Simple(simple) => {
            Reflection::new(simple.label.clone(), NodeType::Schema(simple.schema.clone()))
        }
        Property::Composed(composed) => Reflection::new(
            composed.label.clone(),
            NodeType::Schema(property.schema().unwrap_or_else(|| {
                TypeSchema::Struct {
                    members: IndexMap::new(),
                    open: composed.open,
                }
            })),
        ),
    }
}

/// Labels are decoration: on failure use the last path segment.
async fn label_or_fallback(path: &Path, label: impl Future<Output = Result<String>>) -> String {
    match label.await {
        Ok(label) => label,
        Err(e) => {
            warn!(path = %path, error = %e, "label unavailable, using path segment");
            path.last().unwrap_or_default().to_owned()
        }
    }
}
