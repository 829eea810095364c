// ── Path resolution ──

use std::sync::Arc;

use tracing::debug;

use crate::action::ActionHandle;
use crate::context::Context;
use crate::entity::{Entity, Node};
use crate::error::{CoreError, Result};
use crate::path::{ACTIONS, EVENTS, Path};
use crate::property::Property;

/// Resolve `path` below `root`.
///
/// Segments are matched against property names, left to right. After an
/// entity set the next segment is a member id resolved through
/// `find_entity`. `$actions` / `$events` switch namespace and must be
/// followed by exactly one final segment. Anything unmatched is
/// [`CoreError::NotFound`] carrying the full requested path.
pub async fn lookup(root: Arc<dyn Entity>, path: &Path, ctx: &Context) -> Result<Node> {
    let segments = path.segments();
    let mut node = Node::Entity(root);

    let mut index = 0;
    while let Some(segment) = segments.get(index) {
        debug!(path = %path, segment, at = %node.path(), "resolving segment");

        if segment == ACTIONS || segment == EVENTS {
            let Some([name]) = segments.get(index + 1..) else {
                return Err(CoreError::not_found(path));
            };
            return if segment == ACTIONS {
                select_action(&node, name, path, ctx).await
            } else {
                select_event(&node, name, path, ctx).await
            };
        }

        node = match node {
            Node::Entity(entity) => {
                let mut properties = entity.properties(ctx).await?;
                let property = properties
                    .shift_remove(segment)
                    .ok_or_else(|| CoreError::not_found(path))?;
                property_node(entity.path().child(segment.as_str()), property)
            }
            Node::EntitySet(collection) => match collection.find_entity(segment, ctx).await {
                Ok(entity) => Node::Entity(entity),
                Err(CoreError::NotFound { .. }) => return Err(CoreError::not_found(path)),
                Err(e) => return Err(e),
            },
            Node::Property {
                path: at,
                property: Property::Composed(mut composed),
            } => {
                let member = composed
                    .members
                    .shift_remove(segment)
                    .ok_or_else(|| CoreError::not_found(path))?;
                property_node(at.child(segment.as_str()), member)
            }
            _ => return Err(CoreError::not_found(path)),
        };
        index += 1;
    }

    Ok(node)
}

fn property_node(path: Path, property: Property) -> Node {
    match property {
        Property::EntitySet(collection) => Node::EntitySet(collection),
        other => Node::Property {
            path,
            property: other,
        },
    }
}

async fn select_action(node: &Node, name: &str, path: &Path, ctx: &Context) -> Result<Node> {
    let mut actions = match node {
        Node::Entity(entity) => entity.actions(ctx).await?,
        Node::EntitySet(collection) => collection.actions(ctx).await?,
        _ => return Err(CoreError::not_found(path)),
    };
    actions
        .shift_remove(name)
        .map(|action| Node::Action(ActionHandle::new(action)))
        .ok_or_else(|| CoreError::not_found(path))
}

async fn select_event(node: &Node, name: &str, path: &Path, ctx: &Context) -> Result<Node> {
    let mut events = match node {
        Node::Entity(entity) => entity.events(ctx).await?,
        Node::EntitySet(collection) => collection.events(ctx).await?,
        _ => return Err(CoreError::not_found(path)),
    };
    events
        .shift_remove(name)
        .map(Node::Event)
        .ok_or_else(|| CoreError::not_found(path))
}
