//! Uniform resource model for hubkit connectors.
//!
//! Every remote system is presented as a path-addressable tree below a
//! [`Connector`] root:
//!
//! - **Entities** ([`Entity`]) carry a label, ordered [`Property`] values
//!   described by a [`TypeSchema`], and optional actions and events.
//! - **Entity sets** ([`EntitySet`], used through [`Collection`]) declare
//!   a [`Protocol`] of query/insert/update/delete; anything outside it fails
//!   before a remote call is made.
//! - **Actions** ([`Action`], used through [`ActionHandle`]) validate and
//!   coerce their options against a live argument schema.
//! - **Events** ([`Event`]) are polled by the [`EventEngine`], which
//!   commits a persisted [`Cursor`] after every delivered record.
//!
//! [`lookup`] resolves a [`Path`] into a [`Node`], [`reflect`] describes
//! one, and [`Hub`] ties connectors, the engine and inbound pushes
//! together.

pub mod action;
pub mod collection;
pub mod connector;
pub mod context;
pub mod entity;
pub mod error;
pub mod event;
pub mod hub;
pub mod lookup;
pub mod mapping;
pub mod memo;
pub mod path;
pub mod property;
pub mod reflect;
pub mod schema;

// ── Primary re-exports ──────────────────────────────────────────────
pub use action::{Action, ActionHandle, Options};
pub use collection::{
    Collection, DEFAULT_PAGE_SIZE, EntitySet, Filters, Operation, PageRequest, Protocol,
    QueryResult, RemotePage,
};
pub use connector::Connector;
pub use context::Context;
pub use entity::{Actions, Entity, Events, Node, entity_values};
pub use error::{CoreError, Result};
pub use event::{
    ActionTrigger, ChannelHandler, Cursor, CursorKey, CursorStore, Delivery, DeliverySource,
    Event, EventEngine, EventHandler, EventRecord, FileCursorStore, HandlerId, MemoryCursorStore,
    SubscriptionState,
};
pub use hub::{Hub, HubConfig};
pub use lookup::lookup;
pub use mapping::{Mapping, MappingSpec};
pub use memo::Memo;
pub use path::Path;
pub use property::{ComposedProperty, Properties, Property, SimpleProperty};
pub use reflect::{NodeKind, NodeType, Reflection, UrlBuilder, reflect};
pub use schema::{Args, EnumMember, FieldSchema, RemoteField, ScalarType, TypeSchema};
