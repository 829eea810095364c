// ── Entity sets ──
//
// Adapters implement `EntitySet` with the raw remote operations. Callers
// only ever hold a `Collection`, which enforces the declared protocol,
// validates pages and required fields, and turns per-record mutations
// into filtered bulk update/delete.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::{Value, json};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, warn};

use crate::action::{Action, Options};
use crate::context::Context;
use crate::entity::{Actions, Entity, Events, entity_values};
use crate::error::{CoreError, Result};
use crate::path::Path;
use crate::schema::{Args, FieldSchema, TypeSchema, values_match};

/// Page size used when an entity set does not declare one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Property-name to expected-value filters.
pub type Filters = serde_json::Map<String, Value>;

// ── Protocol ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Query,
    Insert,
    Update,
    Delete,
}

impl Operation {
    const fn bit(self) -> u8 {
        match self {
            Self::Query => 1,
            Self::Insert => 1 << 1,
            Self::Update => 1 << 2,
            Self::Delete => 1 << 3,
        }
    }

    fn is_mutation(self) -> bool {
        !matches!(self, Self::Query)
    }
}

/// The declared capability set of an entity set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Protocol(u8);

impl Protocol {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn query_only() -> Self {
        Self(Operation::Query.bit())
    }

    pub const fn all() -> Self {
        Self(
            Operation::Query.bit()
                | Operation::Insert.bit()
                | Operation::Update.bit()
                | Operation::Delete.bit(),
        )
    }

    pub const fn with(self, op: Operation) -> Self {
        Self(self.0 | op.bit())
    }

    pub const fn contains(self, op: Operation) -> bool {
        self.0 & op.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Operation> {
        Operation::iter().filter(move |op| self.contains(*op))
    }
}

impl FromIterator<Operation> for Protocol {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for Protocol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(None)?;
        for op in self.iter() {
            seq.serialize_element(&op.to_string())?;
        }
        seq.end()
    }
}

// ── Paging ──────────────────────────────────────────────────────────

/// A 1-based page request handed to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl PageRequest {
    /// Zero-based index of the first item on this page.
    pub fn offset(self) -> u64 {
        u64::from(self.number.saturating_sub(1)) * u64::from(self.size)
    }
}

/// One page as returned by the remote system.
#[derive(Default)]
pub struct RemotePage {
    pub items: Vec<Arc<dyn Entity>>,
    /// Total number of matching records, when the remote reports it.
    pub total: Option<u64>,
}

pub struct QueryResult {
    pub items: Vec<Arc<dyn Entity>>,
    pub next_page: Option<u32>,
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("items", &self.items.len())
            .field("next_page", &self.next_page)
            .finish()
    }
}

// ── Adapter trait ───────────────────────────────────────────────────

/// Raw remote operations of a collection.
///
/// `protocol()` must list exactly the operations the implementation
/// overrides; the defaults report [`CoreError::Unsupported`].
#[async_trait]
pub trait EntitySet: Send + Sync {
    fn path(&self) -> Path;

    async fn label(&self, ctx: &Context) -> Result<String>;

    fn protocol(&self) -> Protocol;

    fn page_size(&self) -> u32 {
        DEFAULT_PAGE_SIZE
    }

    /// Properties that must be present on insert.
    fn required_fields(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether reflection lists sample entities (`true`) or only the
    /// member shape from [`EntitySet::entity_properties`].
    fn lists_entities(&self) -> bool {
        true
    }

    /// Member shape, used for reflection and insert/update coercion.
    async fn entity_properties(&self, _ctx: &Context) -> Result<Args> {
        Ok(Args::new())
    }

    /// Fetch one page. `filters` may be pushed down; the caller re-applies
    /// them to the returned items either way.
    async fn query(
        &self,
        _filters: &Filters,
        _page: PageRequest,
        _ctx: &Context,
    ) -> Result<RemotePage> {
        Err(CoreError::unsupported(Operation::Query, self.path()))
    }

    /// Resolve one member by id without listing.
    async fn find_entity(&self, id: &str, ctx: &Context) -> Result<Arc<dyn Entity>>;

    async fn insert(&self, _properties: Options, _ctx: &Context) -> Result<Value> {
        Err(CoreError::unsupported(Operation::Insert, self.path()))
    }

    async fn update_entity(&self, _id: &str, _properties: &Options, _ctx: &Context) -> Result<()> {
        Err(CoreError::unsupported(Operation::Update, self.path()))
    }

    async fn delete_entity(&self, _id: &str, _ctx: &Context) -> Result<()> {
        Err(CoreError::unsupported(Operation::Delete, self.path()))
    }

    /// Adapter-specific actions, in addition to the protocol-derived ones.
    async fn actions(&self, _ctx: &Context) -> Result<Actions> {
        Ok(Actions::new())
    }

    async fn events(&self, _ctx: &Context) -> Result<Events> {
        Ok(Events::new())
    }
}

// ── Checked wrapper ─────────────────────────────────────────────────

/// Capability-checked handle to an [`EntitySet`].
#[derive(Clone)]
pub struct Collection {
    inner: Arc<dyn EntitySet>,
}

impl Collection {
    pub fn new(set: impl EntitySet + 'static) -> Self {
        Self {
            inner: Arc::new(set),
        }
    }

    pub fn from_arc(set: Arc<dyn EntitySet>) -> Self {
        Self { inner: set }
    }

    pub fn path(&self) -> Path {
        self.inner.path()
    }

    pub fn protocol(&self) -> Protocol {
        self.inner.protocol()
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size().max(1)
    }

    pub fn lists_entities(&self) -> bool {
        self.inner.lists_entities()
    }

    pub async fn label(&self, ctx: &Context) -> Result<String> {
        self.inner.label(ctx).await
    }

    pub async fn entity_properties(&self, ctx: &Context) -> Result<Args> {
        self.inner.entity_properties(ctx).await
    }

    pub async fn events(&self, ctx: &Context) -> Result<Events> {
        self.inner.events(ctx).await
    }

    fn require(&self, op: Operation) -> Result<()> {
        if self.protocol().contains(op) {
            Ok(())
        } else {
            Err(CoreError::unsupported(op, self.path()))
        }
    }

    pub async fn find_entity(&self, id: &str, ctx: &Context) -> Result<Arc<dyn Entity>> {
        if id.is_empty() {
            return Err(CoreError::validation("entity id must not be empty"));
        }
        debug!(set = %self.path(), id, "resolving entity");
        self.inner.find_entity(id, ctx).await
    }

    /// Fetch page `page` (1-based) of the members matching `filters`.
    pub async fn query(&self, filters: &Filters, page: u32, ctx: &Context) -> Result<QueryResult> {
        self.require(Operation::Query)?;
        self.fetch_page(filters, page, ctx).await
    }

    async fn fetch_page(&self, filters: &Filters, page: u32, ctx: &Context) -> Result<QueryResult> {
        if page == 0 {
            return Err(CoreError::validation("page numbers start at 1"));
        }
        let request = PageRequest {
            number: page,
            size: self.page_size(),
        };
        debug!(set = %self.path(), page, size = request.size, "querying");
        let remote = self.inner.query(filters, request, ctx).await?;

        let items = if filters.is_empty() {
            remote.items
        } else {
            let mut kept = Vec::with_capacity(remote.items.len());
            for item in remote.items {
                if matches_filters(&entity_values(item.as_ref(), ctx).await?, filters) {
                    kept.push(item);
                }
            }
            kept
        };

        let seen = u64::from(page) * u64::from(request.size);
        let next_page = remote
            .total
            .filter(|total| *total > seen)
            .map(|_| page + 1);

        Ok(QueryResult { items, next_page })
    }

    /// Insert one record after checking required fields.
    pub async fn insert(&self, properties: Options, ctx: &Context) -> Result<Value> {
        self.require(Operation::Insert)?;

        let missing: Vec<String> = self
            .inner
            .required_fields()
            .into_iter()
            .filter(|f| properties.get(f).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let properties = self.coerce_properties(properties, ctx).await?;
        self.inner.insert(properties, ctx).await
    }

    /// Apply `properties` to every member matching `filters`. Returns the
    /// number of updated records. Not atomic: a failure leaves earlier
    /// matches updated.
    pub async fn update(&self, filters: &Filters, properties: Options, ctx: &Context) -> Result<usize> {
        self.require(Operation::Update)?;
        let properties = self.coerce_properties(properties, ctx).await?;
        let ids = self.matching_ids(filters, ctx).await?;

        for (done, id) in ids.iter().enumerate() {
            if let Err(e) = self.inner.update_entity(id, &properties, ctx).await {
                warn!(set = %self.path(), id, updated = done, error = %e, "bulk update stopped");
                return Err(e);
            }
        }
        Ok(ids.len())
    }

    /// Remove every member matching `filters`. Returns the number of
    /// deleted records. Not atomic.
    pub async fn delete(&self, filters: &Filters, ctx: &Context) -> Result<usize> {
        self.require(Operation::Delete)?;
        let ids = self.matching_ids(filters, ctx).await?;

        for (done, id) in ids.iter().enumerate() {
            if let Err(e) = self.inner.delete_entity(id, ctx).await {
                warn!(set = %self.path(), id, deleted = done, error = %e, "bulk delete stopped");
                return Err(e);
            }
        }
        Ok(ids.len())
    }

    /// Ids of all matches, collected across every page before mutating.
    async fn matching_ids(&self, filters: &Filters, ctx: &Context) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page = Some(1);
        while let Some(number) = page {
            let result = self.fetch_page(filters, number, ctx).await?;
            ids.extend(
                result
                    .items
                    .iter()
                    .filter_map(|item| item.path().last().map(str::to_owned)),
            );
            page = result.next_page;
        }
        debug!(set = %self.path(), matches = ids.len(), "collected bulk targets");
        Ok(ids)
    }

    async fn coerce_properties(&self, properties: Options, ctx: &Context) -> Result<Options> {
        let shape = self.inner.entity_properties(ctx).await?;
        if shape.is_empty() {
            return Ok(properties);
        }
        let schema = TypeSchema::structure(shape);
        match schema.coerce("properties", &Value::Object(properties))? {
            Value::Object(coerced) => Ok(coerced),
            _ => Ok(Options::new()),
        }
    }

    /// Adapter actions plus one action per mutating protocol operation.
    pub async fn actions(&self, ctx: &Context) -> Result<Actions> {
        let mut actions = Actions::new();
        for op in self.protocol().iter().filter(|op| op.is_mutation()) {
            actions.insert(
                op.to_string(),
                Arc::new(ProtocolAction {
                    collection: self.clone(),
                    op,
                }),
            );
        }
        actions.extend(self.inner.actions(ctx).await?);
        Ok(actions)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("path", &self.path().to_string())
            .field("protocol", &self.protocol())
            .finish()
    }
}

fn matches_filters(values: &serde_json::Map<String, Value>, filters: &Filters) -> bool {
    filters
        .iter()
        .all(|(key, want)| values.get(key).is_some_and(|have| values_match(have, want)))
}

// ── Protocol-derived actions ────────────────────────────────────────

/// `insert` / `update` / `delete` exposed under a set's `$actions`.
struct ProtocolAction {
    collection: Collection,
    op: Operation,
}

impl ProtocolAction {
    fn object_option(options: &Options, key: &str) -> Options {
        options
            .get(key)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Action for ProtocolAction {
    fn path(&self) -> Path {
        self.collection.path().action(self.op.to_string())
    }

    fn label(&self) -> String {
        match self.op {
            Operation::Insert => "Insert",
            Operation::Update => "Update",
            Operation::Delete => "Delete",
            Operation::Query => "Query",
        }
        .to_owned()
    }

    async fn args(&self, ctx: &Context) -> Result<Args> {
        let shape = self.collection.entity_properties(ctx).await?;
        let properties = if shape.is_empty() {
            TypeSchema::open_structure(shape)
        } else {
            TypeSchema::structure(shape)
        };
        let filters = TypeSchema::open_structure(Args::new());

        let mut args = Args::new();
        match self.op {
            Operation::Insert => {
                args.insert("properties".into(), FieldSchema::new("Properties", properties));
            }
            Operation::Update => {
                args.insert("filters".into(), FieldSchema::new("Filters", filters));
                args.insert("properties".into(), FieldSchema::new("Properties", properties));
            }
            Operation::Delete => {
                args.insert("filters".into(), FieldSchema::new("Filters", filters));
            }
            Operation::Query => {}
        }
        Ok(args)
    }

    async fn invoke(&self, options: Options, ctx: &Context) -> Result<Value> {
        let filters = Self::object_option(&options, "filters");
        let properties = Self::object_option(&options, "properties");
        match self.op {
            Operation::Insert => self.collection.insert(properties, ctx).await,
            Operation::Update => {
                let affected = self.collection.update(&filters, properties, ctx).await?;
                Ok(json!({ "affected": affected }))
            }
            Operation::Delete => {
                let affected = self.collection.delete(&filters, ctx).await?;
                Ok(json!({ "affected": affected }))
            }
            Operation::Query => Err(CoreError::unsupported("invoke", self.path())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn protocol_lists_declared_operations() {
        let protocol: Protocol = [Operation::Query, Operation::Delete].into_iter().collect();
        assert!(protocol.contains(Operation::Query));
        assert!(!protocol.contains(Operation::Insert));
        assert_eq!(
            serde_json::to_value(protocol).unwrap(),
            json!(["query", "delete"])
        );
        assert_eq!(
            serde_json::to_value(Protocol::all()).unwrap(),
            json!(["query", "insert", "update", "delete"])
        );
    }

    #[test]
    fn page_offsets_are_one_based() {
        let page = PageRequest { number: 3, size: 50 };
        assert_eq!(page.offset(), 100);
    }

    #[test]
    fn filters_match_loosely() {
        let values = json!({"id": 495, "name": "my data set"});
        let values = values.as_object().unwrap();
        let mut filters = Filters::new();
        filters.insert("id".into(), json!("495"));
        assert!(matches_filters(values, &filters));
        filters.insert("name".into(), json!("other"));
        assert!(!matches_filters(values, &filters));
        filters.clear();
        filters.insert("missing".into(), json!(1));
        assert!(!matches_filters(values, &filters));
    }
}
