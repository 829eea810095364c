// ── Property nodes ──
//
// What an entity exposes under its `properties` map: plain values with a
// schema, nested groups, or references to child collections.

use indexmap::IndexMap;
use serde_json::Value;

use crate::collection::Collection;
use crate::schema::{FieldSchema, TypeSchema};

/// Ordered property map of an entity or composed property.
pub type Properties = IndexMap<String, Property>;

/// A single value plus the schema describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleProperty {
    pub label: String,
    pub schema: TypeSchema,
    pub value: Option<Value>,
}

impl SimpleProperty {
    pub fn new(label: impl Into<String>, schema: TypeSchema, value: Option<Value>) -> Self {
        Self {
            label: label.into(),
            schema,
            value,
        }
    }

    pub fn string(label: impl Into<String>, value: Option<Value>) -> Self {
        Self::new(label, TypeSchema::string(), value)
    }

    pub fn integer(label: impl Into<String>, value: Option<Value>) -> Self {
        Self::new(label, TypeSchema::integer(), value)
    }

    pub fn float(label: impl Into<String>, value: Option<Value>) -> Self {
        Self::new(label, TypeSchema::float(), value)
    }

    /// The conventional `id` property.
    pub fn id(value: impl Into<Value>) -> Self {
        Self::new("Id", TypeSchema::integer(), Some(value.into()))
    }

    /// The conventional `name` property.
    pub fn name(value: impl Into<Value>) -> Self {
        Self::new("Name", TypeSchema::string(), Some(value.into()))
    }
}

/// A group of nested properties, walkable by member name.
#[derive(Debug, Clone)]
pub struct ComposedProperty {
    pub label: String,
    pub members: Properties,
    /// The member set comes from a remote schema rather than a fixed list.
    pub open: bool,
}

impl ComposedProperty {
    pub fn new(label: impl Into<String>, members: Properties) -> Self {
        Self {
            label: label.into(),
            members,
            open: false,
        }
    }

    pub fn open(label: impl Into<String>, members: Properties) -> Self {
        Self {
            label: label.into(),
            members,
            open: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Property {
    Simple(SimpleProperty),
    Composed(ComposedProperty),
    EntitySet(Collection),
}

impl Property {
    /// Label of a simple or composed property. Entity sets carry their
    /// own (possibly fetched) label, see [`Collection::label`].
    pub fn static_label(&self) -> Option<&str> {
        match self {
            Self::Simple(p) => Some(&p.label),
            Self::Composed(p) => Some(&p.label),
            Self::EntitySet(_) => None,
        }
    }

    /// The carried value. Composed properties yield an object of their
    /// members' values; entity sets have none.
    pub fn value(&self) -> Option<Value> {
        match self {
            Self::Simple(p) => p.value.clone(),
            Self::Composed(p) => Some(Value::Object(
                p.members
                    .iter()
                    .filter_map(|(k, v)| v.value().map(|v| (k.clone(), v)))
                    .collect(),
            )),
            Self::EntitySet(_) => None,
        }
    }

    /// Shape of this property; `None` for entity sets.
    pub fn schema(&self) -> Option<TypeSchema> {
        match self {
            Self::Simple(p) => Some(p.schema.clone()),
            Self::Composed(p) => {
                let members = p
                    .members
                    .iter()
                    .filter_map(|(name, member)| {
                        let label = member.static_label()?.to_owned();
                        Some((name.clone(), FieldSchema::new(label, member.schema()?)))
                    })
                    .collect();
                Some(TypeSchema::Struct {
                    members,
                    open: p.open,
                })
            }
            Self::EntitySet(_) => None,
        }
    }
}

impl From<SimpleProperty> for Property {
    fn from(p: SimpleProperty) -> Self {
        Self::Simple(p)
    }
}

impl From<ComposedProperty> for Property {
    fn from(p: ComposedProperty) -> Self {
        Self::Composed(p)
    }
}

impl From<Collection> for Property {
    fn from(c: Collection) -> Self {
        Self::EntitySet(c)
    }
}

/// Plain values of a property map, skipping entity sets and unset values.
pub fn property_values(properties: &Properties) -> serde_json::Map<String, Value> {
    properties
        .iter()
        .filter_map(|(k, p)| p.value().map(|v| (k.clone(), v)))
        .collect()
}

/// The schemas of a property map, skipping entity sets.
pub fn property_schemas(properties: &Properties) -> IndexMap<String, FieldSchema> {
    properties
        .iter()
        .filter_map(|(name, p)| {
            Some((
                name.clone(),
                FieldSchema::new(p.static_label()?.to_owned(), p.schema()?),
            ))
        })
        .collect()
}
