// ── Type schemas ──
//
// One `TypeSchema` serves two purposes: it describes a field's shape when
// a node is reflected, and it checks/converts loosely-typed input before a
// value is sent to a remote system.

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Number, Value};
use strum::{Display, EnumString};

use crate::error::{CoreError, Result};

/// Named, ordered argument/field schemas (action args, event args,
/// entity definitions).
pub type Args = IndexMap<String, FieldSchema>;

// ── Scalars ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Datetime,
}

impl ScalarType {
    /// Map a remote system's field-kind name onto a scalar.
    ///
    /// Matching is case-insensitive. Unknown kinds are a
    /// [`CoreError::Schema`] so the caller decides whether the whole
    /// derivation fails.
    pub fn from_remote_kind(kind: &str) -> Result<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "string" | "text" | "phonenumber" | "email" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "float" | "decimal" | "number" | "numeric" => Ok(Self::Float),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" | "today" => Ok(Self::Date),
            "datetime" | "start" | "end" => Ok(Self::Datetime),
            _ => Err(CoreError::Schema {
                kind: kind.to_owned(),
            }),
        }
    }

    /// Check `value` against this scalar, converting string forms.
    pub fn coerce(self, field: &str, value: &Value) -> Result<Value> {
        let mismatch = || {
            CoreError::validation(format!("field '{field}' expects {self}, got {value}"))
        };

        match (self, value) {
            (_, Value::Null) => Ok(Value::Null),

            (Self::String, Value::String(_)) => Ok(value.clone()),
            (Self::String, Value::Number(n)) => Ok(Value::String(n.to_string())),
            (Self::String, Value::Bool(b)) => Ok(Value::String(b.to_string())),

            (Self::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).and_then(f64_to_i64))
                .map(Value::from)
                .ok_or_else(mismatch),
            (Self::Integer, Value::String(s)) => {
                s.trim().parse::<i64>().map(Value::from).map_err(|_| mismatch())
            }

            (Self::Float, Value::Number(n)) => n
                .as_f64()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch),
            (Self::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(mismatch),

            (Self::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(Value::Bool(true)),
                "false" | "0" => Ok(Value::Bool(false)),
                _ => Err(mismatch()),
            },

            (Self::Date, Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|d| Value::String(d.to_string()))
                .map_err(|_| mismatch()),

            (Self::Datetime, Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| Value::String(dt.to_rfc3339()))
                .map_err(|_| mismatch()),

            _ => Err(mismatch()),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn f64_to_i64(f: f64) -> Option<i64> {
    // i64::MAX is not exactly representable; stay strictly inside the range.
    (f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0).then_some(f as i64)
}

// ── Composite schemas ───────────────────────────────────────────────

/// One `{value, label}` pair of a controlled vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub value: Value,
    pub label: String,
}

impl EnumMember {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// Shape of a field or argument.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSchema {
    Scalar(ScalarType),
    /// Ordered members. `open` structs accept members beyond the declared
    /// ones (their member set comes from a remote schema).
    Struct {
        members: IndexMap<String, FieldSchema>,
        open: bool,
    },
    Array(Box<TypeSchema>),
    Enum {
        value_type: ScalarType,
        members: Vec<EnumMember>,
    },
}

impl TypeSchema {
    pub fn string() -> Self {
        Self::Scalar(ScalarType::String)
    }

    pub fn integer() -> Self {
        Self::Scalar(ScalarType::Integer)
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarType::Float)
    }

    pub fn boolean() -> Self {
        Self::Scalar(ScalarType::Boolean)
    }

    pub fn date() -> Self {
        Self::Scalar(ScalarType::Date)
    }

    pub fn datetime() -> Self {
        Self::Scalar(ScalarType::Datetime)
    }

    pub fn structure(members: IndexMap<String, FieldSchema>) -> Self {
        Self::Struct {
            members,
            open: false,
        }
    }

    pub fn open_structure(members: IndexMap<String, FieldSchema>) -> Self {
        Self::Struct {
            members,
            open: true,
        }
    }

    pub fn array_of(item: TypeSchema) -> Self {
        Self::Array(Box::new(item))
    }

    pub fn enumeration(value_type: ScalarType, members: Vec<EnumMember>) -> Self {
        Self::Enum {
            value_type,
            members,
        }
    }

    /// Check `value` against this schema and convert it to canonical form.
    ///
    /// `field` names the value in error messages; nested members extend it
    /// with `.member` / `[index]`.
    pub fn coerce(&self, field: &str, value: &Value) -> Result<Value> {
        match self {
            Self::Scalar(scalar) => scalar.coerce(field, value),

            Self::Struct { members, open } => {
                let object = match value {
                    Value::Null => return Ok(Value::Null),
                    Value::Object(object) => object,
                    other => {
                        return Err(CoreError::validation(format!(
                            "field '{field}' expects a struct, got {other}"
                        )));
                    }
                };
                let mut out = serde_json::Map::with_capacity(object.len());
                for (key, member_value) in object {
                    let nested = format!("{field}.{key}");
                    match members.get(key) {
                        Some(member) => {
                            out.insert(key.clone(), member.schema.coerce(&nested, member_value)?);
                        }
                        None if *open => {
                            out.insert(key.clone(), member_value.clone());
                        }
                        None => {
                            return Err(CoreError::validation(format!(
                                "unknown member '{nested}'"
                            )));
                        }
                    }
                }
                Ok(Value::Object(out))
            }

            Self::Array(item) => match value {
                Value::Null => Ok(Value::Null),
                Value::Array(items) => items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| item.coerce(&format!("{field}[{i}]"), v))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::Array),
                other => Err(CoreError::validation(format!(
                    "field '{field}' expects an array, got {other}"
                ))),
            },

            Self::Enum {
                value_type,
                members,
            } => {
                let coerced = value_type.coerce(field, value)?;
                if coerced.is_null() || members.iter().any(|m| values_match(&m.value, &coerced)) {
                    Ok(coerced)
                } else {
                    Err(CoreError::validation(format!(
                        "field '{field}' does not accept {coerced}"
                    )))
                }
            }
        }
    }
}

impl From<ScalarType> for TypeSchema {
    fn from(scalar: ScalarType) -> Self {
        Self::Scalar(scalar)
    }
}

/// Scalars serialize as their bare name; composites as `{kind, ...}`.
impl Serialize for TypeSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Scalar(scalar) => scalar.serialize(serializer),
            Self::Struct { members, open } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("kind", "struct")?;
                map.serialize_entry("members", members)?;
                if *open {
                    map.serialize_entry("open", &true)?;
                }
                map.end()
            }
            Self::Array(item) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("kind", "array")?;
                map.serialize_entry("item_type", item)?;
                map.end()
            }
            Self::Enum {
                value_type,
                members,
            } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("kind", "enum")?;
                map.serialize_entry("value_type", value_type)?;
                map.serialize_entry("members", members)?;
                map.end()
            }
        }
    }
}

/// A labelled schema: one struct member, action arg or event arg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSchema {
    pub label: String,
    #[serde(rename = "type")]
    pub schema: TypeSchema,
}

impl FieldSchema {
    pub fn new(label: impl Into<String>, schema: impl Into<TypeSchema>) -> Self {
        Self {
            label: label.into(),
            schema: schema.into(),
        }
    }

    pub fn string(label: impl Into<String>) -> Self {
        Self::new(label, TypeSchema::string())
    }

    pub fn integer(label: impl Into<String>) -> Self {
        Self::new(label, TypeSchema::integer())
    }

    pub fn float(label: impl Into<String>) -> Self {
        Self::new(label, TypeSchema::float())
    }

    pub fn boolean(label: impl Into<String>) -> Self {
        Self::new(label, TypeSchema::boolean())
    }
}

// ── Remote schema derivation ────────────────────────────────────────

/// A field as described by a remote form/record definition.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteField {
    pub code: String,
    #[serde(default)]
    pub label: Option<String>,
    pub kind: String,
    #[serde(default)]
    pub options: Vec<EnumMember>,
    #[serde(default)]
    pub allows_decimals: bool,
}

impl RemoteField {
    /// Derive this field's schema.
    ///
    /// `numeric` fields are integers unless they allow decimals; select
    /// kinds become enums over their options (arrays of them for
    /// multi-selects).
    pub fn to_field_schema(&self) -> Result<FieldSchema> {
        let label = self.label.clone().unwrap_or_else(|| self.code.clone());
        let kind = self.kind.to_ascii_lowercase();

        let schema = match kind.as_str() {
            "numeric" if !self.allows_decimals => TypeSchema::integer(),
            "select_one" | "select" | "enum" => self.options_schema(),
            "select_many" => TypeSchema::array_of(self.options_schema()),
            _ => TypeSchema::Scalar(ScalarType::from_remote_kind(&kind)?),
        };
        Ok(FieldSchema::new(label, schema))
    }

    fn options_schema(&self) -> TypeSchema {
        let value_type = if !self.options.is_empty() && self.options.iter().all(|o| o.value.is_i64())
        {
            ScalarType::Integer
        } else {
            ScalarType::String
        };
        TypeSchema::enumeration(value_type, self.options.clone())
    }
}

/// Derive ordered struct members from a remote field list.
pub fn derive_members(fields: &[RemoteField]) -> Result<IndexMap<String, FieldSchema>> {
    fields
        .iter()
        .map(|f| Ok((f.code.clone(), f.to_field_schema()?)))
        .collect()
}

/// Flatten nested struct members into one level keyed by `.`-joined
/// member paths. Non-struct fields are kept as leaves.
pub fn flatten(members: &IndexMap<String, FieldSchema>) -> Args {
    let mut out = Args::new();
    flatten_into(&mut out, None, members);
    out
}

fn flatten_into(out: &mut Args, prefix: Option<&str>, members: &IndexMap<String, FieldSchema>) {
    for (name, field) in members {
        let key = match prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.clone(),
        };
        match &field.schema {
            TypeSchema::Struct { members, .. } => flatten_into(out, Some(&key), members),
            _ => {
                out.insert(key, field.clone());
            }
        }
    }
}

// ── Value comparison ────────────────────────────────────────────────

/// Loose equality used for filters and enum membership: scalars compare by
/// their string form (`495` matches `"495"`); an expected object matches
/// when every expected member matches.
pub fn values_match(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (_, Value::Object(expected)) => match actual {
            Value::Object(actual) => expected.iter().all(|(key, want)| {
                actual
                    .get(key)
                    .is_some_and(|have| values_match(have, want))
                    || (want.is_null() && !actual.contains_key(key))
            }),
            _ => false,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_match(x, y))
        }
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_)) => false,
        _ => scalar_text(actual) == scalar_text(expected),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
