// ── Payload mappings ──
//
// Describes how to build action options from an event payload. Stored as
// JSON alongside a subscription:
//
//   "name"                                  field of the payload
//   ["layers", "7", "beds"]                 nested field
//   {"type": "literal", "value": 3}         constant
//   {"type": "struct", "members": {...}}    object of sub-mappings

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mapping {
    Field(String),
    Path(Vec<String>),
    Spec(MappingSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingSpec {
    Struct { members: IndexMap<String, Mapping> },
    Literal { value: Value },
}

impl Mapping {
    pub fn field(name: impl Into<String>) -> Self {
        Self::Field(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Spec(MappingSpec::Literal {
            value: value.into(),
        })
    }

    pub fn structure<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Mapping)>,
        K: Into<String>,
    {
        Self::Spec(MappingSpec::Struct {
            members: members.into_iter().map(|(k, m)| (k.into(), m)).collect(),
        })
    }

    /// Evaluate against `payload`. Missing and null values yield `None`;
    /// struct members that yield `None` are left out.
    pub fn apply(&self, payload: &Value) -> Option<Value> {
        let value = match self {
            Self::Field(name) => payload.get(name).cloned(),
            Self::Path(segments) => segments
                .iter()
                .try_fold(payload, |current, segment| match current {
                    Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                    other => other.get(segment),
                })
                .cloned(),
            Self::Spec(MappingSpec::Literal { value }) => Some(value.clone()),
            Self::Spec(MappingSpec::Struct { members }) => Some(Value::Object(
                members
                    .iter()
                    .filter_map(|(name, m)| m.apply(payload).map(|v| (name.clone(), v)))
                    .collect(),
            )),
        };
        value.filter(|v| !v.is_null())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_all_forms() {
        let mapping: Mapping = serde_json::from_value(json!({
            "type": "struct",
            "members": {
                "address": "phone",
                "beds": ["layers", "7", "beds"],
                "channel": {"type": "literal", "value": 3}
            }
        }))
        .unwrap();

        assert_eq!(
            mapping,
            Mapping::structure([
                ("address", Mapping::field("phone")),
                (
                    "beds",
                    Mapping::Path(vec!["layers".into(), "7".into(), "beds".into()])
                ),
                ("channel", Mapping::literal(3)),
            ])
        );
    }

    #[test]
    fn applies_and_drops_missing_values() {
        let mapping = Mapping::structure([
            ("address", Mapping::field("phone")),
            ("beds", Mapping::Path(vec!["layers".into(), "7".into(), "beds".into()])),
            ("first_tag", Mapping::Path(vec!["tags".into(), "0".into()])),
            ("note", Mapping::field("note")),
        ]);
        let payload = json!({
            "phone": "5551234",
            "layers": {"7": {"beds": 12}},
            "tags": ["urgent"],
            "note": null
        });

        assert_eq!(
            mapping.apply(&payload).unwrap(),
            json!({"address": "5551234", "beds": 12, "first_tag": "urgent"})
        );
        assert_eq!(Mapping::field("absent").apply(&payload), None);
    }
}
