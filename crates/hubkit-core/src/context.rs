use std::collections::BTreeMap;

/// Identity bundle threaded through every node operation.
///
/// Produced by the host's auth layer. Adapters use the principal to scope
/// outbound credentials (e.g. bearer tokens issued per user); the core
/// never inspects it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    principal: Option<String>,
    attributes: BTreeMap<String, String>,
}

impl Context {
    /// A context with no principal.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_principal(principal: impl Into<String>) -> Self {
        Self {
            principal: Some(principal.into()),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
