//! Typed operation descriptors and their cache identity.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::GraphQLRequest;

/// What an operation does on the server, which also decides its transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    /// Detect the kind from the leading keyword of a GraphQL document.
    ///
    /// Anonymous shorthand documents (`{ ... }`) are queries.
    pub fn of_document(document: &str) -> Self {
        let first = document
            .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
            .find(|word| !word.is_empty());
        match first {
            Some("mutation") => OperationKind::Mutation,
            Some("subscription") => OperationKind::Subscription,
            _ => OperationKind::Query,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

/// An immutable request against the GraphQL server.
///
/// ```rust
/// use relieflink_shared::{Operation, OperationKind};
/// use serde_json::json;
///
/// let op = Operation::query("City", "query City($where: city_bool_exp) { city(where: $where) { id name } }")
///     .with_parameter("where", json!({ "districtId": { "_eq": 7 } }));
/// assert_eq!(op.kind(), OperationKind::Query);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    name: String,
    parameters: Map<String, Value>,
    selection: String,
    refetch_queries: Vec<String>,
}

impl Operation {
    pub fn new(kind: OperationKind, name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parameters: Map::new(),
            selection: selection.into(),
            refetch_queries: Vec::new(),
        }
    }

    pub fn query(name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self::new(OperationKind::Query, name, selection)
    }

    pub fn mutation(name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self::new(OperationKind::Mutation, name, selection)
    }

    pub fn subscription(name: impl Into<String>, selection: impl Into<String>) -> Self {
        Self::new(OperationKind::Subscription, name, selection)
    }

    /// Set one parameter (GraphQL variable).
    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    /// Replace all parameters. Non-object values are ignored.
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        if let Value::Object(map) = parameters {
            self.parameters = map;
        }
        self
    }

    /// Names of cached queries to invalidate once this mutation succeeds.
    pub fn refetch_queries<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.refetch_queries = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    pub fn selection(&self) -> &str {
        &self.selection
    }

    pub fn refetched_queries(&self) -> &[String] {
        &self.refetch_queries
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.name, &self.parameters)
    }

    /// The HTTP/WebSocket request body for this operation.
    pub fn to_request(&self) -> GraphQLRequest {
        GraphQLRequest {
            query: self.selection.clone(),
            variables: if self.parameters.is_empty() {
                None
            } else {
                Some(Value::Object(self.parameters.clone()))
            },
            operation_name: Some(self.name.clone()),
        }
    }
}

/// Identity of a cacheable result: operation name plus parameters compared by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    name: String,
    parameters: String,
}

impl CacheKey {
    pub fn new(name: &str, parameters: &Map<String, Value>) -> Self {
        Self {
            name: name.to_string(),
            parameters: normalize_parameters(parameters),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Canonical JSON text of the parameters.
    pub fn parameters(&self) -> &str {
        &self.parameters
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters)
    }
}

/// Serialize parameters with every object's keys in sorted order, so that
/// structurally equal values always produce the same text.
pub fn normalize_parameters(parameters: &Map<String, Value>) -> String {
    let mut out = String::new();
    write_canonical(&Value::Object(parameters.clone()), &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_is_read_from_document_keyword() {
        assert_eq!(
            OperationKind::of_document("subscription NeedAdded { need { id } }"),
            OperationKind::Subscription
        );
        assert_eq!(
            OperationKind::of_document("  mutation InsertNeed($objects: [need_insert_input!]!) { x }"),
            OperationKind::Mutation
        );
        assert_eq!(OperationKind::of_document("{ city { id } }"), OperationKind::Query);
        assert_eq!(OperationKind::of_document("query City { city { id } }"), OperationKind::Query);
    }

    #[test]
    fn structurally_equal_parameters_share_a_key() {
        let a = Operation::query("City", "q").with_parameters(json!({
            "where": { "districtId": { "_eq": 7 } },
            "limit": 100
        }));
        let b = Operation::query("City", "q")
            .with_parameter("limit", json!(100))
            .with_parameter("where", json!({ "districtId": { "_eq": 7 } }));
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn different_values_or_names_give_different_keys() {
        let a = Operation::query("City", "q").with_parameter("id", json!(7));
        let b = Operation::query("City", "q").with_parameter("id", json!(8));
        let c = Operation::query("District", "q").with_parameter("id", json!(7));
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn canonical_text_sorts_nested_keys() {
        let params = json!({ "b": { "z": 1, "a": [ { "y": 2, "x": 1 } ] }, "a": "s" });
        let Value::Object(map) = params else { unreachable!() };
        assert_eq!(
            normalize_parameters(&map),
            r#"{"a":"s","b":{"a":[{"x":1,"y":2}],"z":1}}"#
        );
    }

    #[test]
    fn request_omits_empty_variables() {
        let req = Operation::query("ItemCategory", "query ItemCategory { item_category { id name } }")
            .to_request();
        assert!(req.variables.is_none());
        assert_eq!(req.operation_name.as_deref(), Some("ItemCategory"));
    }
}
