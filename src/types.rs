//! Shared domain types: record identifiers, field descriptors and indexing requests.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A record is any structured JSON value carrying an identifier field.
pub type Record = Value;

/// Signature of a custom extraction function.
///
/// Receives the record and the collection's shared state and returns the strings
/// to index for that record.
pub type IndexFn = dyn Fn(&Record, &Value) -> anyhow::Result<Vec<String>> + Send + Sync;

/// Identifier of a record within its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Read an identifier from a JSON value.
    ///
    /// Integers and strings are accepted; floats, booleans, arrays, objects and
    /// integers outside the `i64` range are not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Read the identifier stored under `id_field` of a record.
    pub fn from_record(record: &Record, id_field: &str) -> Option<Self> {
        record.get(id_field).and_then(Self::from_value)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for RecordId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Describes which strings of a record are searchable.
///
/// Resolved once when a collection is registered and never re-checked per record.
#[derive(Clone)]
pub enum FieldDescriptor {
    /// Index the named top-level string fields, in this order.
    ByFieldNames(Vec<String>),
    /// Index whatever the function returns for each record.
    ByFunction(Arc<IndexFn>),
}

impl FieldDescriptor {
    /// Build a descriptor from a list of field names.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::ByFieldNames(names.into_iter().map(Into::into).collect())
    }

    /// Build a descriptor from an extraction function.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Record, &Value) -> anyhow::Result<Vec<String>> + Send + Sync + 'static,
    {
        Self::ByFunction(Arc::new(f))
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByFieldNames(names) => f.debug_tuple("ByFieldNames").field(names).finish(),
            Self::ByFunction(_) => f.write_str("ByFunction(..)"),
        }
    }
}

impl<S: Into<String>> From<Vec<S>> for FieldDescriptor {
    fn from(names: Vec<S>) -> Self {
        Self::fields(names)
    }
}

/// Request to register a collection and index a batch of its records.
#[derive(Debug, Clone)]
pub struct IndexResource {
    /// Name of the collection.
    pub resource_name: String,
    /// Records to index.
    pub resources: Vec<Record>,
    /// Searchable fields or extraction function.
    pub field_names_or_index_function: FieldDescriptor,
    /// Shared state handed to extraction functions.
    pub state: Value,
}

impl IndexResource {
    /// Create a request with no records and an empty state object.
    pub fn new(resource_name: impl Into<String>, descriptor: impl Into<FieldDescriptor>) -> Self {
        Self {
            resource_name: resource_name.into(),
            resources: Vec::new(),
            field_names_or_index_function: descriptor.into(),
            state: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the records to index.
    #[must_use]
    pub fn resources(mut self, resources: Vec<Record>) -> Self {
        self.resources = resources;
        self
    }

    /// Set the shared state object.
    #[must_use]
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"id": 1}), Some(RecordId::Int(1)))]
    #[case(json!({"id": "doc-1"}), Some(RecordId::Text("doc-1".to_string())))]
    #[case(json!({"id": 1.5}), None)]
    #[case(json!({"id": null}), None)]
    #[case(json!({"name": "no id"}), None)]
    #[case(json!("not an object"), None)]
    fn test_record_id_from_record(#[case] record: Record, #[case] expected: Option<RecordId>) {
        check!(RecordId::from_record(&record, "id") == expected);
    }

    #[test]
    fn test_record_id_serde_untagged() {
        let ids: Vec<RecordId> = serde_json::from_str(r#"[3, "x"]"#).unwrap();
        check!(ids == vec![RecordId::from(3), RecordId::from("x")]);
        check!(serde_json::to_string(&ids).unwrap() == r#"[3,"x"]"#);
    }

    #[test]
    fn test_descriptor_debug_hides_function() {
        let descriptor = FieldDescriptor::function(|_, _| Ok(vec![]));
        check!(format!("{:?}", descriptor) == "ByFunction(..)");
        check!(format!("{:?}", FieldDescriptor::from(vec!["name"])) == r#"ByFieldNames(["name"])"#);
    }
}
