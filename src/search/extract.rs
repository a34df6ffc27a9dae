//! Resolves a record to the strings that should be indexed for it.

use crate::types::{FieldDescriptor, Record};
use anyhow::anyhow;
use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Extracts the searchable strings of a record.
///
/// With a field-name list, each named top-level field is read in declared
/// order; missing and non-string values are skipped. With a function, the
/// function's output is used verbatim. A function that returns an error or
/// panics fails only this record.
pub fn extract(
    record: &Record,
    descriptor: &FieldDescriptor,
    state: &Value,
) -> anyhow::Result<Vec<String>> {
    match descriptor {
        FieldDescriptor::ByFieldNames(names) => Ok(names
            .iter()
            .filter_map(|name| record.get(name).and_then(Value::as_str))
            .map(String::from)
            .collect()),
        FieldDescriptor::ByFunction(index_fn) => {
            catch_unwind(AssertUnwindSafe(|| index_fn(record, state))).unwrap_or_else(|payload| {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow!("index function panicked: {}", message))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use serde_json::json;

    #[test]
    fn test_field_names_in_declared_order() {
        let record = json!({"id": 1, "name": "One", "description": "The first document"});
        let descriptor = FieldDescriptor::fields(["description", "name"]);

        let values = extract(&record, &descriptor, &json!({})).unwrap();
        check!(values == vec!["The first document", "One"]);
    }

    #[test]
    fn test_missing_and_non_string_fields_skipped() {
        let record = json!({"id": 1, "name": "One", "count": 3, "tags": ["a"], "empty": null});
        let descriptor = FieldDescriptor::fields(["count", "missing", "tags", "empty", "name"]);

        let values = extract(&record, &descriptor, &json!({})).unwrap();
        check!(values == vec!["One"]);
    }

    #[test]
    fn test_function_receives_state() {
        let record = json!({"id": 7, "author_id": 2});
        let state = json!({"authors": {"2": "Ada Lovelace"}});
        let descriptor = FieldDescriptor::function(|record, state| {
            let author_id = record["author_id"].to_string();
            Ok(state["authors"][author_id.as_str()]
                .as_str()
                .map(|name| vec![name.to_string()])
                .unwrap_or_default())
        });

        let values = extract(&record, &descriptor, &state).unwrap();
        check!(values == vec!["Ada Lovelace"]);
    }

    #[test]
    fn test_function_error_propagates() {
        let descriptor = FieldDescriptor::function(|_, _| Err(anyhow!("cannot extract")));
        let_assert!(Err(err) = extract(&json!({"id": 1}), &descriptor, &json!({})));
        check!(err.to_string() == "cannot extract");
    }

    #[test]
    fn test_function_panic_becomes_error() {
        let descriptor = FieldDescriptor::function(|_, _| panic!("bad record"));
        let_assert!(Err(err) = extract(&json!({"id": 1}), &descriptor, &json!({})));
        check!(err.to_string() == "index function panicked: bad record");
    }
}
