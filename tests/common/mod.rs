//! Shared test fixtures for integration tests.
//!
//! # Available Fixtures
//!
//! - `documents`: the three-document collection used across the suites
//! - `inline_api`: a facade over the inline backend
//! - `delegated_api`: a facade over a two-worker delegated backend
//!
//! Delegated fixtures need a running Tokio runtime, so tests using them must
//! be `#[tokio::test]`. Suites covering both backends take a `#[case]` name
//! and call [`api_for`] inside the test body.

use resource_search::{IndexResource, Record, SearchApi, SearchConfig};
use rstest::fixture;
use serde_json::json;

/// The three records every suite starts from.
#[allow(dead_code)] // Used across different integration test crates
pub fn document_records() -> Vec<Record> {
    vec![
        json!({"id": 1, "name": "One", "description": "The first document I'm indexing"}),
        json!({"id": 2, "name": "Two", "description": "The second document I'm indexing"}),
        json!({"id": 3, "name": "Three", "description": "The third document I'm indexing"}),
    ]
}

/// `documents` collection indexed on name and description.
#[fixture]
pub fn documents() -> IndexResource {
    IndexResource::new("documents", vec!["name", "description"]).resources(document_records())
}

#[allow(dead_code)]
#[fixture]
pub fn inline_api() -> SearchApi {
    resource_search::tracing::init();
    SearchApi::new()
}

#[allow(dead_code)]
#[fixture]
pub fn delegated_api() -> SearchApi {
    resource_search::tracing::init();
    SearchApi::from_config(SearchConfig::delegated(2)).expect("delegated backend should start")
}

/// Build either backend by name, for suites parameterized over both.
#[allow(dead_code)]
pub fn api_for(backend: &str) -> SearchApi {
    resource_search::tracing::init();
    let config = match backend {
        "inline" => SearchConfig::default(),
        "delegated" => SearchConfig::delegated(2),
        other => panic!("unknown backend '{}'", other),
    };
    SearchApi::from_config(config).expect("backend should start")
}
