//! Shared fixtures for the view-indexing integration tests: an in-memory
//! database plus a couple of stock map functions.

use std::sync::Arc;

use rouchdb::{Database, MapFn};
use rouchdb_adapter_memory::{MemoryDocumentStore, MemoryIndexStore};
use serde_json::Value;

/// A fresh database backed by the in-memory reference adapters.
pub fn fresh_database() -> (Database, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    let index = Arc::new(MemoryIndexStore::new());
    (Database::new(store.clone(), index), store)
}

/// Emits `(doc.name, doc.age)` for every document with `type == "person"`.
pub fn map_person_age() -> MapFn {
    Arc::new(|doc: &Value| {
        if doc.get("type").and_then(Value::as_str) == Some("person") {
            Ok(vec![(doc["name"].clone(), doc["age"].clone())])
        } else {
            Ok(vec![])
        }
    })
}

/// Emits `([doc.country, doc.city], 1)` for every document with a `country`
/// field — grounds the prefix-match and group-level scenarios.
pub fn map_country_city() -> MapFn {
    Arc::new(|doc: &Value| {
        if let Some(country) = doc.get("country").and_then(Value::as_str) {
            let city = doc.get("city").cloned().unwrap_or(Value::Null);
            Ok(vec![(serde_json::json!([country, city]), serde_json::json!(1))])
        } else {
            Ok(vec![])
        }
    })
}
