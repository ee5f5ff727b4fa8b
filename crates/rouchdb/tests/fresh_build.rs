//! Scenario: building a view's index for the first time against an
//! already-populated document store (`spec.md` §8).

mod common;

use common::{fresh_database, map_person_age};
use rouchdb::{QueryOptions, ViewUpdateResult};
use serde_json::json;

#[tokio::test]
async fn fresh_build_indexes_every_current_document() {
    let (db, store) = fresh_database();
    store.put("a", None, json!({"type": "person", "name": "Alice", "age": 30}), false).await.unwrap();
    store.put("b", None, json!({"type": "person", "name": "Bob", "age": 25}), false).await.unwrap();
    store.put("c", None, json!({"type": "city", "name": "NYC"}), false).await.unwrap();

    let view = db.register_view("people_by_name", "1", map_person_age(), None).await.unwrap();

    let result = view.update_index().await.unwrap();
    assert_eq!(result, ViewUpdateResult::Updated);
    assert_eq!(view.total_rows().await, 2);
    assert_eq!(view.last_sequence_indexed().await, 3);

    let rows = view.query(QueryOptions::new()).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, json!("Alice"));
    assert_eq!(rows[0].value, json!(30));
    assert_eq!(rows[1].key, json!("Bob"));
}

#[tokio::test]
async fn fresh_build_on_empty_store_is_a_no_op_update() {
    let (db, _store) = fresh_database();
    let view = db.register_view("people_by_name", "1", map_person_age(), None).await.unwrap();

    let result = view.update_index().await.unwrap();
    assert_eq!(result, ViewUpdateResult::NotModified);
    assert_eq!(view.total_rows().await, 0);
}
