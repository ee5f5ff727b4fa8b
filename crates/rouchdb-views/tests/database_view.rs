//! Wiring-level tests for `Database`/`View` against the in-memory reference
//! adapters: registration caching, collation updates, delete, and the
//! close-invalidates-views behavior (`spec.md` §5/§9).

use std::sync::Arc;

use rouchdb_adapter_memory::{MemoryDocumentStore, MemoryIndexStore};
use rouchdb_query::{Collation, QueryOptions};
use rouchdb_views::{Database, ViewError};
use serde_json::json;

fn identity_map() -> rouchdb_views::MapFn {
    Arc::new(|doc: &serde_json::Value| Ok(vec![(doc["_id"].clone(), json!(1))]))
}

fn fresh() -> (Database, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    let index = Arc::new(MemoryIndexStore::new());
    (Database::new(store.clone(), index), store)
}

#[tokio::test]
async fn register_view_is_idempotent_for_same_version() {
    let (db, _store) = fresh();
    let v1 = db.register_view("v", "1", identity_map(), None).await.unwrap();
    let v2 = db.register_view("v", "1", identity_map(), None).await.unwrap();
    assert_eq!(v1.view_id(), v2.view_id());
}

#[tokio::test]
async fn set_collation_persists_across_reopen() {
    let (db, _store) = fresh();
    let view = db.register_view("v", "1", identity_map(), None).await.unwrap();
    view.set_collation(Collation::Raw).await.unwrap();

    let reopened = db.open_view("v", identity_map(), None).await.unwrap().unwrap();
    assert_eq!(reopened.collation().await, Collation::Raw);
}

#[tokio::test]
async fn delete_view_removes_its_rows() {
    let (db, store) = fresh();
    store.put("a", None, json!({}), false).await.unwrap();
    let view = db.register_view("v", "1", identity_map(), None).await.unwrap();
    view.update_index().await.unwrap();
    assert_eq!(view.total_rows().await, 1);

    db.delete_view("v").await.unwrap();
    assert!(db.open_view("v", identity_map(), None).await.unwrap().is_none());
}

#[tokio::test]
async fn closing_the_database_invalidates_live_view_handles() {
    let (db, _store) = fresh();
    let view = db.register_view("v", "1", identity_map(), None).await.unwrap();

    db.close();

    let err = view.update_index().await.unwrap_err();
    assert!(matches!(err, ViewError::NotOpen));

    let err = view.query(QueryOptions::new()).await.unwrap_err();
    assert!(matches!(err, ViewError::NotOpen));
}

#[tokio::test]
async fn is_stale_reflects_new_writes_since_last_index() {
    let (db, store) = fresh();
    let view = db.register_view("v", "1", identity_map(), None).await.unwrap();
    assert!(!view.is_stale().await.unwrap());

    store.put("a", None, json!({}), false).await.unwrap();
    assert!(view.is_stale().await.unwrap());

    view.update_index().await.unwrap();
    assert!(!view.is_stale().await.unwrap());
}
