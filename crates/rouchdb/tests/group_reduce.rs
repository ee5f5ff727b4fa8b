//! Scenario: `group_level` controls how many leading key elements define a
//! reduce group (`spec.md` §4.7/§8).

mod common;

use common::{fresh_database, map_country_city};
use rouchdb::{QueryOptions, ReduceFn};
use serde_json::json;

#[tokio::test]
async fn group_level_one_aggregates_by_country_only() {
    let (db, store) = fresh_database();
    store.put("a", None, json!({"country": "US", "city": "NYC"}), false).await.unwrap();
    store.put("b", None, json!({"country": "US", "city": "LA"}), false).await.unwrap();
    store.put("c", None, json!({"country": "FR", "city": "Paris"}), false).await.unwrap();

    let view = db
        .register_view("by_country_city", "1", map_country_city(), Some(ReduceFn::Count))
        .await
        .unwrap();
    view.update_index().await.unwrap();

    let options = QueryOptions {
        reduce: true,
        group: true,
        group_level: Some(1),
        ..QueryOptions::new()
    };
    let mut rows = view.query(options).await.unwrap();
    rows.sort_by(|a, b| a.key.to_string().cmp(&b.key.to_string()));

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].key, json!(["FR"]));
    assert_eq!(rows[0].value, json!(1));
    assert_eq!(rows[1].key, json!(["US"]));
    assert_eq!(rows[1].value, json!(2));
}

#[tokio::test]
async fn group_level_two_matches_full_key_grouping() {
    let (db, store) = fresh_database();
    store.put("a", None, json!({"country": "US", "city": "NYC"}), false).await.unwrap();
    store.put("b", None, json!({"country": "US", "city": "LA"}), false).await.unwrap();

    let view = db
        .register_view("by_country_city", "1", map_country_city(), Some(ReduceFn::Count))
        .await
        .unwrap();
    view.update_index().await.unwrap();

    let options = QueryOptions {
        reduce: true,
        group: true,
        group_level: Some(2),
        ..QueryOptions::new()
    };
    let rows = view.query(options).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.value == json!(1)));
}

#[tokio::test]
async fn ungrouped_reduce_collapses_to_one_row() {
    let (db, store) = fresh_database();
    store.put("a", None, json!({"country": "US", "city": "NYC"}), false).await.unwrap();
    store.put("b", None, json!({"country": "US", "city": "LA"}), false).await.unwrap();
    store.put("c", None, json!({"country": "FR", "city": "Paris"}), false).await.unwrap();

    let view = db
        .register_view("by_country_city", "1", map_country_city(), Some(ReduceFn::Count))
        .await
        .unwrap();
    view.update_index().await.unwrap();

    let options = QueryOptions {
        reduce: true,
        ..QueryOptions::new()
    };
    let rows = view.query(options).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, json!(3));
}
