//! A reference, in-memory [`IndexStore`]: the `views` registry and `maps`
//! rows held as plain `Vec`s behind a lock, scanned linearly and sorted
//! with `rouchdb_query::codec::compare` at query time. Good enough for
//! tests and small embedded uses; a real backend would keep `maps` in a
//! key-ordered B-tree instead of sorting on every scan.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use rouchdb_core::store::Sequence;
use rouchdb_query::codec::compare;
use rouchdb_query::plan::{QueryPlan, ScanMode};
use rouchdb_query::Collation;
use rouchdb_views::error::{Result, ViewError};
use rouchdb_views::index_store::{IndexScanRow, IndexStore, ViewState};

#[derive(Debug, Clone)]
struct MapRow {
    doc_id: String,
    sequence: Sequence,
    key: Value,
    value: Value,
}

struct ViewRow {
    view_id: i64,
    name: String,
    version: String,
    last_sequence: Sequence,
    total_rows: u64,
    collation: Collation,
}

#[derive(Default)]
struct Inner {
    next_view_id: i64,
    views_by_name: HashMap<String, ViewRow>,
    views_by_id: HashMap<i64, String>,
    maps: HashMap<i64, Vec<MapRow>>,
}

#[derive(Default)]
pub struct MemoryIndexStore {
    inner: RwLock<Inner>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_state(row: &ViewRow) -> ViewState {
    ViewState {
        name: row.name.clone(),
        view_id: row.view_id,
        version: row.version.clone(),
        last_sequence: row.last_sequence,
        total_rows: row.total_rows,
        collation: row.collation,
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn upsert_view(&self, name: &str, version: &str) -> Result<(i64, bool)> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.views_by_name.get(name) {
            let view_id = existing.view_id;
            if existing.version == version {
                return Ok((view_id, false));
            }
            if let Some(row) = inner.views_by_name.get_mut(name) {
                row.version = version.to_string();
                row.last_sequence = 0;
                row.total_rows = 0;
            }
            inner.maps.remove(&view_id);
            return Ok((view_id, true));
        }

        inner.next_view_id += 1;
        let view_id = inner.next_view_id;
        inner.views_by_name.insert(
            name.to_string(),
            ViewRow {
                view_id,
                name: name.to_string(),
                version: version.to_string(),
                last_sequence: 0,
                total_rows: 0,
                collation: Collation::default(),
            },
        );
        inner.views_by_id.insert(view_id, name.to_string());
        Ok((view_id, false))
    }

    async fn get_view(&self, name: &str) -> Result<Option<ViewState>> {
        let inner = self.inner.read().await;
        Ok(inner.views_by_name.get(name).map(to_state))
    }

    async fn set_collation(&self, view_id: i64, collation: Collation) -> Result<()> {
        let mut inner = self.inner.write().await;
        let name = inner
            .views_by_id
            .get(&view_id)
            .cloned()
            .ok_or_else(|| ViewError::NotFound(format!("view {view_id}")))?;
        if let Some(row) = inner.views_by_name.get_mut(&name) {
            row.collation = collation;
        }
        Ok(())
    }

    async fn delete_view(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        if let Some(row) = inner.views_by_name.remove(name) {
            inner.views_by_id.remove(&row.view_id);
            inner.maps.remove(&row.view_id);
        }
        Ok(())
    }

    async fn delete_maps_for_view(&self, view_id: i64) -> Result<()> {
        self.inner.write().await.maps.remove(&view_id);
        Ok(())
    }

    async fn delete_maps_by_sequence(&self, view_id: i64, sequence: Sequence) -> Result<()> {
        if let Some(rows) = self.inner.write().await.maps.get_mut(&view_id) {
            rows.retain(|r| r.sequence != sequence);
        }
        Ok(())
    }

    async fn delete_maps_for_replaced_revs(&self, view_id: i64, sequences: &[Sequence]) -> Result<()> {
        if let Some(rows) = self.inner.write().await.maps.get_mut(&view_id) {
            rows.retain(|r| !sequences.contains(&r.sequence));
        }
        Ok(())
    }

    async fn insert_map(&self, view_id: i64, doc_id: &str, sequence: Sequence, key: Value, value: Option<Value>) -> Result<()> {
        self.inner.write().await.maps.entry(view_id).or_default().push(MapRow {
            doc_id: doc_id.to_string(),
            sequence,
            key,
            value: value.unwrap_or(Value::Null),
        });
        Ok(())
    }

    async fn set_view_state(&self, view_id: i64, last_sequence: Sequence, total_rows: u64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let name = inner
            .views_by_id
            .get(&view_id)
            .cloned()
            .ok_or_else(|| ViewError::NotFound(format!("view {view_id}")))?;
        if let Some(row) = inner.views_by_name.get_mut(&name) {
            row.last_sequence = last_sequence;
            row.total_rows = total_rows;
        }
        Ok(())
    }

    async fn count_maps(&self, view_id: i64) -> Result<u64> {
        Ok(self.inner.read().await.maps.get(&view_id).map(|r| r.len()).unwrap_or(0) as u64)
    }

    async fn scan_index(&self, view_id: i64, plan: &QueryPlan) -> Result<Vec<IndexScanRow>> {
        let inner = self.inner.read().await;
        let Some(rows) = inner.maps.get(&view_id) else {
            return Ok(vec![]);
        };

        let mut matched: Vec<&MapRow> = rows
            .iter()
            .filter(|row| row_matches(row, plan, plan.collation))
            .collect();

        matched.sort_by(|a, b| {
            let ord = compare(&a.key, &b.key, plan.collation).then_with(|| a.doc_id.cmp(&b.doc_id));
            if plan.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        Ok(matched
            .into_iter()
            .map(|row| IndexScanRow {
                doc_id: row.doc_id.clone(),
                sequence: row.sequence,
                key: row.key.clone(),
                value: row.value.clone(),
            })
            .collect())
    }
}

fn row_matches(row: &MapRow, plan: &QueryPlan, collation: Collation) -> bool {
    match &plan.mode {
        ScanMode::Keys(keys) => keys.iter().any(|k| compare(&row.key, k, collation) == std::cmp::Ordering::Equal),
        ScanMode::Range { lower, upper } => {
            if let Some(lower) = lower {
                match compare(&row.key, &lower.value, collation) {
                    std::cmp::Ordering::Less => return false,
                    std::cmp::Ordering::Equal => {
                        if !lower.inclusive {
                            return false;
                        }
                        if let Some(doc_id) = &lower.doc_id {
                            if row.doc_id.as_str() < doc_id.as_str() {
                                return false;
                            }
                        }
                    }
                    std::cmp::Ordering::Greater => {}
                }
            }
            if let Some(upper) = upper {
                match compare(&row.key, &upper.value, collation) {
                    std::cmp::Ordering::Greater => return false,
                    std::cmp::Ordering::Equal => {
                        if !upper.inclusive {
                            return false;
                        }
                        if let Some(doc_id) = &upper.doc_id {
                            if row.doc_id.as_str() > doc_id.as_str() {
                                return false;
                            }
                        }
                    }
                    std::cmp::Ordering::Less => {}
                }
            }
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rouchdb_query::plan::ScanBound;
    use serde_json::json;

    fn range_plan(lower: Option<Value>, upper: Option<Value>, descending: bool) -> QueryPlan {
        QueryPlan {
            mode: ScanMode::Range {
                lower: lower.map(|v| ScanBound { value: v, inclusive: true, doc_id: None }),
                upper: upper.map(|v| ScanBound { value: v, inclusive: true, doc_id: None }),
            },
            descending,
            collation: Collation::Unicode,
            limit: None,
            skip: 0,
            group: false,
            group_level: None,
            reduce: false,
            include_docs: false,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = MemoryIndexStore::new();
        let (id, changed) = store.upsert_view("by_name", "1").await.unwrap();
        assert!(!changed);
        let state = store.get_view("by_name").await.unwrap().unwrap();
        assert_eq!(state.view_id, id);
        assert_eq!(state.last_sequence, 0);
    }

    #[tokio::test]
    async fn version_change_resets_index() {
        let store = MemoryIndexStore::new();
        let (id, _) = store.upsert_view("by_name", "1").await.unwrap();
        store.insert_map(id, "doc1", 1, json!("k"), Some(json!(1))).await.unwrap();
        store.set_view_state(id, 1, 1).await.unwrap();

        let (id2, changed) = store.upsert_view("by_name", "2").await.unwrap();
        assert!(changed);
        assert_eq!(id, id2);
        assert_eq!(store.count_maps(id).await.unwrap(), 0);
        let state = store.get_view("by_name").await.unwrap().unwrap();
        assert_eq!(state.last_sequence, 0);
    }

    #[tokio::test]
    async fn scan_index_orders_by_collation_then_doc_id() {
        let store = MemoryIndexStore::new();
        let (id, _) = store.upsert_view("v", "1").await.unwrap();
        store.insert_map(id, "b", 1, json!(1), Some(json!("x"))).await.unwrap();
        store.insert_map(id, "a", 2, json!(1), Some(json!("y"))).await.unwrap();
        store.insert_map(id, "c", 3, json!(2), Some(json!("z"))).await.unwrap();

        let plan = range_plan(None, None, false);
        let rows = store.scan_index(id, &plan).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.doc_id.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn scan_index_respects_range_bounds() {
        let store = MemoryIndexStore::new();
        let (id, _) = store.upsert_view("v", "1").await.unwrap();
        for i in 0..5 {
            store.insert_map(id, &format!("d{i}"), i as u64 + 1, json!(i), Some(json!(i))).await.unwrap();
        }
        let plan = range_plan(Some(json!(1)), Some(json!(3)), false);
        let rows = store.scan_index(id, &plan).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].key, json!(1));
        assert_eq!(rows[2].key, json!(3));
    }
}
