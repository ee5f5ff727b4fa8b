//! `IndexStore`: the persistence abstraction for the `views` registry and
//! `maps` rows (`spec.md` §4.2, §6). This crate defines the trait; the
//! document store's revision history is a separate capability
//! (`rouchdb_core::store::DocumentStore`) the indexer also depends on.

use async_trait::async_trait;
use serde_json::Value;

use rouchdb_core::store::Sequence;
use rouchdb_query::{Collation, QueryPlan};

use crate::error::Result;

/// The persisted state of one view (`spec.md` §3 "View" entity, minus the
/// in-memory-only `mapFn`/`reduceFn`).
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub name: String,
    pub view_id: i64,
    pub version: String,
    pub last_sequence: Sequence,
    pub total_rows: u64,
    pub collation: Collation,
}

/// One `maps` row: a single document revision's emission.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub view_id: i64,
    pub doc_id: String,
    pub sequence: Sequence,
    pub key: Value,
    pub value: Option<Value>,
}

/// A scanned index row, ready to be handed to `rouchdb_query::executor`.
#[derive(Debug, Clone)]
pub struct IndexScanRow {
    pub doc_id: String,
    pub sequence: Sequence,
    pub key: Value,
    pub value: Value,
}

/// Persistence operations the indexer and query path need (`spec.md` §4.2).
/// All mutations from a single `updateIndex` call happen inside one
/// transaction; implementations must roll back entirely on failure.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert the view row if absent. If present and `version` differs,
    /// update the version and reset `last_sequence` to 0 atomically.
    /// Returns `(view_id, version_changed)`.
    async fn upsert_view(&self, name: &str, version: &str) -> Result<(i64, bool)>;

    async fn get_view(&self, name: &str) -> Result<Option<ViewState>>;

    async fn set_collation(&self, view_id: i64, collation: Collation) -> Result<()>;

    /// Remove the registry row and every `maps` row for this view.
    async fn delete_view(&self, name: &str) -> Result<()>;

    async fn delete_maps_for_view(&self, view_id: i64) -> Result<()>;

    async fn delete_maps_by_sequence(&self, view_id: i64, sequence: Sequence) -> Result<()>;

    /// Remove emissions whose source revision's sequence is in `sequences`
    /// — the losing side of a conflict resolved since the last index build.
    async fn delete_maps_for_replaced_revs(&self, view_id: i64, sequences: &[Sequence]) -> Result<()>;

    async fn insert_map(
        &self,
        view_id: i64,
        doc_id: &str,
        sequence: Sequence,
        key: Value,
        value: Option<Value>,
    ) -> Result<()>;

    async fn set_view_state(&self, view_id: i64, last_sequence: Sequence, total_rows: u64) -> Result<()>;

    async fn count_maps(&self, view_id: i64) -> Result<u64>;

    /// Execute `plan`'s range/key-set scan against this view's `maps` rows,
    /// ordered under `plan.collation`/`plan.descending`. Skip/limit are
    /// applied by the query executor, not here.
    async fn scan_index(&self, view_id: i64, plan: &QueryPlan) -> Result<Vec<IndexScanRow>>;
}
