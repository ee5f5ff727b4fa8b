//! `View`: the public handle an embedder holds for one registered view —
//! `updateIndex`, `query`, and the read-only accessors `spec.md` §4.3/§4.4/
//! §4.6 describe.

use std::sync::Arc;
use std::sync::Weak;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use rouchdb_core::store::Sequence;
use rouchdb_query::{Collation, IndexScanRow as QueryIndexScanRow, QueryOptions, QueryRow, ReduceFn};

use crate::database::DatabaseInner;
use crate::error::{Result, ViewError};
use crate::index_store::ViewState;
use crate::indexer::{self, MapFn, ViewUpdateResult};

struct ViewRuntimeState {
    last_sequence: Sequence,
    total_rows: u64,
}

pub struct View {
    name: String,
    view_id: i64,
    map_fn: MapFn,
    reduce_fn: Option<ReduceFn>,
    collation: RwLock<Collation>,
    state: RwLock<ViewRuntimeState>,
    db: Weak<DatabaseInner>,
    cancel: CancellationToken,
}

impl View {
    pub(crate) fn new(
        state: ViewState,
        map_fn: MapFn,
        reduce_fn: Option<ReduceFn>,
        db: Weak<DatabaseInner>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            name: state.name,
            view_id: state.view_id,
            map_fn,
            reduce_fn,
            collation: RwLock::new(state.collation),
            state: RwLock::new(ViewRuntimeState {
                last_sequence: state.last_sequence,
                total_rows: state.total_rows,
            }),
            db,
            cancel,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view_id(&self) -> i64 {
        self.view_id
    }

    pub async fn collation(&self) -> Collation {
        *self.collation.read().await
    }

    pub async fn set_collation(&self, collation: Collation) -> Result<()> {
        let db = self.database()?;
        db.registry.index_store().set_collation(self.view_id, collation).await?;
        db.registry.refresh(&self.name).await?;
        *self.collation.write().await = collation;
        Ok(())
    }

    pub async fn last_sequence_indexed(&self) -> Sequence {
        self.state.read().await.last_sequence
    }

    pub async fn total_rows(&self) -> u64 {
        self.state.read().await.total_rows
    }

    pub async fn is_stale(&self) -> Result<bool> {
        let db = self.database()?;
        let max = db.store.max_sequence().await?;
        Ok(self.state.read().await.last_sequence < max)
    }

    /// Cancel any `updateIndex` in flight for this view. A no-op once the
    /// update has already finished (`spec.md` §5).
    pub fn cancel_update(&self) {
        self.cancel.cancel();
    }

    /// `updateIndex` (`spec.md` §4.4): bring this view's persisted index up
    /// to the document store's current `max_sequence`.
    pub async fn update_index(&self) -> Result<ViewUpdateResult> {
        let db = self.database()?;
        let last = self.state.read().await.last_sequence;

        let result = indexer::update_index(
            self.view_id,
            last,
            &self.map_fn,
            db.store.as_ref(),
            db.registry.index_store().as_ref(),
            &self.cancel,
        )
        .await?;

        if result == ViewUpdateResult::Updated {
            if let Some(refreshed) = db.registry.refresh(&self.name).await? {
                let mut state = self.state.write().await;
                state.last_sequence = refreshed.last_sequence;
                state.total_rows = refreshed.total_rows;
            }
        }

        Ok(result)
    }

    /// `query` (`spec.md` §4.5/§4.6): plan, scan, and post-process a range
    /// or key-set query against this view's persisted index.
    pub async fn query(&self, options: QueryOptions) -> Result<Vec<QueryRow>> {
        let db = self.database()?;
        let collation = self.collation().await;
        let plan = rouchdb_query::plan_query(&options, collation, self.reduce_fn.is_some())?;

        let scanned = db.registry.index_store().scan_index(self.view_id, &plan).await?;
        let rows: Vec<QueryIndexScanRow> = scanned
            .into_iter()
            .map(|r| QueryIndexScanRow {
                doc_id: r.doc_id,
                sequence: r.sequence,
                key: r.key,
                value: r.value,
            })
            .collect();

        let post_filter = options.post_filter.clone();
        let executed = rouchdb_query::execute(rows, &plan, self.reduce_fn.as_ref(), db.store.as_ref()).await?;
        Ok(rouchdb_query::apply_post_filter(executed, post_filter.as_deref()))
    }

    /// Remove this view's registry row and every persisted emission
    /// (`spec.md` §4.3 `deleteIndex`). Further calls on this handle return
    /// `NotFound`.
    pub async fn delete(&self) -> Result<()> {
        let db = self.database()?;
        db.registry.invalidate(&self.name).await
    }

    fn database(&self) -> Result<Arc<DatabaseInner>> {
        let db = self.db.upgrade().ok_or(ViewError::NotOpen)?;
        db.ensure_open()?;
        Ok(db)
    }
}
