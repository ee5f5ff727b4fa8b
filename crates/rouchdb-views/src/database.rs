//! `Database`: the embedder-facing owner of one document store + index
//! store pair, and the factory for `View`s (`spec.md` §6).
//!
//! `View` holds only a [`Weak`] back-reference to this struct's shared
//! inner state, never a strong one — `Database` never keeps a list of the
//! views it created either. That keeps the object graph acyclic: closing
//! a `Database` just flips a flag and cancels a shared token, and every
//! `View` notices on its next operation rather than requiring the database
//! to reach back into each view and null out a reference (`spec.md` §5,
//! §9).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rouchdb_core::store::DocumentStore;
use rouchdb_query::ReduceFn;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, ViewError};
use crate::index_store::IndexStore;
use crate::indexer::MapFn;
use crate::registry::ViewRegistry;
use crate::view::View;

pub(crate) struct DatabaseInner {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) registry: ViewRegistry,
    pub(crate) open: AtomicBool,
    pub(crate) cancel: CancellationToken,
}

impl DatabaseInner {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.open.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(ViewError::NotOpen)
        }
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, index: Arc<dyn IndexStore>) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                store,
                registry: ViewRegistry::new(index),
                open: AtomicBool::new(true),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Register a view (`spec.md` §4.3 `registerView`). A `version` change
    /// from a prior registration resets the index for this view.
    pub async fn register_view(
        &self,
        name: &str,
        version: &str,
        map_fn: MapFn,
        reduce_fn: Option<ReduceFn>,
    ) -> Result<Arc<View>> {
        self.inner.ensure_open()?;
        let state = self.inner.registry.register(name, version).await?;
        Ok(Arc::new(View::new(
            state,
            map_fn,
            reduce_fn,
            Arc::downgrade(&self.inner),
            self.inner.cancel.child_token(),
        )))
    }

    /// Re-attach to an already-registered view without re-supplying its
    /// map/reduce functions — used by callers that only want to query an
    /// index another part of the process already builds.
    pub async fn open_view(
        &self,
        name: &str,
        map_fn: MapFn,
        reduce_fn: Option<ReduceFn>,
    ) -> Result<Option<Arc<View>>> {
        self.inner.ensure_open()?;
        let state = self.inner.registry.lookup(name).await?;
        Ok(state.map(|state| {
            Arc::new(View::new(
                state,
                map_fn,
                reduce_fn,
                Arc::downgrade(&self.inner),
                self.inner.cancel.child_token(),
            ))
        }))
    }

    pub async fn delete_view(&self, name: &str) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner.registry.invalidate(name).await
    }

    /// Close the database: every live `View` handle starts returning
    /// `ViewError::NotOpen` from its next operation, and any `updateIndex`
    /// in flight observes its cancellation token.
    pub fn close(&self) {
        self.inner.open.store(false, Ordering::Release);
        self.inner.cancel.cancel();
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::Acquire)
    }
}
