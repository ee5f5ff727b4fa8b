//! `ViewRegistry`: the caching/invalidation facade in front of
//! `IndexStore`'s view rows (`spec.md` §4.3). Keeps an in-memory
//! `name -> view_id` cache so repeated lookups of an already-registered
//! view skip the storage round trip; invalidated whenever the view's
//! version changes or it is deleted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::Result;
use crate::index_store::{IndexStore, ViewState};

pub struct ViewRegistry {
    index: Arc<dyn IndexStore>,
    cache: RwLock<HashMap<String, ViewState>>,
}

impl ViewRegistry {
    pub fn new(index: Arc<dyn IndexStore>) -> Self {
        Self {
            index,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or fetch) a view by name/version, returning its persisted
    /// state. A version change resets `last_sequence` to 0 in storage; the
    /// cache is updated to match rather than re-reading it back.
    pub async fn register(&self, name: &str, version: &str) -> Result<ViewState> {
        if let Some(state) = self.cache.read().await.get(name) {
            if state.version == version {
                return Ok(state.clone());
            }
        }

        let (view_id, version_changed) = self.index.upsert_view(name, version).await?;
        if version_changed {
            tracing::info!(view = name, version, "view version changed, index reset");
        }

        let state = match self.index.get_view(name).await? {
            Some(state) => state,
            None => ViewState {
                name: name.to_string(),
                view_id,
                version: version.to_string(),
                last_sequence: 0,
                total_rows: 0,
                collation: rouchdb_query::Collation::default(),
            },
        };

        self.cache.write().await.insert(name.to_string(), state.clone());
        Ok(state)
    }

    /// Look up a cached or persisted view state without registering.
    pub async fn lookup(&self, name: &str) -> Result<Option<ViewState>> {
        if let Some(state) = self.cache.read().await.get(name) {
            return Ok(Some(state.clone()));
        }
        let state = self.index.get_view(name).await?;
        if let Some(state) = &state {
            self.cache.write().await.insert(name.to_string(), state.clone());
        }
        Ok(state)
    }

    pub async fn refresh(&self, name: &str) -> Result<Option<ViewState>> {
        let state = self.index.get_view(name).await?;
        let mut cache = self.cache.write().await;
        match &state {
            Some(state) => {
                cache.insert(name.to_string(), state.clone());
            }
            None => {
                cache.remove(name);
            }
        }
        Ok(state)
    }

    pub async fn invalidate(&self, name: &str) -> Result<()> {
        self.index.delete_view(name).await?;
        self.cache.write().await.remove(name);
        Ok(())
    }

    pub fn index_store(&self) -> &Arc<dyn IndexStore> {
        &self.index
    }
}
