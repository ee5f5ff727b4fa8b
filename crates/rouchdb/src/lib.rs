//! Incremental, persistent map/reduce view indexing for document
//! databases — a single-import facade over `rouchdb-views`/`rouchdb-query`.
//!
//! Bring your own [`DocumentStore`], register a view with [`Database`], and
//! call [`View::update_index`]/[`View::query`] to keep a secondary index in
//! sync with the document store's revision history.

pub use rouchdb_core::store::{DocumentStore, RevisionRow, Sequence};
pub use rouchdb_core::{Document, Revision};

pub use rouchdb_query::{Collation, QueryOptions, QueryRow, ReduceFn};

pub use rouchdb_views::{
    Database, IndexStore, MapFn, Result, View, ViewError, ViewUpdateResult,
};
