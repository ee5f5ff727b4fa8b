//! Incremental, persistent secondary-index views over a document store:
//! `IndexStore`, `ViewRegistry`, `Indexer`, `View`, and `Database`.

pub mod database;
pub mod error;
pub mod index_store;
pub mod indexer;
pub mod registry;
pub mod view;

pub use database::Database;
pub use error::{Result, ViewError};
pub use index_store::{IndexEntry, IndexScanRow, IndexStore, ViewState};
pub use indexer::{MapFn, ViewUpdateResult};
pub use registry::ViewRegistry;
pub use view::View;

pub use rouchdb_core::store::{DocumentStore, RevisionRow, Sequence};
