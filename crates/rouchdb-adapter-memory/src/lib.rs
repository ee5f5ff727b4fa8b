//! Reference in-memory implementations of [`rouchdb_core::DocumentStore`]
//! and [`rouchdb_views::IndexStore`], for tests and for embedding the view
//! engine without a real document database backend.

pub mod document_store;
pub mod index_store;

pub use document_store::MemoryDocumentStore;
pub use index_store::MemoryIndexStore;
