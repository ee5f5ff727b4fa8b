//! Shared types and the document-store abstraction for RouchDB's view
//! engine. This crate has no persistence of its own; it defines the vocabulary
//! (`Document`, `Revision`, `RouchError`) and the capability
//! ([`store::DocumentStore`]) that `rouchdb-query` and `rouchdb-views` build
//! on.

pub mod document;
pub mod error;
pub mod store;

pub use document::{AttachmentMeta, Document, Revision};
pub use error::{Result, RouchError};
pub use store::{DocumentStore, RevisionRow, Sequence};
