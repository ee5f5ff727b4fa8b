//! The abstract document store capability the view engine consumes.
//!
//! `spec.md` scopes the revision tree, attachment blobs, and JSON body store
//! out of this crate: they belong to the document database itself. What the
//! indexer needs from that database is a narrow, read-only slice — the
//! `revs`/`docs` tables of the logical schema in `spec.md` §6 — exposed here
//! as the [`DocumentStore`] trait. A real document database implements it
//! once; `rouchdb-adapter-memory` provides a reference implementation for
//! tests and for embedding without a separate storage engine.

use async_trait::async_trait;
use serde_json::Value;

use crate::document::Revision;
use crate::error::Result;

/// A monotonic sequence number assigned by the document store on every
/// revision write. The basis of incremental indexing (`spec.md` glossary).
pub type Sequence = u64;

/// A read-only view of one revision row from the document store's `revs`
/// table (`spec.md` §3 "Revision" entity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRow {
    pub doc_id: String,
    pub doc_numeric_id: u64,
    pub sequence: Sequence,
    pub rev: Revision,
    pub deleted: bool,
    pub no_attachments: bool,
    /// Sequence of the revision this one was written over, if any. Used by
    /// the indexer's invalidation sweep to find emissions orphaned by a
    /// conflict that has since been resolved on the winning branch.
    pub parent: Option<Sequence>,
}

/// The narrow, read-only capability the indexer needs from the document
/// store. Every method is async: a real implementation backs this with
/// file or network I/O, so the indexer treats every call as a potential
/// blocking point (`spec.md` §5).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The highest sequence number assigned by the store so far.
    async fn max_sequence(&self) -> Result<Sequence>;

    /// All `current = true` revision rows with `sequence > since`, ordered
    /// by `(doc_numeric_id ASC, rev DESC)` as `spec.md` §4.4 step 4
    /// requires. When `since == 0` the caller additionally wants only
    /// non-deleted rows; callers apply that filter themselves rather than
    /// burdening every implementation with the distinction.
    async fn scan_revisions_since(&self, since: Sequence) -> Result<Vec<RevisionRow>>;

    /// The highest-rev `current = true`, non-deleted revision of a document
    /// with `sequence <= at_or_before`, used by the indexer's prior-state
    /// conflict resolution (`spec.md` §4.4 step 5).
    async fn find_winning_revision_at_or_before(
        &self,
        doc_numeric_id: u64,
        at_or_before: Sequence,
    ) -> Result<Option<RevisionRow>>;

    /// Revision rows whose own `sequence > since` (newly scanned) and whose
    /// `parent <= since` (already indexed) — the rows the invalidation
    /// sweep uses to find revisions superseded since the view's last
    /// indexed sequence (`spec.md` §4.4 step 2). `upto` bounds the newly
    /// scanned side from above; it is not compared against `parent`.
    async fn find_superseded_parents(
        &self,
        since: Sequence,
        upto: Sequence,
    ) -> Result<Vec<Sequence>>;

    /// The raw JSON body for a revision, decoded to a `serde_json::Value`.
    async fn load_body(&self, sequence: Sequence) -> Result<Value>;

    /// The current winning, non-deleted revision's body for a document id,
    /// used for CouchDB-style "linked documents": a map function can emit a
    /// value shaped like `{"_id": "other-doc"}` and `include_docs` follows
    /// it instead of loading the emitting document (`spec.md` §4.6).
    async fn load_current_winning_body(&self, doc_id: &str) -> Result<Option<Value>>;
}
