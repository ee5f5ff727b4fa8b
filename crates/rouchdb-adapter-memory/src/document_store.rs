//! A reference, in-memory [`DocumentStore`]: an append-only revision log
//! good enough to drive the indexer's tests and to embed the view engine
//! without a real document database.

use std::collections::HashMap;

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use rouchdb_core::document::Revision;
use rouchdb_core::store::{DocumentStore, RevisionRow, Sequence};
use rouchdb_core::{Result, RouchError};

#[derive(Debug, Clone)]
struct StoredRevision {
    doc_id: String,
    doc_numeric_id: u64,
    sequence: Sequence,
    rev: Revision,
    deleted: bool,
    parent: Option<Sequence>,
    body: Value,
    current: bool,
}

impl StoredRevision {
    fn to_row(&self) -> RevisionRow {
        RevisionRow {
            doc_id: self.doc_id.clone(),
            doc_numeric_id: self.doc_numeric_id,
            sequence: self.sequence,
            rev: self.rev.clone(),
            deleted: self.deleted,
            no_attachments: true,
            parent: self.parent,
        }
    }
}

#[derive(Default)]
struct Inner {
    next_sequence: Sequence,
    next_numeric_id: u64,
    doc_numeric_ids: HashMap<String, u64>,
    revisions: Vec<StoredRevision>,
}

impl Inner {
    fn numeric_id_for(&mut self, doc_id: &str) -> u64 {
        if let Some(&id) = self.doc_numeric_ids.get(doc_id) {
            return id;
        }
        self.next_numeric_id += 1;
        let id = self.next_numeric_id;
        self.doc_numeric_ids.insert(doc_id.to_string(), id);
        id
    }

    fn next_hash(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(Uuid::new_v4().as_bytes());
        format!("{:x}", hasher.finalize())[..12].to_string()
    }

    fn append(
        &mut self,
        doc_id: &str,
        doc_numeric_id: u64,
        rev: Revision,
        deleted: bool,
        body: Value,
        parent: Option<Sequence>,
    ) {
        self.next_sequence += 1;
        self.revisions.push(StoredRevision {
            doc_id: doc_id.to_string(),
            doc_numeric_id,
            sequence: self.next_sequence,
            rev,
            deleted,
            parent,
            body,
            current: true,
        });
    }
}

/// An in-memory document store. Not durable, not concurrent across
/// processes — a reference implementation of [`DocumentStore`] for tests
/// and for embedding the view engine with no external database.
pub struct MemoryDocumentStore {
    inner: RwLock<Inner>,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Write a new revision as a child of `parent` (or as the first
    /// revision of a brand-new document when `parent` is `None`).
    pub async fn put(&self, doc_id: &str, parent: Option<&Revision>, body: Value, deleted: bool) -> Result<Revision> {
        let mut inner = self.inner.write().await;
        let doc_numeric_id = inner.numeric_id_for(doc_id);

        match parent {
            Some(parent_rev) => {
                let parent_idx = inner
                    .revisions
                    .iter()
                    .position(|r| r.doc_numeric_id == doc_numeric_id && r.current && &r.rev == parent_rev)
                    .ok_or(RouchError::Conflict)?;
                let parent_seq = inner.revisions[parent_idx].sequence;
                inner.revisions[parent_idx].current = false;
                let rev = Revision::new(parent_rev.pos + 1, inner.next_hash());
                inner.append(doc_id, doc_numeric_id, rev.clone(), deleted, body, Some(parent_seq));
                Ok(rev)
            }
            None => {
                if inner
                    .revisions
                    .iter()
                    .any(|r| r.doc_numeric_id == doc_numeric_id && r.current)
                {
                    return Err(RouchError::Conflict);
                }
                let rev = Revision::new(1, inner.next_hash());
                inner.append(doc_id, doc_numeric_id, rev.clone(), deleted, body, None);
                Ok(rev)
            }
        }
    }

    /// Insert an additional current leaf revision without superseding any
    /// existing one — simulates a replicated conflicting branch, giving
    /// tests direct control over the exact `rev` id (`spec.md` §8's
    /// `2-aaaa`/`2-bbbb` conflict scenario).
    pub async fn put_conflicting_leaf(&self, doc_id: &str, rev: Revision, body: Value, deleted: bool) -> Revision {
        let mut inner = self.inner.write().await;
        let doc_numeric_id = inner.numeric_id_for(doc_id);
        inner.append(doc_id, doc_numeric_id, rev.clone(), deleted, body, None);
        rev
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn max_sequence(&self) -> Result<Sequence> {
        Ok(self.inner.read().await.revisions.last().map(|r| r.sequence).unwrap_or(0))
    }

    async fn scan_revisions_since(&self, since: Sequence) -> Result<Vec<RevisionRow>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<RevisionRow> = inner
            .revisions
            .iter()
            .filter(|r| r.current && r.sequence > since)
            .map(StoredRevision::to_row)
            .collect();
        rows.sort_by(|a, b| a.doc_numeric_id.cmp(&b.doc_numeric_id).then_with(|| b.rev.cmp(&a.rev)));
        Ok(rows)
    }

    async fn find_winning_revision_at_or_before(
        &self,
        doc_numeric_id: u64,
        at_or_before: Sequence,
    ) -> Result<Option<RevisionRow>> {
        let inner = self.inner.read().await;
        Ok(inner
            .revisions
            .iter()
            .filter(|r| r.doc_numeric_id == doc_numeric_id && r.sequence <= at_or_before && r.current && !r.deleted)
            .max_by(|a, b| a.rev.cmp(&b.rev).then_with(|| a.sequence.cmp(&b.sequence)))
            .map(StoredRevision::to_row))
    }

    async fn find_superseded_parents(&self, since: Sequence, upto: Sequence) -> Result<Vec<Sequence>> {
        let inner = self.inner.read().await;
        Ok(inner
            .revisions
            .iter()
            .filter(|r| r.sequence > since && r.sequence <= upto && r.parent.is_some_and(|p| p <= since))
            .filter_map(|r| r.parent)
            .collect())
    }

    async fn load_body(&self, sequence: Sequence) -> Result<Value> {
        let inner = self.inner.read().await;
        inner
            .revisions
            .iter()
            .find(|r| r.sequence == sequence)
            .map(|r| r.body.clone())
            .ok_or_else(|| RouchError::NotFound(format!("sequence {sequence}")))
    }

    async fn load_current_winning_body(&self, doc_id: &str) -> Result<Option<Value>> {
        let inner = self.inner.read().await;
        let Some(&doc_numeric_id) = inner.doc_numeric_ids.get(doc_id) else {
            return Ok(None);
        };
        Ok(inner
            .revisions
            .iter()
            .filter(|r| r.doc_numeric_id == doc_numeric_id && r.current && !r.deleted)
            .max_by(|a, b| a.rev.cmp(&b.rev))
            .map(|r| r.body.clone()))
    }
}
