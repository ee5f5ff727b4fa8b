//! The `Indexer`: incremental replay of revisions into a view's persisted
//! index, with conflict resolution against prior index state
//! (`spec.md` §4.4 — the central algorithm).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use rouchdb_core::store::{DocumentStore, RevisionRow, Sequence};

use crate::error::{Result, ViewError};
use crate::index_store::IndexStore;

/// A map function: `(documentProperties) -> emissions`. Modeled as a
/// fallible closure rather than a `(doc, emit)` callback pair — the
/// indexer collects whatever emissions came back before the function
/// either returned or failed, which is equivalent to CouchDB's
/// "`emit` called 0..N times" contract without requiring interior
/// mutability at every call site.
pub type MapFn = Arc<dyn Fn(&Value) -> std::result::Result<Vec<(Value, Value)>, String> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewUpdateResult {
    Updated,
    NotModified,
}

/// Run `updateIndex` for one view (`spec.md` §4.4).
///
/// On success, the view's index reflects every revision whose sequence was
/// `<= store.max_sequence()` at the moment this call began, or nothing
/// changed (`NotModified`). On error, nothing is left partially applied:
/// callers that back `IndexStore` with a real transactional store must
/// roll back on any `Err` this function returns.
pub async fn update_index(
    view_id: i64,
    last_sequence: Sequence,
    map_fn: &MapFn,
    store: &dyn DocumentStore,
    index: &dyn IndexStore,
    cancel: &CancellationToken,
) -> Result<ViewUpdateResult> {
    if view_id <= 0 {
        return Err(ViewError::NotFound("view has no assigned view_id".into()));
    }

    let last = last_sequence;
    let db_max = store.max_sequence().await?;

    // Step 2: invalidation sweep. A fresh view (last == 0) has nothing to
    // invalidate selectively — drop everything and rebuild. Otherwise only
    // documents whose winning leaf was superseded since the last build need
    // their stale emissions removed.
    if last == 0 {
        index.delete_maps_for_view(view_id).await?;
    } else if last < db_max {
        let superseded = store.find_superseded_parents(last, db_max).await?;
        if !superseded.is_empty() {
            index.delete_maps_for_replaced_revs(view_id, &superseded).await?;
        }
    }

    // Step 3: idempotence check.
    if last == db_max {
        return Ok(ViewUpdateResult::NotModified);
    }

    // Step 4: scan revisions since the last indexed sequence,
    // (doc_numeric_id ASC, rev DESC).
    let mut rows = store.scan_revisions_since(last).await?;
    if last == 0 {
        rows.retain(|r| !r.deleted);
    }

    // Step 5: process each contiguous document group.
    let mut i = 0;
    while i < rows.len() {
        if cancel.is_cancelled() {
            tracing::debug!(view_id, "updateIndex cancelled between documents");
            return Err(ViewError::Cancelled);
        }

        let doc_numeric_id = rows[i].doc_numeric_id;
        let mut j = i + 1;
        while j < rows.len() && rows[j].doc_numeric_id == doc_numeric_id {
            j += 1;
        }
        let group = &rows[i..j];
        i = j;

        process_document_group(view_id, last, group, map_fn, store, index).await?;
    }

    let total = index.count_maps(view_id).await?;
    index.set_view_state(view_id, db_max, total).await?;
    Ok(ViewUpdateResult::Updated)
}

async fn process_document_group(
    view_id: i64,
    last: Sequence,
    group: &[RevisionRow],
    map_fn: &MapFn,
    store: &dyn DocumentStore,
    index: &dyn IndexStore,
) -> Result<()> {
    // The first row is the current winning revision (highest rev). The
    // rest are losing conflicts the store returned alongside it — they
    // are not indexed directly, only consulted for prior-state resolution.
    let winner = &group[0];

    if winner.doc_id.is_empty() {
        // Defensively skip rows the store returned with no doc id.
        return Ok(());
    }
    if winner.doc_id.starts_with("_design/") {
        return Ok(());
    }

    let mut final_rev = winner.rev.clone();
    let mut final_sequence = winner.sequence;
    let mut final_deleted = winner.deleted;

    // Prior-state conflict resolution.
    if last > 0 {
        if let Some(prior) = store
            .find_winning_revision_at_or_before(winner.doc_numeric_id, last)
            .await?
        {
            index.delete_maps_by_sequence(view_id, prior.sequence).await?;
            if final_deleted || prior.rev > final_rev {
                final_rev = prior.rev.clone();
                final_sequence = prior.sequence;
                final_deleted = false;
            }
        }
    }

    if final_deleted {
        return Ok(());
    }

    let body = store.load_body(final_sequence).await?;
    let properties = build_doc_properties(body, &winner.doc_id, &final_rev.to_string(), winner.no_attachments);

    let emissions = match std::panic::catch_unwind(AssertUnwindSafe(|| map_fn(&properties))) {
        Ok(Ok(emissions)) => emissions,
        Ok(Err(message)) => {
            tracing::warn!(doc_id = %winner.doc_id, %message, "map function failed");
            return Ok(());
        }
        Err(_) => {
            tracing::warn!(doc_id = %winner.doc_id, "map function panicked");
            return Ok(());
        }
    };

    for (key, value) in emissions {
        index
            .insert_map(view_id, &winner.doc_id, final_sequence, key, Some(value))
            .await?;
    }

    Ok(())
}

/// Materialize the `doc` value a map function receives: the stored body
/// plus `_id`/`_rev`, with `_attachments` stripped when the revision has
/// none (`spec.md` §4.4 step 5).
fn build_doc_properties(body: Value, doc_id: &str, rev: &str, no_attachments: bool) -> Value {
    let mut obj = match body {
        Value::Object(m) => m,
        _ => serde_json::Map::new(),
    };
    obj.insert("_id".into(), Value::String(doc_id.to_string()));
    obj.insert("_rev".into(), Value::String(rev.to_string()));
    if no_attachments {
        obj.remove("_attachments");
    }
    Value::Object(obj)
}
