//! `QueryExecutor`: turns scanned index rows into [`QueryRow`]s, performing
//! the `include_docs` join and `postFilter` application (`spec.md` §4.6),
//! then hands grouped/reduced queries off to the [`crate::reduce`] module.

use serde_json::Value;

use rouchdb_core::store::DocumentStore;
use rouchdb_core::RouchError;

use crate::plan::{QueryPlan, QueryRow};
use crate::reduce::{reduce as reduce_rows, ReduceFn};

/// One row as scanned from a view's persisted index, before any
/// `include_docs` join.
#[derive(Debug, Clone)]
pub struct IndexScanRow {
    pub doc_id: String,
    pub sequence: u64,
    pub key: Value,
    pub value: Value,
}

/// Execute a plan's already-fetched scan rows.
///
/// Scanning storage for `plan` is the caller's responsibility (it owns the
/// `IndexStore`); this function is pure post-processing over the rows that
/// scan produced, so it has no opinion on how the scan itself was done.
pub async fn execute(
    rows: Vec<IndexScanRow>,
    plan: &QueryPlan,
    reduce_fn: Option<&ReduceFn>,
    store: &dyn DocumentStore,
) -> Result<Vec<QueryRow>, RouchError> {
    if plan.reduce {
        let pairs: Vec<(Value, Value)> = rows.into_iter().map(|r| (r.key, r.value)).collect();
        let reduced = reduce_rows(&pairs, reduce_fn, plan.group, plan.group_level);
        return Ok(reduced
            .into_iter()
            .map(|r| QueryRow {
                doc_id: None,
                sequence: 0,
                key: r.key,
                value: r.value,
                doc: None,
            })
            .collect());
    }

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let doc = if plan.include_docs {
            Some(resolve_doc(&row, store).await?)
        } else {
            None
        };
        out.push(QueryRow {
            doc_id: Some(row.doc_id),
            sequence: row.sequence,
            key: row.key,
            value: row.value,
            doc,
        });
    }

    let skipped = out.into_iter().skip(plan.skip as usize);
    let limited: Vec<QueryRow> = match plan.limit {
        Some(n) => skipped.take(n as usize).collect(),
        None => skipped.collect(),
    };

    Ok(limited)
}

/// Resolve a row's document for `include_docs`: follow a CouchDB-style
/// "linked document" (`value` is an object with `_id`) or fall back to
/// loading the emitting revision's own body.
async fn resolve_doc(row: &IndexScanRow, store: &dyn DocumentStore) -> Result<Value, RouchError> {
    if let Some(linked_id) = row.value.as_object().and_then(|o| o.get("_id")).and_then(|v| v.as_str()) {
        if let Some(doc) = store.load_current_winning_body(linked_id).await? {
            return Ok(doc);
        }
    }
    store.load_body(row.sequence).await
}

/// Apply a `postFilter` after row construction, dropping non-matching rows
/// and logging each drop (`spec.md` §7: a `postFilter` failure drops only
/// that row).
pub fn apply_post_filter(
    rows: Vec<QueryRow>,
    post_filter: Option<&(dyn Fn(&QueryRow) -> bool + Send + Sync)>,
) -> Vec<QueryRow> {
    match post_filter {
        None => rows,
        Some(f) => rows
            .into_iter()
            .filter(|row| {
                let keep = f(row);
                if !keep {
                    tracing::debug!(doc_id = ?row.doc_id, "row dropped by postFilter");
                }
                keep
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rouchdb_core::store::{RevisionRow, Sequence};
    use rouchdb_core::Result as CoreResult;
    use serde_json::json;

    struct StubStore;

    #[async_trait]
    impl DocumentStore for StubStore {
        async fn max_sequence(&self) -> CoreResult<Sequence> {
            Ok(0)
        }
        async fn scan_revisions_since(&self, _since: Sequence) -> CoreResult<Vec<RevisionRow>> {
            Ok(vec![])
        }
        async fn find_winning_revision_at_or_before(
            &self,
            _doc_numeric_id: u64,
            _at_or_before: Sequence,
        ) -> CoreResult<Option<RevisionRow>> {
            Ok(None)
        }
        async fn find_superseded_parents(&self, _since: Sequence, _upto: Sequence) -> CoreResult<Vec<Sequence>> {
            Ok(vec![])
        }
        async fn load_body(&self, sequence: Sequence) -> CoreResult<Value> {
            Ok(json!({"_id": "self", "seq": sequence}))
        }
        async fn load_current_winning_body(&self, doc_id: &str) -> CoreResult<Option<Value>> {
            if doc_id == "linked" {
                Ok(Some(json!({"_id": "linked", "name": "target"})))
            } else {
                Ok(None)
            }
        }
    }

    fn plan(include_docs: bool) -> QueryPlan {
        QueryPlan {
            mode: crate::plan::ScanMode::Range {
                lower: None,
                upper: None,
            },
            descending: false,
            collation: crate::codec::Collation::Unicode,
            limit: None,
            skip: 0,
            group: false,
            group_level: None,
            reduce: false,
            include_docs,
        }
    }

    #[tokio::test]
    async fn include_docs_follows_linked_document() {
        let rows = vec![IndexScanRow {
            doc_id: "a".into(),
            sequence: 1,
            key: json!("a"),
            value: json!({"_id": "linked"}),
        }];
        let store = StubStore;
        let out = execute(rows, &plan(true), None, &store).await.unwrap();
        assert_eq!(out[0].doc.as_ref().unwrap()["name"], "target");
    }

    #[tokio::test]
    async fn include_docs_falls_back_to_own_revision() {
        let rows = vec![IndexScanRow {
            doc_id: "a".into(),
            sequence: 7,
            key: json!("a"),
            value: json!(1),
        }];
        let store = StubStore;
        let out = execute(rows, &plan(true), None, &store).await.unwrap();
        assert_eq!(out[0].doc.as_ref().unwrap()["seq"], 7);
    }

    #[tokio::test]
    async fn limit_and_skip_apply_after_row_construction() {
        let rows: Vec<IndexScanRow> = (0..5)
            .map(|i| IndexScanRow {
                doc_id: format!("d{i}"),
                sequence: i,
                key: json!(i),
                value: json!(i),
            })
            .collect();
        let mut p = plan(false);
        p.skip = 1;
        p.limit = Some(2);
        let store = StubStore;
        let out = execute(rows, &p, None, &store).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].key, json!(1));
        assert_eq!(out[1].key, json!(2));
    }

    #[test]
    fn post_filter_drops_non_matching_rows() {
        let rows = vec![
            QueryRow {
                doc_id: Some("a".into()),
                sequence: 1,
                key: json!("a"),
                value: json!(1),
                doc: None,
            },
            QueryRow {
                doc_id: Some("b".into()),
                sequence: 2,
                key: json!("b"),
                value: json!(2),
                doc: None,
            },
        ];
        let filtered = apply_post_filter(rows, Some(&|row: &QueryRow| row.value == json!(2)));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].doc_id.as_deref(), Some("b"));
    }
}
