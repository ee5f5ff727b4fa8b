//! `QueryPlanner`: turns `QueryOptions` into a range-scan plan over a view's
//! persisted index (`spec.md` §4.5). The planner never touches storage; it
//! only decides what the scan should look like.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::codec::{prefix_match_upper_bound, Collation};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("bad request: {0}")]
    BadRequest(String),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// A row produced by the query executor, after any `include_docs` join.
#[derive(Debug, Clone)]
pub struct QueryRow {
    pub doc_id: Option<String>,
    pub sequence: u64,
    pub key: Value,
    pub value: Value,
    pub doc: Option<Value>,
}

/// A predicate evaluated after a `QueryRow` is constructed; non-matching
/// rows are dropped (`spec.md` §4.5's `postFilter`).
pub type PostFilter = Arc<dyn Fn(&QueryRow) -> bool + Send + Sync>;

/// The caller-facing knobs for a view query (`spec.md` §4.5's options
/// table).
#[derive(Clone, Default)]
pub struct QueryOptions {
    pub keys: Option<Vec<Value>>,
    pub start_key: Option<Value>,
    pub end_key: Option<Value>,
    pub start_key_doc_id: Option<String>,
    pub end_key_doc_id: Option<String>,
    pub inclusive_end: bool,
    pub descending: bool,
    pub limit: Option<u64>,
    pub skip: u64,
    pub prefix_match_level: u32,
    pub group: bool,
    pub group_level: Option<u32>,
    pub reduce: bool,
    pub include_docs: bool,
    pub post_filter: Option<PostFilter>,
}

impl std::fmt::Debug for QueryOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("keys", &self.keys)
            .field("start_key", &self.start_key)
            .field("end_key", &self.end_key)
            .field("start_key_doc_id", &self.start_key_doc_id)
            .field("end_key_doc_id", &self.end_key_doc_id)
            .field("inclusive_end", &self.inclusive_end)
            .field("descending", &self.descending)
            .field("limit", &self.limit)
            .field("skip", &self.skip)
            .field("prefix_match_level", &self.prefix_match_level)
            .field("group", &self.group)
            .field("group_level", &self.group_level)
            .field("reduce", &self.reduce)
            .field("include_docs", &self.include_docs)
            .field("post_filter", &self.post_filter.is_some())
            .finish()
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self {
            inclusive_end: true,
            ..Default::default()
        }
    }
}

/// One side of a range scan.
#[derive(Debug, Clone)]
pub struct ScanBound {
    pub value: Value,
    pub inclusive: bool,
    /// Tie-breaker document id for rows whose key equals `value`.
    pub doc_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ScanMode {
    Range {
        lower: Option<ScanBound>,
        upper: Option<ScanBound>,
    },
    /// An explicit key set; bounds are ignored, rows are looked up for each
    /// key in the caller's order.
    Keys(Vec<Value>),
}

/// The planner's output: what to scan and how to post-process it.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub mode: ScanMode,
    pub descending: bool,
    pub collation: Collation,
    pub limit: Option<u64>,
    pub skip: u64,
    pub group: bool,
    pub group_level: Option<u32>,
    pub reduce: bool,
    pub include_docs: bool,
}

/// Translate `options` into a [`QueryPlan`] for the given collation.
///
/// `has_reduce_fn` tells the planner whether the view was registered with a
/// reduce function, for the one invalid combination `spec.md` calls out:
/// `reduce=true` with no reduce function and `group=false`.
pub fn plan(options: &QueryOptions, collation: Collation, has_reduce_fn: bool) -> Result<QueryPlan> {
    if options.reduce && !has_reduce_fn && !options.group {
        return Err(QueryError::BadRequest(
            "reduce=true requires a reduce function or group=true".into(),
        ));
    }

    let mode = if let Some(keys) = &options.keys {
        ScanMode::Keys(keys.clone())
    } else {
        let end_key = options.end_key.as_ref().map(|k| {
            if options.prefix_match_level >= 1 {
                prefix_match_upper_bound(k, options.prefix_match_level)
            } else {
                k.clone()
            }
        });

        let start_bound = options.start_key.as_ref().map(|v| ScanBound {
            value: v.clone(),
            inclusive: true,
            doc_id: options.start_key_doc_id.clone(),
        });
        let end_bound = end_key.map(|v| ScanBound {
            value: v,
            inclusive: options.inclusive_end,
            doc_id: options.end_key_doc_id.clone(),
        });

        if options.descending {
            // Swap: the new lower bound inherits the old upper's
            // inclusivity; the new upper bound (the old start) is always
            // inclusive (spec.md §4.5).
            let lower = end_bound.map(|b| ScanBound {
                inclusive: b.inclusive,
                ..b
            });
            let upper = start_bound.map(|b| ScanBound {
                inclusive: true,
                ..b
            });
            ScanMode::Range { lower, upper }
        } else {
            ScanMode::Range {
                lower: start_bound,
                upper: end_bound,
            }
        }
    };

    Ok(QueryPlan {
        mode,
        descending: options.descending,
        collation,
        limit: options.limit,
        skip: options.skip,
        group: options.group,
        group_level: options.group_level,
        reduce: options.reduce || options.group,
        include_docs: options.include_docs,
    })
}
