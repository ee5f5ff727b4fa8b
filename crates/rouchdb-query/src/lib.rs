//! JSON-order collation, range-query planning, row execution, and
//! group/reduce aggregation for RouchDB views.

pub mod codec;
pub mod executor;
pub mod plan;
pub mod reduce;

pub use codec::{compare, prefix_match_upper_bound, serialize, Collation};
pub use executor::{apply_post_filter, execute, IndexScanRow};
pub use plan::{plan as plan_query, PostFilter, QueryError, QueryOptions, QueryPlan, QueryRow, ScanBound, ScanMode};
pub use reduce::{reduce, ReduceFn, ReducedRow};
