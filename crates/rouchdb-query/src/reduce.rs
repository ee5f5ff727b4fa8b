//! The `Reducer`: grouping and reduction over an already key-sorted stream
//! of `(key, value)` pairs (`spec.md` §4.7).

use std::sync::Arc;

use serde_json::Value;

/// A reduce function: aggregates a batch of `(key, value)` pairs into one
/// value. `rereduce=true` means `values` are themselves prior reduce
/// outputs being combined further — built-ins handle both cases the way
/// CouchDB's `_count`/`_sum`/`_stats` do, even though the in-memory path
/// here never needs to chain more than one reduce call per group
/// (`spec.md` §4.7).
#[derive(Clone)]
pub enum ReduceFn {
    Count,
    Sum,
    Stats,
    Custom(Arc<dyn Fn(&[Value], &[Value], bool) -> Value + Send + Sync>),
}

impl std::fmt::Debug for ReduceFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReduceFn::Count => write!(f, "ReduceFn::Count"),
            ReduceFn::Sum => write!(f, "ReduceFn::Sum"),
            ReduceFn::Stats => write!(f, "ReduceFn::Stats"),
            ReduceFn::Custom(_) => write!(f, "ReduceFn::Custom(..)"),
        }
    }
}

fn as_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or(0.0)
}

impl ReduceFn {
    pub fn reduce(&self, keys: &[Value], values: &[Value], rereduce: bool) -> Value {
        match self {
            ReduceFn::Count => {
                if rereduce {
                    Value::from(values.iter().map(as_f64).sum::<f64>() as u64)
                } else {
                    Value::from(values.len() as u64)
                }
            }
            ReduceFn::Sum => {
                let _ = keys;
                let total: f64 = values.iter().map(as_f64).sum();
                serde_json::json!(total)
            }
            ReduceFn::Stats => {
                let nums: Vec<f64> = values.iter().map(as_f64).collect();
                let sum: f64 = nums.iter().sum();
                let count = nums.len() as u64;
                let min = nums.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = nums.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let sumsqr: f64 = nums.iter().map(|n| n * n).sum();
                serde_json::json!({
                    "sum": sum,
                    "count": count,
                    "min": if count == 0 { Value::Null } else { serde_json::json!(min) },
                    "max": if count == 0 { Value::Null } else { serde_json::json!(max) },
                    "sumsqr": sumsqr,
                })
            }
            ReduceFn::Custom(f) => f(keys, values, rereduce),
        }
    }
}

/// A reduced/grouped output row.
#[derive(Debug, Clone)]
pub struct ReducedRow {
    pub key: Value,
    pub value: Value,
}

/// Truncate `key` to `group_level` leading array elements when applicable
/// (`spec.md` §4.7: "Group key for a row").
fn group_key_for(key: &Value, group_level: Option<u32>) -> Value {
    match (key, group_level) {
        (Value::Array(items), Some(level)) if level > 0 && items.len() as u32 > level => {
            Value::Array(items[..level as usize].to_vec())
        }
        _ => key.clone(),
    }
}

/// Whether `a` and `b` belong to the same reduction group under
/// `group_level` (`spec.md` §4.7).
fn same_group(a: &Value, b: &Value, group_level: Option<u32>) -> bool {
    match group_level {
        None => a == b,
        Some(level) if level > 0 => match (a, b) {
            (Value::Array(xa), Value::Array(xb))
                if xa.len() as u32 >= level && xb.len() as u32 >= level =>
            {
                xa[..level as usize] == xb[..level as usize]
            }
            _ => a == b,
        },
        Some(_) => a == b, // level == 0: full value equality, per spec.md §4.7
    }
}

/// Reduce a key-sorted stream of `(key, value)` pairs.
///
/// - `group = false`: ignores `group_level`, emits a single row with
///   `key = null` (unless `pairs` is empty, in which case no row is
///   emitted).
/// - `group = true`: emits one row per contiguous run of same-group pairs.
///
/// `reduce_fn` must be present whenever a reduction actually needs to run;
/// callers that ask for `group = true` without a reduce function get one
/// row per group carrying the group's last value, matching a degenerate
/// "distinct keys" query rather than erroring (the planner already rejects
/// `reduce = true, group = false` without a reduce function).
pub fn reduce(
    pairs: &[(Value, Value)],
    reduce_fn: Option<&ReduceFn>,
    group: bool,
    group_level: Option<u32>,
) -> Vec<ReducedRow> {
    if !group {
        if pairs.is_empty() {
            return vec![];
        }
        let keys: Vec<Value> = pairs.iter().map(|(k, _)| k.clone()).collect();
        let values: Vec<Value> = pairs.iter().map(|(_, v)| v.clone()).collect();
        let value = match reduce_fn {
            Some(f) => f.reduce(&keys, &values, false),
            None => Value::Null,
        };
        return vec![ReducedRow {
            key: Value::Null,
            value,
        }];
    }

    let mut rows = Vec::new();
    let mut batch_keys: Vec<Value> = Vec::new();
    let mut batch_values: Vec<Value> = Vec::new();
    let mut current_group_key: Option<Value> = None;

    let flush = |rows: &mut Vec<ReducedRow>,
                 group_key: &Value,
                 keys: &mut Vec<Value>,
                 values: &mut Vec<Value>| {
        let emitted_key = group_key_for(group_key, group_level);
        let value = match reduce_fn {
            Some(f) => f.reduce(keys, values, false),
            None => values.last().cloned().unwrap_or(Value::Null),
        };
        rows.push(ReducedRow {
            key: emitted_key,
            value,
        });
        keys.clear();
        values.clear();
    };

    for (key, value) in pairs {
        match &current_group_key {
            Some(gk) if same_group(gk, key, group_level) => {
                batch_keys.push(key.clone());
                batch_values.push(value.clone());
            }
            Some(gk) => {
                flush(&mut rows, gk, &mut batch_keys, &mut batch_values);
                current_group_key = Some(key.clone());
                batch_keys.push(key.clone());
                batch_values.push(value.clone());
            }
            None => {
                current_group_key = Some(key.clone());
                batch_keys.push(key.clone());
                batch_values.push(value.clone());
            }
        }
    }

    if let Some(gk) = current_group_key {
        flush(&mut rows, &gk, &mut batch_keys, &mut batch_values);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_group_reduces_all_to_one_row() {
        let pairs = vec![
            (json!("a"), json!(1)),
            (json!("b"), json!(2)),
            (json!("c"), json!(3)),
        ];
        let rows = reduce(&pairs, Some(&ReduceFn::Sum), false, None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, Value::Null);
        assert_eq!(rows[0].value, json!(6.0));
    }

    #[test]
    fn no_group_empty_input_yields_no_rows() {
        assert!(reduce(&[], Some(&ReduceFn::Count), false, None).is_empty());
    }

    #[test]
    fn group_by_full_key() {
        let pairs = vec![
            (json!("eng"), json!(100)),
            (json!("eng"), json!(120)),
            (json!("sales"), json!(90)),
        ];
        let rows = reduce(&pairs, Some(&ReduceFn::Sum), true, None);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, json!("eng"));
        assert_eq!(rows[0].value, json!(220.0));
        assert_eq!(rows[1].key, json!("sales"));
        assert_eq!(rows[1].value, json!(90.0));
    }

    #[test]
    fn group_level_truncates_array_keys() {
        // Sorted order assumed: CA/ON, US/CA(x2), US/NY
        let pairs = vec![
            (json!(["CA", "ON", "TOR"]), json!(1)),
            (json!(["US", "CA", "SF"]), json!(1)),
            (json!(["US", "CA", "LA"]), json!(1)),
            (json!(["US", "NY", "NYC"]), json!(1)),
        ];
        let rows = reduce(&pairs, Some(&ReduceFn::Count), true, Some(2));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].key, json!(["CA", "ON"]));
        assert_eq!(rows[0].value, json!(1));
        assert_eq!(rows[1].key, json!(["US", "CA"]));
        assert_eq!(rows[1].value, json!(2));
        assert_eq!(rows[2].key, json!(["US", "NY"]));
        assert_eq!(rows[2].value, json!(1));
    }

    #[test]
    fn count_builtin_counts_rows_not_values() {
        let pairs = vec![(json!(1), json!("x")), (json!(1), json!("y"))];
        let rows = reduce(&pairs, Some(&ReduceFn::Count), false, None);
        assert_eq!(rows[0].value, json!(2));
    }

    #[test]
    fn stats_builtin_reports_aggregate_fields() {
        let pairs = vec![(json!("k"), json!(2)), (json!("k"), json!(4))];
        let rows = reduce(&pairs, Some(&ReduceFn::Stats), false, None);
        let v = &rows[0].value;
        assert_eq!(v["sum"], json!(6.0));
        assert_eq!(v["count"], json!(2));
        assert_eq!(v["min"], json!(2.0));
        assert_eq!(v["max"], json!(4.0));
    }
}
