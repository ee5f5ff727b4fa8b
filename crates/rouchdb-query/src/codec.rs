//! `KeyCodec`: canonical JSON key serialization and the three collations a
//! view can use for its storage and scan order (`spec.md` §4.1).

use serde_json::Value;
use std::cmp::Ordering;

/// The total order a view's storage and scans use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collation {
    /// CouchDB-compatible JSON collation: type-precedence, code-point string
    /// order, element-wise array/object comparison.
    #[default]
    Unicode,
    /// Same structure as `Unicode`, but strings compare by raw byte order.
    Ascii,
    /// Compare the serialized JSON bytes directly.
    Raw,
}

/// Type precedence used by both `Unicode` and `Ascii` collation:
/// `null < false < true < numbers < strings < arrays < objects`.
fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Canonicalize a JSON value to a stable byte string. Object key order is
/// preserved exactly as given (`serde_json`'s `preserve_order` feature keeps
/// `Map` insertion-ordered), matching `spec.md`'s requirement that emitted
/// key bytes be reproducible across runs.
pub fn serialize(value: &Value) -> Vec<u8> {
    // `serde_json::to_vec` already walks `Value` deterministically and
    // preserves object insertion order under `preserve_order`; no extra
    // canonicalization pass is needed.
    serde_json::to_vec(value).expect("serde_json::Value always serializes")
}

/// Compare two JSON values under the given collation. A total order; see
/// `spec.md` §4.1 and §8 invariant 3.
pub fn compare(a: &Value, b: &Value, collation: Collation) -> Ordering {
    match collation {
        Collation::Raw => serialize(a).cmp(&serialize(b)),
        Collation::Unicode => compare_typed(a, b, StringOrder::CodePoint),
        Collation::Ascii => compare_typed(a, b, StringOrder::Byte),
    }
}

#[derive(Clone, Copy)]
enum StringOrder {
    CodePoint,
    Byte,
}

fn compare_strings(a: &str, b: &str, order: StringOrder) -> Ordering {
    match order {
        // Lexicographic byte comparison of valid UTF-8 agrees with
        // code-point comparison, but we walk `chars()` explicitly here to
        // keep the two collations' intent visibly distinct in the code.
        StringOrder::CodePoint => a.chars().cmp(b.chars()),
        StringOrder::Byte => a.as_bytes().cmp(b.as_bytes()),
    }
}

fn compare_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Ordering {
    let af = a.as_f64().unwrap_or(f64::NAN);
    let bf = b.as_f64().unwrap_or(f64::NAN);
    af.partial_cmp(&bf).unwrap_or(Ordering::Equal)
}

fn compare_typed(a: &Value, b: &Value, order: StringOrder) -> Ordering {
    let ra = type_rank(a);
    let rb = type_rank(b);
    if ra != rb {
        return ra.cmp(&rb);
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => compare_strings(x, y, order),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                let c = compare_typed(xi, yi, order);
                if c != Ordering::Equal {
                    return c;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            let xi = x.iter();
            let yi = y.iter();
            for ((xk, xv), (yk, yv)) in xi.zip(yi) {
                let kc = compare_strings(xk, yk, order);
                if kc != Ordering::Equal {
                    return kc;
                }
                let vc = compare_typed(xv, yv, order);
                if vc != Ordering::Equal {
                    return vc;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => unreachable!("type_rank partitions all Value variants"),
    }
}

/// The sentinel object CouchDB's prefix-match extension uses: it sorts
/// above every non-object value under `type_rank`, and (being the empty
/// object) below every non-empty object.
fn sentinel_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// Expand `key` into the supremum of all keys sharing its `level`-deep
/// prefix, per `spec.md` §4.1's prefix-match extension. `level` must be
/// >= 1; lower levels are a caller error (the planner validates this).
pub fn prefix_match_upper_bound(key: &Value, level: u32) -> Value {
    if level == 0 {
        return key.clone();
    }
    match key {
        Value::String(s) => {
            let mut s = s.clone();
            s.push('\u{ffff}');
            Value::String(s)
        }
        Value::Array(items) => {
            if items.is_empty() {
                return key.clone();
            }
            let idx = ((level as usize) - 1).min(items.len() - 1);
            let mut items = items.clone();
            items[idx] = if level == 1 {
                sentinel_object()
            } else {
                prefix_match_upper_bound(&items[idx], level - 1)
            };
            // Anything after the replaced element is irrelevant to the
            // supremum (the sentinel already sorts above it), but we keep
            // the array the same length: CouchDB's implementation leaves
            // later elements untouched and they never take part in the
            // comparison because the replaced element already decides it.
            Value::Array(items)
        }
        other => other.clone(),
    }
}
