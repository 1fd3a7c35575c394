//! Change-Detection Equality
//!
//! The policy that decides whether a write is redundant. It is deliberately
//! looser than structural equality: replacing a value wholesale with a
//! structurally similar one must not re-run every downstream computation.
//!
//! Two values are equivalent when any of the following holds:
//!
//! 1. they are the same scalar or the same handle;
//! 2. both are blank (`Null` and the empty string coalesce);
//! 3. both are objects whose `"id"` entries are present, non-null, and
//!    themselves equivalent;
//! 4. both are arrays of equal length with pairwise equivalent elements.
//!
//! Numbers compare numerically across the `Int`/`Float` variants.

use super::value::Value;

/// The default equality policy for wrapped graphs and property signals.
pub fn equivalent(a: &Value, b: &Value) -> bool {
    if a.same_identity(b) {
        return true;
    }
    if is_blank(a) && is_blank(b) {
        return true;
    }
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            // as_f64 is Some for both variants
            a.as_f64() == b.as_f64()
        }
        (Value::Object(x), Value::Object(y)) => match (x.raw_get("id"), y.raw_get("id")) {
            (Some(id_a), Some(id_b)) if !id_a.is_null() && !id_b.is_null() => {
                equivalent(&id_a, &id_b)
            }
            _ => false,
        },
        (Value::Array(x), Value::Array(y)) => {
            let xs = x.raw_items();
            let ys = y.raw_items();
            xs.len() == ys.len() && xs.iter().zip(ys.iter()).all(|(p, q)| equivalent(p, q))
        }
        _ => false,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Str(s) => s.is_empty(),
        _ => false,
    }
}
