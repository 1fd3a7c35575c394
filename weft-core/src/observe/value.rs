//! Dynamic Value Model
//!
//! [`Value`] is the engine's rendition of an arbitrary nested data graph:
//! scalars plus shared [`Object`] and [`Array`] handles. Cloning a value
//! clones the handle, not the subtree, so two clones of a composite always
//! observe the same underlying state.
//!
//! Plain graphs are built from Rust scalars, vectors, or `serde_json`
//! values; [`observable`] turns a composite into a tracked one in place.
//! Wrapping is idempotent and shallow at wrap time: nested composites
//! become tracked lazily, on their first access through a tracked parent.

use std::fmt;
use std::sync::Arc;

use super::array::Array;
use super::equality::equivalent;
use super::object::Object;

/// Callback invoked after any mutation in a wrapped value's subtree.
///
/// Child wrappers receive their parent's version bump as their hook, which
/// is how deep mutations surface on every ancestor's version counter.
pub type OnChange = Arc<dyn Fn() + Send + Sync>;

/// Equality policy for wrapped graphs: a write the policy accepts as equal
/// is a complete no-op.
pub type Equality = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// A dynamic value: scalar, object, or array.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(Object),
    Array(Array),
}

impl Value {
    /// Whether this is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric view of the value; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Whether two values are the same scalar or the same handle.
    pub(crate) fn same_identity(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Untracked snapshot of the value as plain JSON.
    ///
    /// Cyclic graphs are the caller's responsibility.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Value::from(*n),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Object(o) => serde_json::Value::Object(
                o.raw_entries()
                    .into_iter()
                    .map(|(k, v)| (k, v.to_json()))
                    .collect(),
            ),
            Value::Array(a) => serde_json::Value::Array(
                a.raw_items().into_iter().map(|v| v.to_json()).collect(),
            ),
        }
    }
}

/// Structural identity: scalars by value (strict on variant), composites by
/// handle. The engine's change-detection policy is [`equivalent`], not this.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_identity(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(o) => write!(f, "{:?}", o.raw_entries()),
            Value::Array(a) => write!(f, "{:?}", a.raw_items()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Value::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(Array::from_values(items.into_iter().map(Into::into).collect()))
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .unwrap_or_else(|| Value::Float(n.as_f64().unwrap_or(0.0))),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => Value::Array(Array::from_values(
                items.into_iter().map(Value::from).collect(),
            )),
            serde_json::Value::Object(map) => Value::Object(Object::from_entries(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

impl serde::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(serde_json::Value::deserialize(deserializer)?.into())
    }
}

/// Wrap a value for tracking with the default equality policy.
///
/// Primitives pass through unchanged; composites are wrapped in place, so
/// the returned value behaves like the input for all read/write purposes.
/// Wrapping an already-wrapped value returns it unchanged.
pub fn observable(value: impl Into<Value>) -> Value {
    observable_with(value, None, None)
}

/// Wrap a value for tracking, with an optional change callback and equality
/// policy.
///
/// `on_change` fires after every mutation anywhere in the wrapped subtree.
/// `equals` replaces the default policy ([`equivalent`]) for the whole
/// subtree.
pub fn observable_with(
    value: impl Into<Value>,
    on_change: Option<OnChange>,
    equals: Option<Equality>,
) -> Value {
    let value = value.into();
    match &value {
        Value::Object(object) => object.ensure_wrapped(on_change, equals),
        Value::Array(array) => array.ensure_wrapped(on_change, equals),
        _ => {}
    }
    value
}

/// Read the current version counter of a wrapped value.
///
/// Registers a dependency on the version signal when called inside a
/// computation. Unwrapped values report 0.
pub fn version(value: &Value) -> u64 {
    match value {
        Value::Object(o) => o.version(),
        Value::Array(a) => a.version(),
        _ => 0,
    }
}

/// Whether the value is a wrapped composite. Never registers a dependency.
pub fn is_wrapped(value: &Value) -> bool {
    match value {
        Value::Object(o) => o.is_wrapped(),
        Value::Array(a) => a.is_wrapped(),
        _ => false,
    }
}

/// Propagate wrapping to a child value read or written through a wrapped
/// parent: composites inherit the parent's equality and get the parent's
/// version bump as their hook.
pub(crate) fn wrap_child(value: &Value, hook: OnChange, equals: Equality) {
    match value {
        Value::Object(o) => o.ensure_wrapped(Some(hook), Some(equals)),
        Value::Array(a) => a.ensure_wrapped(Some(hook), Some(equals)),
        _ => {}
    }
}

/// The default change-detection policy as an [`Equality`] handle.
pub(crate) fn default_equality() -> Equality {
    Arc::new(equivalent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_pass_through_unwrapped() {
        let v = observable(42i64);
        assert_eq!(v.as_i64(), Some(42));
        assert!(!is_wrapped(&v));
        assert_eq!(version(&v), 0);

        let s = observable("hello");
        assert_eq!(s.as_str(), Some("hello"));
        assert!(!is_wrapped(&s));
    }

    #[test]
    fn wrapping_is_idempotent() {
        let v = observable(Value::from(serde_json::json!({"a": 1})));
        let object = v.as_object().expect("object value").clone();

        let again = observable(v.clone());
        assert!(again.as_object().expect("object value").ptr_eq(&object));
        assert!(is_wrapped(&again));
    }

    #[test]
    fn json_round_trip() {
        let source = serde_json::json!({
            "name": "weft",
            "count": 3,
            "ratio": 0.5,
            "tags": ["a", "b"],
            "nested": {"ok": true, "missing": null}
        });
        let value = Value::from(source.clone());
        assert_eq!(value.to_json(), source);
    }

    #[test]
    fn serde_impls_bridge_through_json() {
        let value: Value =
            serde_json::from_str(r#"{"x": 1, "y": [2, 3]}"#).expect("valid json");
        let text = serde_json::to_string(&value).expect("serializable");
        let back: serde_json::Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(back, serde_json::json!({"x": 1, "y": [2, 3]}));
    }

    #[test]
    fn clones_share_the_composite() {
        let v = observable(Value::from(serde_json::json!({"a": 1})));
        let clone = v.clone();

        v.as_object().expect("object").set("a", 2);
        assert_eq!(clone.as_object().expect("object").get("a").as_i64(), Some(2));
    }
}
