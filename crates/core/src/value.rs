//! Value type definitions for Tether.
//!
//! This module defines the `Value` enum which carries query result payloads
//! and variable bindings across the data-service boundary.

use std::fmt;

/// A JSON-shaped value as produced by a data service.
#[derive(Clone, Debug)]
pub enum Value {
    /// JSON null
    Null,
    /// JSON boolean
    Bool(bool),
    /// JSON number (stored as f64)
    Number(f64),
    /// JSON string
    String(String),
    /// JSON array
    Array(Vec<Value>),
    /// JSON object with sorted keys for O(log n) lookup
    Object(Object),
}

/// Named variable bindings for a query.
pub type Variables = Object;

/// A JSON object with keys sorted for efficient lookup.
///
/// Keeping the entries sorted gives a canonical order, so two objects with the
/// same bindings compare and print identically regardless of insertion order.
#[derive(Clone, Debug, Default)]
pub struct Object {
    /// Entries stored sorted by key for binary search
    entries: Vec<(String, Value)>,
}

impl Object {
    /// Creates a new empty Object.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Returns true if the object is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Gets a value by key using binary search. O(log n)
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// Inserts a key-value pair, maintaining sorted order.
    pub fn insert(&mut self, key: String, value: Value) {
        match self.entries.binary_search_by(|(k, _)| k.as_str().cmp(&key)) {
            Ok(idx) => {
                self.entries[idx].1 = value;
            }
            Err(idx) => {
                self.entries.insert(idx, (key, value));
            }
        }
    }

    /// Overlays every entry of `other` onto this object.
    ///
    /// Keys present in both take the value from `other`.
    pub fn merge(&mut self, other: &Object) {
        for (key, value) in other.iter() {
            self.insert(key.to_string(), value.clone());
        }
    }

    /// Returns an iterator over key-value pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Object {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut obj = Object::new();
        for (k, v) in iter {
            obj.insert(k.into(), v.into());
        }
        obj
    }
}

impl Value {
    /// Returns an empty object, the "no data yet" payload of a stream.
    #[inline]
    pub fn empty_object() -> Self {
        Value::Object(Object::new())
    }

    /// Returns true if this is an object without any entries.
    #[inline]
    pub fn is_empty_object(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_empty())
    }

    /// Returns the number as i64 if this is a Number and it's an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => {
                let i = *n as i64;
                if (i as f64) == *n {
                    Some(i)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns a reference to the string if this is a String.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns a reference to the array if this is an Array.
    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Gets a value by key if this is an Object.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Object(obj) => obj.get(key),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// Compact JSON rendering. Object keys come out sorted, which makes the output
/// usable as a canonical cache key. Non-finite numbers render as `null`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if !n.is_finite() => f.write_str("null"),
            Value::Number(n) => match self.as_i64() {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
            Value::String(s) => write_json_string(f, s),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Object(obj) => write!(f, "{}", obj),
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write_json_string(f, key)?;
            write!(f, ":{}", value)?;
        }
        f.write_str("}")
    }
}

fn write_json_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    let mut start = 0;
    for (idx, c) in s.char_indices() {
        let escaped = match c {
            '"' => "\\\"",
            '\\' => "\\\\",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            c if c < ' ' => "",
            _ => continue,
        };
        f.write_str(&s[start..idx])?;
        if escaped.is_empty() {
            write!(f, "\\u{:04x}", c as u32)?;
        } else {
            f.write_str(escaped)?;
        }
        start = idx + c.len_utf8();
    }
    f.write_str(&s[start..])?;
    f.write_str("\"")
}

// From implementations for convenient construction
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Number(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_insert_and_get() {
        let mut obj = Object::new();
        obj.insert("name".into(), Value::String("Tatooine".into()));
        obj.insert("id".into(), Value::Number(1.0));

        assert_eq!(obj.get("name"), Some(&Value::String("Tatooine".into())));
        assert_eq!(obj.get("id"), Some(&Value::Number(1.0)));
        assert_eq!(obj.get("missing"), None);
    }

    #[test]
    fn test_object_sorted_keys() {
        let obj: Object = [("z", 1), ("a", 2), ("m", 3)].into_iter().collect();

        let keys: Vec<_> = obj.iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_object_equality_ignores_insertion_order() {
        let a: Object = [("first", 1), ("second", 2)].into_iter().collect();
        let b: Object = [("second", 2), ("first", 1)].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_object_merge_overrides() {
        let mut base: Object = [("cursor", 0), ("limit", 10)].into_iter().collect();
        let more: Object = [("cursor", 10)].into_iter().collect();
        base.merge(&more);

        assert_eq!(base.get("cursor").and_then(Value::as_i64), Some(10));
        assert_eq!(base.get("limit").and_then(Value::as_i64), Some(10));
    }

    #[test]
    fn test_empty_object() {
        assert!(Value::empty_object().is_empty_object());
        assert!(!Value::Null.is_empty_object());
        assert!(!Value::Array(vec![]).is_empty_object());

        let filled: Object = [("ship", "CR90 corvette")].into_iter().collect();
        assert!(!Value::Object(filled).is_empty_object());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Number(42.0).as_i64(), Some(42));
        assert_eq!(Value::Number(4.2).as_i64(), None);
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
    }

    #[test]
    fn test_display_is_compact_json() {
        let mut obj = Object::new();
        obj.insert("id".into(), Value::from("Film:4"));
        obj.insert("episode".into(), Value::from(4));
        obj.insert("tags".into(), Value::Array(vec![Value::Null, Value::Bool(false)]));

        assert_eq!(
            Value::Object(obj).to_string(),
            r#"{"episode":4,"id":"Film:4","tags":[null,false]}"#
        );
    }

    #[test]
    fn test_display_escapes_strings_as_json() {
        let value = Value::from("say \"hi\"\\\n\té\u{1}");
        assert_eq!(value.to_string(), r#""say \"hi\"\\\n\té\u0001""#);

        let key: Object = [("a\"b", 1)].into_iter().collect();
        assert_eq!(key.to_string(), r#"{"a\"b":1}"#);

        assert_eq!(Value::Number(f64::NAN).to_string(), "null");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "null");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_value_from_impls() {
        let v: Value = true.into();
        assert_eq!(v, Value::Bool(true));

        let v: Value = 42i32.into();
        assert_eq!(v, Value::Number(42.0));

        let v: Value = None::<i32>.into();
        assert_eq!(v, Value::Null);
    }
}
