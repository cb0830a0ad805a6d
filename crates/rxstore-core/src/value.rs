//! Dynamic payload values carried by actions
//!
//! Actions, linked operation results and async slices all carry a [`Value`].
//! It is serialized untagged, so a payload written as RON or JSON reads the
//! way it looks: `5`, `"ok"`, `[1, 2]`, `{"page": 2}`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An action payload, operation outcome or stored async result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(ValueMap),
}

/// String-keyed payload fields, kept in insertion order
pub type ValueMap = IndexMap<String, Value>;

macro_rules! accessor {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $out:ty, $bind:ident => $expr:expr) => {
        $(#[$doc])*
        pub fn $name(&self) -> Option<$out> {
            match self {
                Value::$variant($bind) => Some($expr),
                _ => None,
            }
        }
    };
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    accessor!(as_bool, Bool, bool, b => *b);
    accessor!(as_int, Int, i64, i => *i);
    accessor!(as_str, String, &str, s => s.as_str());
    accessor!(as_list, List, &[Value], items => items.as_slice());
    accessor!(as_map, Map, &ValueMap, fields => fields);

    /// Numeric view; integers widen to `f64`
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(f) => Some(f),
            Value::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    /// Field of a map payload
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)
    }

    /// Build a map payload from key/value pairs
    ///
    /// ```
    /// use rxstore_core::Value;
    ///
    /// let page = Value::map([("page", 2i64), ("size", 20)]);
    /// assert_eq!(page.get("size").and_then(Value::as_int), Some(20));
    /// ```
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

fn write_joined<T, I>(f: &mut fmt::Formatter<'_>, open: &str, close: &str, items: I) -> fmt::Result
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    f.write_str(open)?;
    for (n, item) in items.into_iter().enumerate() {
        if n > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{:?}", s),
            Value::List(items) => write_joined(f, "[", "]", items),
            Value::Map(fields) => write_joined(
                f,
                "{",
                "}",
                fields.iter().map(|(key, value)| format!("{}: {}", key, value)),
            ),
        }
    }
}

macro_rules! from_scalar {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v as $cast)
            }
        })*
    };
}

from_scalar! {
    i64 => Int as i64,
    i32 => Int as i64,
    u32 => Int as i64,
    f64 => Float as f64,
    f32 => Float as f64,
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<ValueMap> for Value {
    fn from(fields: ValueMap) -> Self {
        Value::Map(fields)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::from(()).is_null());
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7u32).as_int(), Some(7));
        assert_eq!(Value::from(7i32).as_float(), Some(7.0));
        assert_eq!(Value::from("ok").as_str(), Some("ok"));
        assert_eq!(Value::from(vec![1i64, 2]).as_list().map(<[Value]>::len), Some(2));
        assert_eq!(Value::Int(1).as_str(), None);
    }

    #[test]
    fn test_option_payloads() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("id")), Value::from("id"));
    }

    #[test]
    fn test_map_payload() {
        let v = Value::map([("after", 10i64), ("times", 2)]);
        assert_eq!(v.get("after"), Some(&Value::Int(10)));
        assert_eq!(v.get("missing"), None);
        assert_eq!(Value::Int(1).get("after"), None);
    }

    #[test]
    fn test_display() {
        let v = Value::map([
            ("name", Value::from("ada")),
            ("tags", Value::from(vec![1i64, 2])),
            ("gone", Value::Null),
        ]);
        assert_eq!(v.to_string(), r#"{name: "ada", tags: [1, 2], gone: null}"#);
    }

    #[test]
    fn test_untagged_ron() {
        let v: Value = ron::from_str(r#"{"page": 2, "query": "rust"}"#).unwrap();
        assert_eq!(v.get("page"), Some(&Value::Int(2)));
        assert_eq!(v.get("query").and_then(Value::as_str), Some("rust"));
    }
}
