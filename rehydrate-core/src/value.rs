//! Property values carried by mutation records
//!
//! [`Value`] is a closed set of variants. JSON `null` has no counterpart, so a
//! persisted log containing one is rejected when it is decoded.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// A property value stored on a UI node
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// UTF-8 text
    String(String),

    /// IEEE-754 double; must be finite to be persisted
    Number(f64),

    /// Boolean flag
    Bool(bool),

    /// Ordered list of values
    List(Vec<Value>),

    /// String-keyed map of values
    Object(BTreeMap<String, Value>),
}

impl Value {
    /// Short name of the variant, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::List(_) => "list",
            Value::Object(_) => "object",
        }
    }

    /// Borrow the inner string, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Inner number, if this is a `Number`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Inner flag, if this is a `Bool`
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether the value can be written to the JSON wire format.
    ///
    /// Only non-finite numbers (at any depth) fail this check.
    pub fn is_persistable(&self) -> bool {
        match self {
            Value::String(_) | Value::Bool(_) => true,
            Value::Number(n) => n.is_finite(),
            Value::List(items) => items.iter().all(Value::is_persistable),
            Value::Object(map) => map.values().all(Value::is_persistable),
        }
    }

    /// Convert from a JSON value, rejecting `null` and non-finite numbers.
    ///
    /// The error string names the JSON path of the offending element.
    pub fn from_json(json: serde_json::Value) -> std::result::Result<Self, String> {
        Self::from_json_at(json, "$")
    }

    fn from_json_at(json: serde_json::Value, path: &str) -> std::result::Result<Self, String> {
        match json {
            serde_json::Value::Null => Err(format!("null is not a valid value at {path}")),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => n
                .as_f64()
                .filter(|f| f.is_finite())
                .map(Value::Number)
                .ok_or_else(|| format!("number {n} is not representable at {path}")),
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| Self::from_json_at(item, &format!("{path}[{i}]")))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Value::List),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| {
                    let child = format!("{path}.{k}");
                    Self::from_json_at(v, &child).map(|v| (k, v))
                })
                .collect::<std::result::Result<BTreeMap<_, _>, _>>()
                .map(Value::Object),
        }
    }

    /// Convert to a JSON value. Integral numbers become JSON integers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => number_to_json(*n),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

/// Negative zero keeps its float form so the sign survives a round trip.
fn is_integral(n: f64) -> bool {
    n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 && !(n == 0.0 && n.is_sign_negative())
}

fn number_to_json(n: f64) -> serde_json::Value {
    if is_integral(n) {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            // Non-finite numbers have no JSON form; the serializer rejects them first.
            .unwrap_or(serde_json::Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::{Error, SerializeMap, SerializeSeq};

        match self {
            Value::String(s) => serializer.serialize_str(s),
            Value::Number(n) if !n.is_finite() => {
                Err(S::Error::custom(format!("cannot serialize non-finite number {n}")))
            }
            Value::Number(n) if is_integral(*n) => serializer.serialize_i64(*n as i64),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let json = serde_json::Value::deserialize(deserializer)?;
        Value::from_json(json).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integral_numbers_serialize_as_integers() {
        assert_eq!(serde_json::to_string(&Value::Number(3.0)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Value::Number(2.5)).unwrap(), "2.5");
    }

    #[test]
    fn test_negative_zero_keeps_its_sign() {
        let encoded = serde_json::to_string(&Value::Number(-0.0)).unwrap();
        assert_eq!(encoded, "-0.0");
        assert_eq!(serde_json::to_string(&Value::Number(0.0)).unwrap(), "0");

        let Value::Number(decoded) = serde_json::from_str::<Value>(&encoded).unwrap() else {
            panic!("expected number");
        };
        assert!(decoded == 0.0 && decoded.is_sign_negative());
        assert_eq!(Value::Number(-0.0).to_json(), serde_json::json!(-0.0));
    }

    #[test]
    fn test_null_is_rejected_with_path() {
        let err = Value::from_json(json!({"items": [1, null]})).unwrap_err();
        assert!(err.contains("$.items[1]"), "unexpected message: {err}");
    }

    #[test]
    fn test_nested_object_decodes() {
        let value: Value = serde_json::from_value(json!({
            "label": "Save",
            "enabled": true,
            "tags": ["primary", 2]
        }))
        .unwrap();

        let Value::Object(map) = value else {
            panic!("expected object");
        };
        assert_eq!(map["label"], Value::from("Save"));
        assert_eq!(map["enabled"], Value::Bool(true));
        assert_eq!(
            map["tags"],
            Value::List(vec![Value::from("primary"), Value::Number(2.0)])
        );
    }

    #[test]
    fn test_non_finite_number_fails_to_serialize() {
        assert!(serde_json::to_string(&Value::Number(f64::NAN)).is_err());
        let nested = Value::List(vec![Value::Number(1.0), Value::Number(f64::INFINITY)]);
        assert!(!nested.is_persistable());
        assert!(Value::from("ok").is_persistable());
    }
}
