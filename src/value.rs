//! Tri-state attribute values.
//!
//! Every attribute in configuration, plan or state is either null, unknown
//! (not yet computed, only possible during plan) or a known value. JSON state
//! carries unknown as the sentinel string [`UNKNOWN_VALUE`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Marker used in JSON documents for values that are unknown until apply.
pub const UNKNOWN_VALUE: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// A value that may be null, unknown, or known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttrValue<T> {
    /// Explicitly absent.
    #[default]
    Null,
    /// Will be known after apply.
    Unknown,
    /// A concrete value.
    Known(T),
}

impl<T> AttrValue<T> {
    /// Wrap a known value.
    pub fn known(value: T) -> Self {
        Self::Known(value)
    }

    /// `None` becomes null, `Some` becomes known.
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }

    /// Returns `true` for [`AttrValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` for [`AttrValue::Unknown`].
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns `true` for [`AttrValue::Known`].
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Borrow the known value, if any.
    pub fn as_known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Mutably borrow the known value, if any.
    pub fn as_known_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Take the known value, if any.
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Borrow as `AttrValue<&T>`.
    pub fn as_ref(&self) -> AttrValue<&T> {
        match self {
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
            Self::Known(v) => AttrValue::Known(v),
        }
    }

    /// Transform the known value, keeping null and unknown as they are.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> AttrValue<U> {
        match self {
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
            Self::Known(v) => AttrValue::Known(f(v)),
        }
    }
}

impl<T: Clone> AttrValue<T> {
    /// The known value, or `default` when null or unknown.
    pub fn known_or(&self, default: T) -> T {
        self.as_known().cloned().unwrap_or(default)
    }
}

impl<T: Default + Clone> AttrValue<T> {
    /// The known value, or `T::default()` when null or unknown.
    pub fn value_or_default(&self) -> T {
        self.as_known().cloned().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for AttrValue<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_option(value)
    }
}

impl<T: Serialize> Serialize for AttrValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => serializer.serialize_str(UNKNOWN_VALUE),
            Self::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for AttrValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match raw {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::String(ref s) if s == UNKNOWN_VALUE => Ok(Self::Unknown),
            other => serde_json::from_value(other)
                .map(Self::Known)
                .map_err(serde::de::Error::custom),
        }
    }
}

/// Returns `true` when a raw JSON value is the unknown marker.
pub fn is_unknown_json(value: &serde_json::Value) -> bool {
    value.as_str() == Some(UNKNOWN_VALUE)
}

/// The JSON form of an unknown value.
pub fn unknown_json() -> serde_json::Value {
    serde_json::Value::String(UNKNOWN_VALUE.to_string())
}

/// Empty strings become null.
pub fn string_value_or_null(value: impl Into<String>) -> AttrValue<String> {
    let value = value.into();
    if value.is_empty() {
        AttrValue::Null
    } else {
        AttrValue::Known(value)
    }
}

/// Empty maps become null.
pub fn map_value_or_null<V>(map: BTreeMap<String, V>) -> AttrValue<BTreeMap<String, V>> {
    if map.is_empty() {
        AttrValue::Null
    } else {
        AttrValue::Known(map)
    }
}

/// Empty collections become null.
pub fn vec_value_or_null<V>(items: Vec<V>) -> AttrValue<Vec<V>> {
    if items.is_empty() {
        AttrValue::Null
    } else {
        AttrValue::Known(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: AttrValue<String>,
        #[serde(default)]
        count: AttrValue<i64>,
    }

    #[test]
    fn test_deserialize_states() {
        let s: Sample = serde_json::from_value(json!({
            "name": UNKNOWN_VALUE,
            "count": 3
        }))
        .unwrap();
        assert!(s.name.is_unknown());
        assert_eq!(s.count, AttrValue::Known(3));

        let s: Sample = serde_json::from_value(json!({"name": null})).unwrap();
        assert!(s.name.is_null());
        assert!(s.count.is_null());
    }

    #[test]
    fn test_serialize_states() {
        let s = Sample {
            name: AttrValue::Unknown,
            count: AttrValue::Null,
        };
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({"name": UNKNOWN_VALUE, "count": null})
        );
    }

    #[test]
    fn test_unknown_marker_for_non_string_type() {
        let v: AttrValue<i64> = serde_json::from_value(json!(UNKNOWN_VALUE)).unwrap();
        assert!(v.is_unknown());
    }

    #[test]
    fn test_wrong_type_is_error() {
        let v: Result<AttrValue<i64>, _> = serde_json::from_value(json!("seven"));
        assert!(v.is_err());
    }

    #[test]
    fn test_helpers() {
        assert!(string_value_or_null("").is_null());
        assert_eq!(string_value_or_null("x"), AttrValue::Known("x".to_string()));
        assert!(map_value_or_null::<i64>(BTreeMap::new()).is_null());
        assert!(vec_value_or_null::<i64>(vec![]).is_null());
        assert_eq!(AttrValue::Known(2).map(|v| v * 2), AttrValue::Known(4));
        assert_eq!(AttrValue::<i64>::Unknown.known_or(9), 9);
        assert!(is_unknown_json(&unknown_json()));
    }
}
