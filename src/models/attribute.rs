//! Region attribute values and records.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Attributes gathered for one point, keyed by `"{prefix}_{attribute}"`.
///
/// Empty means no region contained the point.
pub type RegionAttributes = BTreeMap<String, AttributeValue>;

/// A scalar attribute value carried by a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Convert a GeoJSON property value. Arrays and objects are kept as
    /// their compact JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => AttributeValue::Integer(i),
                None => n
                    .as_f64()
                    .map(AttributeValue::Float)
                    .unwrap_or_else(|| AttributeValue::Text(n.to_string())),
            },
            Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    /// Renders the value as a table cell; null renders as an empty string.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => Ok(()),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Integer(i) => write!(f, "{}", i),
            AttributeValue::Float(x) => write!(f, "{}", x),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// Attributes of one region, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeRecord {
    entries: Vec<(String, AttributeValue)>,
}

impl AttributeRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute. An existing name keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: AttributeValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for AttributeRecord {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        let mut record = AttributeRecord::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(AttributeValue::from_json(&json!(null)), AttributeValue::Null);
        assert_eq!(AttributeValue::from_json(&json!(7)), AttributeValue::Integer(7));
        assert_eq!(AttributeValue::from_json(&json!(2.5)), AttributeValue::Float(2.5));
        assert_eq!(AttributeValue::from_json(&json!("7")), AttributeValue::from("7"));
        assert_eq!(AttributeValue::from_json(&json!(true)), AttributeValue::Bool(true));
        assert_eq!(
            AttributeValue::from_json(&json!([1, 2])),
            AttributeValue::from("[1,2]")
        );
    }

    #[test]
    fn test_cell_rendering() {
        assert_eq!(AttributeValue::Null.to_string(), "");
        assert_eq!(AttributeValue::Float(3.0).to_string(), "3");
        assert_eq!(AttributeValue::from("North").to_string(), "North");
    }

    #[test]
    fn test_record_keeps_first_position() {
        let mut record = AttributeRecord::new();
        record.insert("name", "a".into());
        record.insert("code", 1i64.into());
        record.insert("name", "b".into());

        assert_eq!(record.names().collect::<Vec<_>>(), vec!["name", "code"]);
        assert_eq!(record.get("name"), Some(&AttributeValue::from("b")));
        assert_eq!(record.len(), 2);
    }
}
