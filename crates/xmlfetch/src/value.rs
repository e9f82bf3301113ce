//! Generic object graph built from fetched XML

use indexmap::map::{Entry, IntoIter, Iter, Keys, Values};
use indexmap::IndexMap;
use std::ops::Index;

/// A node of the generic object graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Character data of a leaf element, or an attribute value
    Scalar(String),
    /// Values of sibling elements sharing one key, in document order
    Sequence(Sequence),
    /// Attributes and child elements keyed by name
    Map(Map),
}

impl Default for Value {
    fn default() -> Self {
        Self::Scalar(String::new())
    }
}

impl Value {
    /// Returns true if this value is a scalar
    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Returns true if this value is a sequence
    pub fn is_sequence(&self) -> bool {
        matches!(self, Self::Sequence(_))
    }

    /// Returns true if this value is a map
    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(_))
    }

    /// Returns the text if this is a scalar, None otherwise
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the sequence if this is a sequence, None otherwise
    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the map if this is a map, None otherwise
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self {
            Self::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Looks up `key` if this is a map
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_owned())
    }
}

impl From<Sequence> for Value {
    fn from(value: Sequence) -> Self {
        Self::Sequence(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Self::Map(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Sequence(Sequence(values))
    }
}

/// Element and attribute names mapped to values
///
/// Iteration follows document order; equality ignores it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Map(IndexMap<String, Value>);

impl Map {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.0.get_mut(key)
    }

    /// Inserts a key-value pair, replacing and returning any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Inserts a value, promoting the entry to a [`Sequence`] if the key is taken
    ///
    /// The first collision turns the existing value into the first element of a
    /// new sequence; later collisions append to it.
    pub fn insert_or_promote(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let value = value.into();
        match self.0.entry(key.into()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Sequence(seq) => seq.push(value),
                existing => {
                    let first = std::mem::take(existing);
                    *existing = Value::Sequence(Sequence(vec![first, value]));
                }
            },
        }
    }

    /// Removes a key, preserving the order of the remaining entries
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> Keys<'_, String, Value> {
        self.0.keys()
    }

    pub fn values(&self) -> Values<'_, String, Value> {
        self.0.values()
    }

    pub fn iter(&self) -> Iter<'_, String, Value> {
        self.0.iter()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl Index<&str> for Map {
    type Output = Value;

    #[allow(clippy::indexing_slicing)]
    fn index(&self, key: &str) -> &Self::Output {
        &self.0[key]
    }
}

impl<'a> IntoIterator for &'a Map {
    type Item = (&'a String, &'a Value);
    type IntoIter = Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Map {
    type Item = (String, Value);
    type IntoIter = IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Map {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Ordered values of repeated sibling elements
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Sequence(Vec<Value>);

impl Sequence {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.0.push(value.into());
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.0
    }
}

impl Index<usize> for Sequence {
    type Output = Value;

    #[allow(clippy::indexing_slicing)]
    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Sequence {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<Value>> for Sequence {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl<V: Into<Value>> FromIterator<V> for Sequence {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(feature = "serde")]
mod ser {
    use super::{Map, Sequence, Value};
    use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Self::Scalar(s) => serializer.serialize_str(s),
                Self::Sequence(seq) => seq.serialize(serializer),
                Self::Map(map) => map.serialize(serializer),
            }
        }
    }

    impl Serialize for Map {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut out = serializer.serialize_map(Some(self.len()))?;
            for (key, value) in self {
                out.serialize_entry(key, value)?;
            }
            out.end()
        }
    }

    impl Serialize for Sequence {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let mut out = serializer.serialize_seq(Some(self.len()))?;
            for value in self {
                out.serialize_element(value)?;
            }
            out.end()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_is_methods() {
        assert!(Value::from("x").is_scalar());
        assert!(Value::Sequence(Sequence::new()).is_sequence());
        assert!(Value::Map(Map::new()).is_map());
        assert!(!Value::Map(Map::new()).is_scalar());
    }

    #[test]
    fn test_value_as_methods() {
        assert_eq!(Value::from("hello").as_scalar(), Some("hello"));
        assert_eq!(Value::Map(Map::new()).as_scalar(), None);
        assert!(Value::Sequence(Sequence::new()).as_sequence().is_some());
        assert!(Value::from("x").as_map().is_none());
    }

    #[test]
    fn test_default_is_empty_scalar() {
        assert_eq!(Value::default(), Value::Scalar(String::new()));
    }

    #[test]
    fn test_insert_overwrites() {
        let mut map = Map::new();
        map.insert("id", "1");
        let previous = map.insert("id", "2");
        assert_eq!(previous, Some(Value::from("1")));
        assert_eq!(map["id"], Value::from("2"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_insert_or_promote_single() {
        let mut map = Map::new();
        map.insert_or_promote("item", "1");
        assert_eq!(map["item"], Value::from("1"));
    }

    #[test]
    fn test_insert_or_promote_second_becomes_sequence() {
        let mut map = Map::new();
        map.insert_or_promote("item", "1");
        map.insert_or_promote("item", "2");
        map.insert_or_promote("item", "3");
        assert_eq!(
            map["item"],
            Value::from(vec![Value::from("1"), Value::from("2"), Value::from("3")])
        );
    }

    #[test]
    fn test_insert_or_promote_keeps_maps_intact() {
        let mut first = Map::new();
        first.insert("a", "1");
        let mut map = Map::new();
        map.insert_or_promote("row", first.clone());
        map.insert_or_promote("row", Map::new());
        let rows = map["row"].as_sequence().map(Sequence::len);
        assert_eq!(rows, Some(2));
        assert_eq!(map["row"].as_sequence().and_then(|s| s.get(0)), Some(&Value::Map(first)));
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a: Map = [("x", "1"), ("y", "2")].into_iter().collect();
        let b: Map = [("y", "2"), ("x", "1")].into_iter().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_map_iteration_keeps_document_order() {
        let map: Map = [("first", "1"), ("second", "2"), ("third", "3")]
            .into_iter()
            .collect();
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut map: Map = [("a", "1"), ("b", "2"), ("c", "3")].into_iter().collect();
        assert_eq!(map.remove("a"), Some(Value::from("1")));
        let keys: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_value_get() {
        let map: Map = [("name", "Ada")].into_iter().collect();
        let value = Value::Map(map);
        assert_eq!(value.get("name").and_then(Value::as_scalar), Some("Ada"));
        assert_eq!(Value::from("x").get("name"), None);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_json() -> Result<(), serde_json::Error> {
        let mut map = Map::new();
        map.insert("id", "7");
        map.insert_or_promote("tag", "a");
        map.insert_or_promote("tag", "b");
        let json = serde_json::to_string(&Value::Map(map))?;
        assert_eq!(json, r#"{"id":"7","tag":["a","b"]}"#);
        Ok(())
    }
}
