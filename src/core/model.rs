use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Open attribute bag carried by a payload between stages.
///
/// Keys are not predeclared. Reading a key nobody wrote yields `None`
/// rather than an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Model {
    attributes: BTreeMap<String, Value>,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Typed read. `None` when the key is absent or holds a different shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Model {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_key_reads_as_none() {
        let model = Model::new();
        assert!(model.get("missing").is_none());
        assert_eq!(model.get_as::<i64>("missing"), None);
    }

    #[test]
    fn test_typed_read_mismatch() {
        let mut model = Model::new();
        model.insert("value", "not a number");
        assert_eq!(model.get_as::<i64>("value"), None);
        assert_eq!(model.get_as::<String>("value").as_deref(), Some("not a number"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let model: Model = [("a", json!(1)), ("b", json!("x"))].into_iter().collect();
        assert_eq!(serde_json::to_value(&model).unwrap(), json!({"a": 1, "b": "x"}));
    }
}
