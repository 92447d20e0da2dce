//! Call arguments for verb invocations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire name of the access token parameter.
pub const ACCESS_KEY_PARAM: &str = "access_key";

/// Named arguments passed to a verb.
///
/// For GET they become the query string; for every other verb they are
/// serialized as a JSON object body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(Map<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style insert of any serializable value.
    pub fn with_serialized<T: Serialize>(
        mut self,
        key: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.0.insert(key.into(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// The access key carried in these params, if it is a string.
    pub fn access_key(&self) -> Option<&str> {
        self.0.get(ACCESS_KEY_PARAM).and_then(Value::as_str)
    }

    /// Add the access key unless the caller already supplied one.
    #[must_use]
    pub fn with_default_access_key(mut self, token: Option<&str>) -> Self {
        if let Some(token) = token {
            if !self.0.contains_key(ACCESS_KEY_PARAM) {
                self.0
                    .insert(ACCESS_KEY_PARAM.to_string(), Value::String(token.to_string()));
            }
        }
        self
    }

    /// Flatten into URL query pairs.
    ///
    /// Arrays repeat the key once per element, `null` is omitted, and nested
    /// objects are sent as JSON text.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (key, value) in &self.0 {
            match value {
                Value::Array(items) => {
                    for item in items {
                        if let Some(text) = query_text(item) {
                            pairs.push((key.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = query_text(other) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
        }
        pairs
    }

    /// The params as a JSON object body.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

fn query_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

impl From<Map<String, Value>> for Params {
    fn from(map: Map<String, Value>) -> Self {
        Params(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Params(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repeated_values_repeat_the_key() {
        let params = Params::new().with("tag", vec!["/en/cat", "/en/hat"]);
        assert_eq!(
            params.query_pairs(),
            vec![
                ("tag".to_string(), "/en/cat".to_string()),
                ("tag".to_string(), "/en/hat".to_string()),
            ]
        );
    }

    #[test]
    fn scalars_render_as_text_and_null_is_skipped() {
        let params = Params::new()
            .with("limit", 5000)
            .with("body", true)
            .with("since", Value::Null);
        let mut pairs = params.query_pairs();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("body".to_string(), "true".to_string()),
                ("limit".to_string(), "5000".to_string()),
            ]
        );
    }

    #[test]
    fn nested_objects_render_as_json() {
        let params = Params::new().with("queue", json!({"name": "x"}));
        assert_eq!(
            params.query_pairs(),
            vec![("queue".to_string(), r#"{"name":"x"}"#.to_string())]
        );
    }

    #[test]
    fn default_access_key_does_not_override_caller() {
        let params = Params::new().with_default_access_key(Some("token"));
        assert_eq!(params.access_key(), Some("token"));

        let params = Params::new()
            .with(ACCESS_KEY_PARAM, "mine")
            .with_default_access_key(Some("token"));
        assert_eq!(params.access_key(), Some("mine"));

        let params = Params::new().with_default_access_key(None);
        assert!(params.is_empty());
    }

    #[test]
    fn with_serialized_accepts_structs() {
        #[derive(Serialize)]
        struct Question {
            assertion: String,
        }
        let params = Params::new()
            .with_serialized(
                "questions",
                &vec![Question {
                    assertion: "a".to_string(),
                }],
            )
            .unwrap();
        assert_eq!(params.to_json(), json!({"questions": [{"assertion": "a"}]}));
    }

    #[test]
    fn collect_from_pairs() {
        let params: Params = [("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(params.len(), 2);
        assert!(params.contains_key("a"));
        assert_eq!(params.get("b"), Some(&json!(2)));
    }
}
