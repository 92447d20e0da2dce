//! A single judgable item.

use rabj_core::{Locator, MapContainer, Params};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::extract::{field, result_map};
use crate::Error;

/// Payload for adding a question to a queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewQuestion {
    pub assertion: Value,
    pub answerspace: Value,
    /// Any other fields, sent alongside the assertion.
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl NewQuestion {
    pub fn new(assertion: impl Into<Value>, answerspace: impl Into<Value>) -> Self {
        Self {
            assertion: assertion.into(),
            answerspace: answerspace.into(),
            meta: Map::new(),
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A question stored on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    question: MapContainer,
}

impl Question {
    pub fn new(question: MapContainer) -> Self {
        Self { question }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.question.get_local(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.question.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.question.remove(key)
    }

    pub fn id(&self) -> Option<&str> {
        self.question.id()
    }

    pub fn container(&self) -> &MapContainer {
        &self.question
    }

    pub fn into_container(self) -> MapContainer {
        self.question
    }

    pub fn locator(&self) -> &Locator {
        self.question.locator()
    }

    pub fn to_json(&self) -> Value {
        self.question.to_json()
    }

    /// Current state of this question in `queue_id`.
    pub fn get_state(&self, queue_id: &str) -> Result<Value, Error> {
        let response = self.state(queue_id)?.get(Params::new())?;
        Ok(response.value())
    }

    pub fn set_state(&self, queue_id: &str, state: &str) -> Result<Value, Error> {
        let response = self
            .state(queue_id)?
            .put(Params::new().with("state", state))?;
        Ok(response.value())
    }

    /// Save local modifications and adopt the server's copy.
    pub fn update(&mut self) -> Result<&mut Self, Error> {
        let response = self
            .question
            .put(Params::new().with("question", self.question.to_json()))?;
        self.question = result_map(response)?;
        Ok(self)
    }

    pub fn delete(&self) -> Result<Value, Error> {
        Ok(self.question.delete(Params::new())?.value())
    }

    /// Fetch this question's judgments.
    pub fn judgments(&self) -> Result<Vec<Value>, Error> {
        let response = self.question.child("judgments")?.get(Params::new())?;
        match field(&response, "judgments")? {
            Value::Array(judgments) => Ok(judgments),
            _ => Err(Error::shape(response.url(), "an array of judgments")),
        }
    }

    fn state(&self, queue_id: &str) -> Result<Locator, Error> {
        Ok(self.question.locator().extend(["state", queue_id])?)
    }
}

impl Serialize for Question {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.question.serialize(serializer)
    }
}
