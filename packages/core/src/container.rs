//! Server results wrapped as local values that can re-enter the locator
//! protocol.
//!
//! Objects carrying a string `id` become a [`MapContainer`] rooted at that id.
//! Arrays become a [`SeqContainer`] that keeps the address of the response
//! they came from. Everything else is a plain [`Node::Value`].

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::locator::{Locator, Response};
use crate::params::{Params, ACCESS_KEY_PARAM};
use crate::types::Method;
use crate::Error;

const METADATA_KEY: &str = "__metadata__";
const ID_KEY: &str = "id";

/// Wraps JSON values relative to the locator they were fetched from.
#[derive(Debug, Clone)]
pub struct ContainerFactory {
    locator: Locator,
}

impl ContainerFactory {
    pub fn new(locator: Locator) -> Self {
        Self { locator }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn container(&self, value: Value) -> Node {
        match value {
            Value::Object(data) => match addressable_id(&data) {
                Some(id) => match self.locator.from_id(id) {
                    Ok(locator) => {
                        let locator = match embedded_token(&data) {
                            Some(token) => locator.with_access_token(token),
                            None => locator,
                        };
                        Node::Map(MapContainer { data, locator })
                    }
                    // An id that cannot form a path stays plain data.
                    Err(_) => Node::Value(Value::Object(data)),
                },
                None => Node::Value(Value::Object(data)),
            },
            Value::Array(data) => Node::Seq(SeqContainer {
                data,
                locator: self.locator.clone(),
            }),
            scalar => Node::Value(scalar),
        }
    }
}

fn addressable_id(data: &Map<String, Value>) -> Option<&str> {
    data.get(ID_KEY)
        .and_then(Value::as_str)
        .filter(|id| id.split('/').any(|piece| !piece.is_empty()))
}

fn embedded_token(data: &Map<String, Value>) -> Option<&str> {
    data.get(METADATA_KEY)
        .and_then(|meta| meta.get(ACCESS_KEY_PARAM))
        .and_then(Value::as_str)
        .or_else(|| data.get(ACCESS_KEY_PARAM).and_then(Value::as_str))
}

/// A wrapped result value.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A scalar or an object with no id.
    Value(Value),
    Map(MapContainer),
    Seq(SeqContainer),
}

impl Node {
    /// The plain value, when this node is not a container.
    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Node::Value(value) => Some(value),
            _ => None,
        }
    }

    /// The resource this node can call verbs on.
    pub fn as_resource(&self) -> Option<&Locator> {
        match self {
            Node::Value(_) => None,
            Node::Map(map) => Some(map.locator()),
            Node::Seq(seq) => Some(seq.locator()),
        }
    }

    pub fn as_map(&self) -> Option<&MapContainer> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqContainer> {
        match self {
            Node::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    pub fn into_map(self) -> Option<MapContainer> {
        match self {
            Node::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn into_seq(self) -> Option<SeqContainer> {
        match self {
            Node::Seq(seq) => Some(seq),
            _ => None,
        }
    }

    /// Re-serialize the wrapped data.
    pub fn to_json(&self) -> Value {
        match self {
            Node::Value(value) => value.clone(),
            Node::Map(map) => map.to_json(),
            Node::Seq(seq) => seq.to_json(),
        }
    }

    pub fn into_json(self) -> Value {
        match self {
            Node::Value(value) => value,
            Node::Map(map) => Value::Object(map.data),
            Node::Seq(seq) => Value::Array(seq.data),
        }
    }

    fn kind(&self) -> &'static str {
        match self.as_data() {
            Some(Value::Null) => "null",
            Some(Value::Bool(_)) => "boolean",
            Some(Value::Number(_)) => "number",
            Some(Value::String(_)) => "string",
            Some(Value::Array(_)) => "array",
            Some(Value::Object(_)) => "object",
            None => "container",
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Value(value) => value.serialize(serializer),
            Node::Map(map) => map.serialize(serializer),
            Node::Seq(seq) => seq.serialize(serializer),
        }
    }
}

/// Result of a key lookup on a [`MapContainer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The key was present in the local data.
    Local(Node),
    /// The key was absent; this is where it lives remotely.
    Remote(Locator),
}

impl Lookup {
    /// The local node, or a GET of the remote one.
    pub fn resolve(self) -> Result<Node, Error> {
        match self {
            Lookup::Local(node) => Ok(node),
            Lookup::Remote(locator) => Ok(locator.get(Params::new())?.into_result()),
        }
    }

    /// Invoke a verb on whatever this lookup addresses.
    pub fn call(&self, method: Method, params: Params) -> Result<Response, Error> {
        match self {
            Lookup::Remote(locator) => locator.call(method, params),
            Lookup::Local(node) => match node.as_resource() {
                Some(locator) => locator.call(method, params),
                None => Err(Error::NotAddressable { kind: node.kind() }),
            },
        }
    }

    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Lookup::Local(node) => node.as_resource(),
            Lookup::Remote(locator) => Some(locator),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Lookup::Local(_))
    }

    pub fn into_local(self) -> Option<Node> {
        match self {
            Lookup::Local(node) => Some(node),
            Lookup::Remote(_) => None,
        }
    }
}

/// A JSON object that mirrors a server-side resource.
#[derive(Debug, Clone, PartialEq)]
pub struct MapContainer {
    data: Map<String, Value>,
    locator: Locator,
}

impl MapContainer {
    pub fn new(data: Map<String, Value>, locator: Locator) -> Self {
        Self { data, locator }
    }

    /// Look a key up locally, falling back to the remote child address.
    ///
    /// Present values are wrapped relative to this container; a missing key
    /// costs no I/O.
    pub fn get(&self, key: &str) -> Result<Lookup, Error> {
        match self.data.get(key) {
            Some(value) => Ok(Lookup::Local(self.factory().container(value.clone()))),
            None => Ok(Lookup::Remote(self.child(key)?)),
        }
    }

    pub fn get_local(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// The remote child named `name`, regardless of local data.
    pub fn child(&self, name: &str) -> Result<Locator, Error> {
        self.locator.child(name)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.data.iter()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// The server-side id this container was rooted at.
    pub fn id(&self) -> Option<&str> {
        self.data.get(ID_KEY).and_then(Value::as_str)
    }

    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_data(self) -> Map<String, Value> {
        self.data
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.data.clone())
    }

    /// Replace the local data, keeping the address.
    pub fn replace_data(&mut self, data: Map<String, Value>) {
        self.data = data;
    }

    pub fn call(&self, method: Method, params: Params) -> Result<Response, Error> {
        self.locator.call(method, params)
    }

    /// GET this resource from the server.
    pub fn get_remote(&self, params: Params) -> Result<Response, Error> {
        self.call(Method::GET, params)
    }

    pub fn post(&self, params: Params) -> Result<Response, Error> {
        self.call(Method::POST, params)
    }

    pub fn put(&self, params: Params) -> Result<Response, Error> {
        self.call(Method::PUT, params)
    }

    pub fn delete(&self, params: Params) -> Result<Response, Error> {
        self.call(Method::DELETE, params)
    }

    fn factory(&self) -> ContainerFactory {
        ContainerFactory::new(self.locator.clone())
    }
}

impl Serialize for MapContainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

/// A JSON array addressed at the response it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct SeqContainer {
    data: Vec<Value>,
    locator: Locator,
}

impl SeqContainer {
    pub fn new(data: Vec<Value>, locator: Locator) -> Self {
        Self { data, locator }
    }

    /// The element at `index`, upgraded to a container when it has an id.
    pub fn get(&self, index: usize) -> Option<Node> {
        self.data
            .get(index)
            .map(|value| self.factory().container(value.clone()))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Node> + '_ {
        let factory = self.factory();
        self.data
            .iter()
            .map(move |value| factory.container(value.clone()))
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.data.push(value.into());
    }

    /// Insert at `index`; returns false when `index` is past the end.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> bool {
        if index > self.data.len() {
            return false;
        }
        self.data.insert(index, value.into());
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<Value> {
        (index < self.data.len()).then(|| self.data.remove(index))
    }

    /// Replace the element at `index`, returning the old one.
    pub fn set(&mut self, index: usize, value: impl Into<Value>) -> Option<Value> {
        self.data
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, value.into()))
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Value> {
        self.data
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.data.clone())
    }

    fn factory(&self) -> ContainerFactory {
        ContainerFactory::new(self.locator.clone())
    }
}

impl Serialize for SeqContainer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}
