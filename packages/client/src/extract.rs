//! Pulling typed pieces out of responses.

use rabj_core::{MapContainer, Node, Params, Response, ACCESS_KEY_PARAM};
use serde_json::Value;

use crate::Error;

/// Params carrying an explicit access key, if one was given.
pub(crate) fn key_params(access_key: Option<&str>) -> Params {
    match access_key {
        Some(key) => Params::new().with(ACCESS_KEY_PARAM, key),
        None => Params::new(),
    }
}

/// A field of the result object.
pub(crate) fn field(response: &Response, name: &str) -> Result<Value, Error> {
    match response.value() {
        Value::Object(mut object) => object
            .remove(name)
            .ok_or_else(|| Error::missing(response.url(), name)),
        _ => Err(Error::shape(response.url(), "an object")),
    }
}

/// An array field of the result object, each element wrapped.
pub(crate) fn field_nodes(response: &Response, name: &str) -> Result<Vec<Node>, Error> {
    let factory = response.factory();
    match field(response, name)? {
        Value::Array(items) => Ok(items.into_iter().map(|v| factory.container(v)).collect()),
        _ => Err(Error::shape(response.url(), "an array")),
    }
}

/// The whole result as a list of wrapped elements.
pub(crate) fn result_nodes(response: Response) -> Result<Vec<Node>, Error> {
    let url = response.url();
    match response.into_result() {
        Node::Seq(seq) => Ok(seq.iter().collect()),
        _ => Err(Error::shape(url, "an array")),
    }
}

/// The result as an addressable object.
pub(crate) fn result_map(response: Response) -> Result<MapContainer, Error> {
    let url = response.url();
    addressable(response.into_result(), &url)
}

pub(crate) fn addressable(node: Node, url: &str) -> Result<MapContainer, Error> {
    node.into_map()
        .ok_or_else(|| Error::shape(url, "an object with an id"))
}
