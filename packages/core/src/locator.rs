//! Callable resource handles.
//!
//! A [`Locator`] pairs a [`ResourceAddress`] with the transport that can reach
//! it. Building deeper locators is free; only the verb methods touch the
//! network, and each performs exactly one round trip.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::address::ResourceAddress;
use crate::container::{ContainerFactory, Node};
use crate::envelope::Envelope;
use crate::params::Params;
use crate::transport::Transport;
use crate::types::{Method, RequestDescriptor};
use crate::Error;

/// A URL-addressable remote resource a verb can be invoked on.
#[derive(Clone)]
pub struct Locator {
    address: ResourceAddress,
    transport: Arc<dyn Transport>,
}

impl Locator {
    pub fn new(address: ResourceAddress, transport: Arc<dyn Transport>) -> Self {
        Self { address, transport }
    }

    /// Locator for an absolute URL.
    pub fn parse(transport: Arc<dyn Transport>, url: &str) -> Result<Self, Error> {
        Ok(Self::new(ResourceAddress::parse(url)?, transport))
    }

    pub fn address(&self) -> &ResourceAddress {
        &self.address
    }

    pub fn url(&self) -> String {
        self.address.to_string()
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// The locator one segment deeper. No I/O.
    pub fn child(&self, name: &str) -> Result<Locator, Error> {
        Ok(self.at(self.address.child(name)?))
    }

    /// The locator several segments deeper. No I/O.
    pub fn extend<I, S>(&self, segments: I) -> Result<Locator, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(self.at(self.address.extend(segments)?))
    }

    /// A server-side id resolved against this locator's host.
    pub fn from_id(&self, id: &str) -> Result<Locator, Error> {
        Ok(self.at(self.address.from_id(id)?))
    }

    #[must_use]
    pub fn with_access_token(&self, token: impl Into<String>) -> Locator {
        self.at(self.address.with_access_token(token))
    }

    /// Another address reached through the same transport.
    pub fn at(&self, address: ResourceAddress) -> Locator {
        Locator {
            address,
            transport: Arc::clone(&self.transport),
        }
    }

    /// Describe a call without performing it.
    pub fn descriptor(&self, method: Method, params: Params) -> RequestDescriptor {
        RequestDescriptor::new(method, &self.address, params)
    }

    /// Invoke `method` on this resource.
    pub fn call(&self, method: Method, params: Params) -> Result<Response, Error> {
        let descriptor = self.descriptor(method, params);
        debug!(method = %method, url = %descriptor.url, "calling resource");
        fetch(self.transport.as_ref(), &self.transport, &descriptor)
    }

    pub fn get(&self, params: Params) -> Result<Response, Error> {
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
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Locator")
            .field("url", &self.address.to_string())
            .field("access_token", &self.address.access_token().is_some())
            .finish()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl PartialEq for Locator {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

/// A successful verb invocation: the envelope plus its result wrapped as a
/// [`Node`].
#[derive(Debug, Clone)]
pub struct Response {
    envelope: Envelope,
    locator: Locator,
    result: Node,
}

impl Response {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The resource the request was sent to.
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// URL the request was sent to, without the query string.
    pub fn url(&self) -> String {
        self.locator.url()
    }

    /// Wraps values from this response the way its result was wrapped.
    pub fn factory(&self) -> ContainerFactory {
        ContainerFactory::new(self.locator.clone())
    }

    pub fn result(&self) -> &Node {
        &self.result
    }

    pub fn into_result(self) -> Node {
        self.result
    }

    /// The raw result value.
    pub fn value(&self) -> Value {
        self.result.to_json()
    }

    pub fn into_parts(self) -> (Envelope, Node) {
        (self.envelope, self.result)
    }
}

/// Execute one descriptor on `connection`. Containers built from the result
/// keep `shared` as their transport.
pub(crate) fn fetch(
    connection: &dyn Transport,
    shared: &Arc<dyn Transport>,
    descriptor: &RequestDescriptor,
) -> Result<Response, Error> {
    let request = descriptor.to_http_request()?;
    let response = connection.request(&request)?;
    let envelope = Envelope::from_response(&response)?;

    let locator = Locator::new(descriptor.address()?, Arc::clone(shared));
    let value = envelope.result().cloned().unwrap_or(Value::Null);
    let result = ContainerFactory::new(locator.clone()).container(value);

    Ok(Response {
        envelope,
        locator,
        result,
    })
}
