//! Entry point for a RABJ server.

use std::collections::BTreeMap;
use std::sync::Arc;

use rabj_core::{Locator, Params, ResourceAddress, Transport};
use rabj_http::{Client, ClientConfig, RABJ_PROD, RABJ_TRUNK};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::extract::{addressable, key_params, result_map, result_nodes};
use crate::queue::Queue;
use crate::Error;

const STORE_PATH: &str = "rabj/store";

/// Required votes per question: one count, or a count per answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Votes {
    Count(u32),
    PerAnswer(BTreeMap<String, u32>),
}

impl From<u32> for Votes {
    fn from(count: u32) -> Self {
        Votes::Count(count)
    }
}

impl From<BTreeMap<String, u32>> for Votes {
    fn from(per_answer: BTreeMap<String, u32>) -> Self {
        Votes::PerAnswer(per_answer)
    }
}

/// Payload for [`Server::create_queue`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewQueue {
    pub name: String,
    /// Owner id, e.g. `/user/someone`.
    pub owner: String,
    pub votes: Votes,
    pub access_key: Option<String>,
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub meta: Map<String, Value>,
}

impl NewQueue {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, votes: impl Into<Votes>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            votes: votes.into(),
            access_key: None,
            tags: Vec::new(),
            meta: Map::new(),
        }
    }

    #[must_use]
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// A RABJ server and its queue store.
#[derive(Debug, Clone)]
pub struct Server {
    server: Locator,
    store: Locator,
}

impl Server {
    /// Reach `server_url` through `transport`.
    ///
    /// A trailing `/rabj/store/` or `/rabj/` is stripped, so the store URL
    /// itself is accepted too.
    pub fn new(transport: Arc<dyn Transport>, server_url: &str) -> Result<Self, Error> {
        let server = Locator::new(ResourceAddress::parse(strip_store(server_url))?, transport);
        let store = server.extend([STORE_PATH])?;
        Ok(Self { server, store })
    }

    /// Build a reqwest transport from `config`. A configured access key is
    /// sent with every store call that does not name its own.
    pub fn connect(config: ClientConfig) -> Result<Self, Error> {
        Self::from_client(&Client::new(config)?)
    }

    pub fn from_client(client: &Client) -> Result<Self, Error> {
        let server = Self::new(client.transport(), &client.config().server_url)?;
        Ok(match &client.config().access_key {
            Some(key) => server.with_access_key(key.clone()),
            None => server,
        })
    }

    pub fn prod() -> Result<Self, Error> {
        Self::connect(ClientConfig::new(RABJ_PROD))
    }

    pub fn trunk() -> Result<Self, Error> {
        Self::connect(ClientConfig::new(RABJ_TRUNK))
    }

    #[must_use]
    pub fn with_access_key(&self, access_key: impl Into<String>) -> Self {
        let access_key = access_key.into();
        Self {
            server: self.server.with_access_token(access_key.clone()),
            store: self.store.with_access_token(access_key),
        }
    }

    pub fn server(&self) -> &Locator {
        &self.server
    }

    pub fn store(&self) -> &Locator {
        &self.store
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(self.server.transport())
    }

    /// Create a queue. Queues without an access key are open to anyone.
    pub fn create_queue(&self, queue: NewQueue) -> Result<Queue, Error> {
        if queue.access_key.is_none() {
            warn!(name = %queue.name, "creating a queue without an access key");
        }
        let params = Params::new().with_serialized("queue", &queue)?;
        let response = self.store.child("queues")?.post(params)?;
        let queue = Queue::new(result_map(response)?);
        info!(id = ?queue.id(), "created queue");
        Ok(queue)
    }

    pub fn get_queue(&self, queue_id: &str, access_key: Option<&str>) -> Result<Queue, Error> {
        let response = self.queue_locator(queue_id)?.get(key_params(access_key))?;
        Ok(Queue::new(result_map(response)?))
    }

    /// Delete a queue by id and return the server's report.
    pub fn delete_queue(&self, queue_id: &str, access_key: Option<&str>) -> Result<Value, Error> {
        let response = self.queue_locator(queue_id)?.delete(key_params(access_key))?;
        Ok(response.value())
    }

    /// Delete `queue`, using its own access key unless one is given.
    pub fn delete(&self, queue: &Queue, access_key: Option<&str>) -> Result<Value, Error> {
        let id = queue
            .id()
            .ok_or_else(|| Error::missing(queue.locator().url(), "id"))?;
        self.delete_queue(id, access_key.or(queue.access_key()))
    }

    pub fn public_queues(&self) -> Result<Vec<Queue>, Error> {
        self.queues(self.store.extend(["queues", "public"])?, Params::new())
    }

    /// Queues that can be operated with `access_key`.
    pub fn queues_by_access_key(&self, access_key: &str) -> Result<Vec<Queue>, Error> {
        self.queues(
            self.store.extend(["queues", "access_key"])?,
            key_params(Some(access_key)),
        )
    }

    pub fn queues_by_tags<I, S>(&self, tags: I, access_key: Option<&str>) -> Result<Vec<Queue>, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        self.queues(
            self.store.extend(["queues", "tags"])?,
            key_params(access_key).with("tag", tags),
        )
    }

    pub fn queues_by_owner(&self, owner: &str, access_key: Option<&str>) -> Result<Vec<Queue>, Error> {
        self.queues(
            self.store.extend(["users", owner, "queues"])?,
            key_params(access_key),
        )
    }

    fn queue_locator(&self, queue_id: &str) -> Result<Locator, Error> {
        Ok(self.store.extend([norm_qid(queue_id)])?)
    }

    fn queues(&self, locator: Locator, params: Params) -> Result<Vec<Queue>, Error> {
        let response = locator.get(params)?;
        let url = response.url();
        result_nodes(response)?
            .into_iter()
            .map(|node| addressable(node, &url).map(Queue::new))
            .collect()
    }
}

fn strip_store(server_url: &str) -> &str {
    for suffix in ["/rabj/store/", "/rabj/"] {
        if let Some(server) = server_url.strip_suffix(suffix) {
            return &server_url[..server.len() + 1];
        }
    }
    server_url
}

/// Queue id relative to the store: a leading `/rabj/store` or `/store` is
/// dropped.
pub fn norm_qid(queue_id: &str) -> &str {
    queue_id
        .strip_prefix("/rabj/store")
        .or_else(|| queue_id.strip_prefix("/store"))
        .unwrap_or(queue_id)
}
