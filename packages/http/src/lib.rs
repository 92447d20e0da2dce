//! # rabj-http
//!
//! The reqwest-backed [`Transport`] for `rabj-core`, plus the explicit
//! [`ClientConfig`] that replaces a process-wide default server.
//!
//! ```ignore
//! use rabj_http::{Client, ClientConfig};
//! use rabj_core::Params;
//!
//! let client = Client::new(ClientConfig::new("http://localhost:8080/").with_access_key("k"))?;
//!
//! // No I/O until a verb is called
//! let queue = client.locator("rabj/store/queues/q1")?;
//! let response = queue.get(Params::new())?;
//!
//! // Many independent GETs over the configured worker count
//! let results = client.pool().submit_batch(descriptors);
//! ```

pub mod config;
pub mod error;
pub mod transport;

use std::sync::Arc;

use rabj_core::{FetchPool, Locator, ResourceAddress, Transport};

pub use config::{ClientConfig, RABJ_PROD, RABJ_TRUNK};
pub use error::Error;
pub use transport::{ReqwestTransport, TransportSettings};

/// A configured entry point: a transport plus the settings it was built from.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl Client {
    /// Validate `config` and build a reqwest transport for it.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        config.validate()?;
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Use a caller-supplied transport, e.g. a mock.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// The server root, carrying the configured access key.
    pub fn root(&self) -> Result<Locator, Error> {
        self.locator("")
    }

    /// A locator for `path` relative to the server root. No I/O.
    pub fn locator(&self, path: &str) -> Result<Locator, Error> {
        let address = ResourceAddress::new(&self.config.server_url, path)?;
        let address = match &self.config.access_key {
            Some(key) => address.with_access_token(key.clone()),
            None => address,
        };
        Ok(Locator::new(address, self.transport()))
    }

    /// A fetch pool sized by the configuration.
    pub fn pool(&self) -> FetchPool {
        let pool = FetchPool::new(self.transport(), self.config.workers);
        match self.config.queue_capacity {
            Some(capacity) => pool.with_queue_capacity(capacity),
            None => pool,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_url", &self.config.server_url)
            .field("workers", &self.config.workers)
            .finish()
    }
}
