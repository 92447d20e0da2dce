//! Client configuration.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// Production RABJ server.
pub const RABJ_PROD: &str = "http://rabj.labs.freebase.com/";
/// Trunk RABJ server.
pub const RABJ_TRUNK: &str = "http://rabj.trunk.metaweb.com/";

/// Environment variable naming the server URL.
pub const SERVER_ENV: &str = "RABJ_SERVER";
/// Environment variable carrying the access key.
pub const ACCESS_KEY_ENV: &str = "RABJ_ACCESS_KEY";
/// Environment variable with the per-request timeout in seconds.
pub const TIMEOUT_ENV: &str = "RABJ_TIMEOUT_SECS";
/// Environment variable with the fetch worker count.
pub const WORKERS_ENV: &str = "RABJ_WORKERS";

const DEFAULT_WORKERS: usize = 4;

/// Where and how to reach a RABJ server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub access_key: Option<String>,
    /// Per-request timeout; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Fetch pool size.
    pub workers: usize,
    /// Fetch pool queue bound; defaults to twice the worker count.
    pub queue_capacity: Option<usize>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: RABJ_PROD.to_string(),
            access_key: None,
            timeout: None,
            workers: DEFAULT_WORKERS,
            queue_capacity: None,
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Read `RABJ_SERVER`, `RABJ_ACCESS_KEY`, `RABJ_TIMEOUT_SECS` and
    /// `RABJ_WORKERS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = ClientConfig::default();
        if let Some(server) = lookup(SERVER_ENV).filter(|s| !s.trim().is_empty()) {
            config.server_url = server.trim().to_string();
        }
        config.access_key = lookup(ACCESS_KEY_ENV).filter(|k| !k.is_empty());
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("{} must be a number, got '{}'", TIMEOUT_ENV, raw)))?;
            config.timeout = Some(
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| Error::config(format!("{}: {}", TIMEOUT_ENV, e)))?,
            );
        }
        if let Some(raw) = lookup(WORKERS_ENV) {
            config.workers = raw.trim().parse().map_err(|_| {
                Error::config(format!("{} must be a positive integer, got '{}'", WORKERS_ENV, raw))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_access_key(mut self, access_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check the server URL and pool settings.
    pub fn validate(&self) -> Result<(), Error> {
        let url = Url::parse(&self.server_url)?;
        if url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "server url '{}' cannot carry a path",
                self.server_url
            )));
        }
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.queue_capacity == Some(0) {
            return Err(Error::config("queue capacity must be at least 1"));
        }
        Ok(())
    }
}

fn default_user_agent() -> String {
    format!("rabj-rs/{}", env!("CARGO_PKG_VERSION"))
}
