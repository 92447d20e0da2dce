//! Core of the RABJ client.
//!
//! This crate knows how to address remote resources without I/O, how to turn
//! a response envelope into either a value or a typed error, how to wrap
//! returned JSON as values that can be called on again, and how to run many
//! independent requests on a bounded set of workers.
//!
//! It never names an HTTP client; everything goes through [`Transport`].
//!
//! ```rust,ignore
//! use rabj_core::{Locator, Params};
//!
//! let queues = Locator::parse(transport, "http://h/rabj/store/")?.child("queues")?;
//! let queue = queues.child("q1")?.get(Params::new())?.into_result();
//! let judgments = queue.as_map().unwrap().get("judgments")?.resolve()?;
//! ```

pub mod address;
pub mod container;
pub mod envelope;
pub mod error;
pub mod locator;
pub mod params;
pub mod pool;
pub mod transport;
pub mod types;

pub use address::{AddressError, ResourceAddress};
pub use container::{ContainerFactory, Lookup, MapContainer, Node, SeqContainer};
pub use envelope::{Envelope, ErrorDetail};
pub use error::Error;
pub use locator::{Locator, Response};
pub use params::{Params, ACCESS_KEY_PARAM};
pub use pool::{submit_batch, FetchPool};
pub use transport::Transport;
pub use types::{default_headers, HttpRequest, HttpResponse, Method, RequestDescriptor, JSON_CONTENT_TYPE};
