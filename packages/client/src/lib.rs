//! # rabj
//!
//! Client for RABJ, a store of crowd-judgment queues.
//!
//! A [`Server`] hands out [`Queue`]s; a queue holds [`Question`]s, and
//! questions collect judgments. Everything sits on the lazy locators of
//! `rabj-core`, so any value here can still be addressed directly through
//! its [`locator`](Queue::locator).
//!
//! ```ignore
//! use rabj::{GetAll, NewQuestion, NewQueue, Server};
//! use rabj_http::ClientConfig;
//!
//! let server = Server::connect(ClientConfig::from_env()?)?;
//! let queue = server.create_queue(NewQueue::new("cats", "/user/me", 2u32).with_access_key("k"))?;
//! queue.add_all(vec![NewQuestion::new("is a cat", "yes/no")], rabj::DEFAULT_ADD_PAGESIZE)?;
//!
//! for question in queue.completed_questions(GetAll::default().with_judgments())? {
//!     println!("{:?}", question.get("judgments"));
//! }
//! ```

pub mod error;
pub mod export;
mod extract;
pub mod queue;
pub mod question;
pub mod server;

pub use error::Error;
pub use export::{export_judgments, export_queue_judgments, JudgmentRow};
pub use queue::{
    GetAll, Queue, QueueStatus, DEFAULT_ADD_PAGESIZE, DEFAULT_GET_PAGESIZE, STATE_COMPLETE,
    STATE_WANTING,
};
pub use question::{NewQuestion, Question};
pub use server::{norm_qid, NewQueue, Server, Votes};

pub use rabj_http::{ClientConfig, RABJ_PROD, RABJ_TRUNK};
