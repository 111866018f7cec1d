//! Mimic - record and replay HTTP interactions for deterministic tests
//!
//! Outgoing requests go through a [`Dispatcher`]. Requests matching a stored
//! fixture are answered from disk; unmatched requests are executed live and
//! recorded when recording is enabled. Fixtures live in human-editable
//! `request_index.json` files next to their response bodies.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod request;
pub mod session;
pub mod store;

pub use config::{ConfigOverrides, MimicConfig, PathLayout};
pub use dispatch::Dispatcher;
pub use error::{MimicError, Result};
pub use executor::{Executor, HttpExecutor};
pub use request::{Request, Response};
pub use session::{Mimic, SharedMimic};
pub use store::FixtureStore;
