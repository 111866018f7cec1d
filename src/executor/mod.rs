//! External executors performing live HTTP calls
//!
//! The dispatcher hands an executor a request with no response attached;
//! the executor runs it against the real service and attaches the result.

pub mod http;

pub use http::HttpExecutor;

use crate::request::Request;
use crate::{MimicError, Result};

/// Identifier of the built-in hyper executor
pub const DEFAULT_EXECUTOR: &str = "http";

/// Performs a live call and attaches the response to the request
pub trait Executor {
    /// Execute `request`, attaching its response on success
    ///
    /// # Errors
    ///
    /// Returns error if the call cannot be made or its response cannot be read
    fn execute(&mut self, request: &mut Request) -> Result<()>;
}

/// Build the executor registered under `identifier`
///
/// # Errors
///
/// Returns [`MimicError::ConfigError`] for an unknown identifier, or any
/// error raised while constructing the executor
pub fn resolve(identifier: &str) -> Result<Box<dyn Executor>> {
    match identifier {
        DEFAULT_EXECUTOR => Ok(Box::new(HttpExecutor::new()?)),
        other => Err(MimicError::ConfigError(format!(
            "Unknown external client '{other}'"
        ))),
    }
}
