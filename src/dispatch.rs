//! Per-request replay, update and record decisions

use std::sync::{Arc, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::executor::{self, Executor, DEFAULT_EXECUTOR};
use crate::request::{Request, Response};
use crate::session::{Mimic, SharedMimic};
use crate::store::FixtureStore;
use crate::{MimicError, Result};

/// Routes outgoing requests to stored fixtures or to a live executor
pub struct Dispatcher {
    mimic: SharedMimic,
    executor: Box<dyn Executor>,
}

impl Dispatcher {
    /// Create a dispatcher using an explicit executor
    pub fn new(mimic: SharedMimic, executor: Box<dyn Executor>) -> Self {
        Self { mimic, executor }
    }

    /// Create a dispatcher using the session's external client, or the built-in one
    ///
    /// # Errors
    ///
    /// Returns error if the configured client identifier is unknown
    pub fn from_session(mimic: SharedMimic) -> Result<Self> {
        let identifier = lock(&mimic)
            .external_client()
            .unwrap_or_else(|| DEFAULT_EXECUTOR.to_string());
        debug!("Dispatching live requests through '{}'", identifier);

        let executor = executor::resolve(&identifier)?;
        Ok(Self::new(mimic, executor))
    }

    /// The session this dispatcher logs to
    pub fn mimic(&self) -> &SharedMimic {
        &self.mimic
    }

    /// Send a request through mimic.
    ///
    /// Every call is logged first. A matched fixture is replayed unless
    /// updating is enabled, in which case the request runs live and the
    /// fixture is overwritten. Unmatched requests run live and are recorded
    /// when recording is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::RecordingDisabled`] for an unmatched request
    /// with recording off, or any store or executor error
    pub fn send(&mut self, request: &mut Request) -> Result<Response> {
        if request.header("content-length").is_none() {
            request.set_header("content-length", request.body.len().to_string());
        }

        let shared = Arc::clone(&self.mimic);
        let mut mimic = lock(&shared);
        mimic.log_request(request.clone());
        let store = FixtureStore::new(&mimic);

        match store.load(request)? {
            Some(response) if !mimic.enable_updating() => {
                debug!("Replaying {} {}", request.method, request.url());
                request.set_response(Some(response.clone()));
                Ok(response)
            }
            Some(_) => {
                info!("Updating fixture for {} {}", request.method, request.url());
                request.set_response(None);
                self.execute_and_record(&mimic, request)
            }
            None if mimic.enable_recording() => {
                info!("Recording {} {}", request.method, request.url());
                self.execute_and_record(&mimic, request)
            }
            None => Err(MimicError::RecordingDisabled {
                method: request.method.clone(),
                uri: request.url(),
            }),
        }
    }

    fn execute_and_record(&mut self, mimic: &Mimic, request: &mut Request) -> Result<Response> {
        self.executor.execute(request)?;
        FixtureStore::new(mimic).record(request)?;

        request.response().cloned().ok_or_else(|| MimicError::NotExecuted {
            method: request.method.clone(),
            uri: request.uri.clone(),
        })
    }
}

fn lock(mimic: &SharedMimic) -> MutexGuard<'_, Mimic> {
    mimic.lock().unwrap_or_else(PoisonError::into_inner)
}
