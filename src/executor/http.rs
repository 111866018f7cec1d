//! Blocking HTTP executor backed by the hyper legacy client

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, warn};

use super::Executor;
use crate::request::{Request, Response};
use crate::{MimicError, Result};

/// Executes requests over plain HTTP, blocking the caller until the body is read
pub struct HttpExecutor {
    runtime: Runtime,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpExecutor {
    /// Create an executor with its own single-threaded runtime
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let client = {
            let _guard = runtime.enter();
            Client::builder(TokioExecutor::new())
                .pool_idle_timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(4)
                .build_http()
        };

        Ok(Self { runtime, client })
    }

    async fn send(&self, request: &Request) -> Result<Response> {
        let url = request.url();
        let uri = url
            .parse::<Uri>()
            .map_err(|e| MimicError::InvalidUri(format!("'{url}': {e}")))?;

        if uri.scheme_str() != Some("http") {
            return Err(MimicError::Executor(format!(
                "Only plain http is supported by the built-in client: {url}"
            )));
        }

        let method = request.method.parse::<Method>().map_err(|e| {
            MimicError::Executor(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut builder = hyper::Request::builder().method(method).uri(uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let http_request = builder
            .body(Full::new(request.body.clone()))
            .map_err(|e| MimicError::Executor(format!("Failed to build request: {e}")))?;

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Live request to {} failed: {}", url, e);
            MimicError::Executor(format!("Request to {url} failed: {e}"))
        })?;

        let status = response.status().as_u16();
        // Repeated headers stay separate entries; joining would corrupt set-cookie
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| MimicError::Executor(format!("Failed to read response body: {e}")))?
            .to_bytes();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl Executor for HttpExecutor {
    fn execute(&mut self, request: &mut Request) -> Result<()> {
        debug!("Executing {} {}", request.method, request.url());
        let response = self.runtime.block_on(self.send(request))?;
        debug!("Live response {} for {}", response.status, request.url());
        request.set_response(Some(response));
        Ok(())
    }
}
