//! Request and response data exchanged with the store and executors

use bytes::Bytes;
use hyper::Uri;

use crate::{MimicError, Result};

/// An outgoing HTTP request made by the code under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// HTTP method (e.g., "GET", "POST")
    pub method: String,
    /// Scheme, host and path, without the query string
    pub uri: String,
    /// Headers in the order they were set
    pub headers: Vec<(String, String)>,
    /// Query parameters in the order they were set
    pub query: Vec<(String, String)>,
    /// Request body
    pub body: Bytes,
    response: Option<Response>,
}

/// An HTTP response, either replayed from disk or produced by an executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
}

/// The parts of a request URI used to locate its fixtures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// URI scheme, e.g. "http"
    pub scheme: String,
    /// Host name without port
    pub host: String,
    /// URL path, always starting with '/'
    pub path: String,
}

impl Request {
    /// Create a request with no headers, query or body
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Bytes::new(),
            response: None,
        }
    }

    /// Create a request from a full URL, splitting off and decoding its query string
    ///
    /// # Errors
    ///
    /// Returns error if a query component is not valid percent-encoded UTF-8
    pub fn parse(method: impl Into<String>, url: &str) -> Result<Self> {
        let (uri, query_string) = match url.split_once('?') {
            Some((uri, query)) => (uri, Some(query)),
            None => (url, None),
        };

        let mut request = Self::new(method, uri);
        if let Some(query_string) = query_string {
            for pair in query_string.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                request.set_query(decode_component(key)?, decode_component(value)?);
            }
        }

        Ok(request)
    }

    /// Builder-style header setter
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Builder-style query parameter setter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_query(key, value);
        self
    }

    /// Builder-style body setter
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value, ignoring the case of the name
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing any existing value with the same name
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    /// Look up a query parameter
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Set a query parameter, replacing any existing value for the key
    pub fn set_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.query.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value,
            None => self.query.push((key, value)),
        }
    }

    /// The response attached by a replay or a live execution
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Attach a response, or clear it with `None`
    pub fn set_response(&mut self, response: Option<Response>) {
        self.response = response;
    }

    /// Whether a response has been attached
    pub fn is_executed(&self) -> bool {
        self.response.is_some()
    }

    /// The full URL including the encoded query string
    pub fn url(&self) -> String {
        let mut url = self.uri.clone();
        for (i, (key, value)) in self.query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(&urlencoding::encode(key));
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    /// Split the URI into the scheme, host and path used for fixture storage
    ///
    /// # Errors
    ///
    /// Returns error if the URI is not absolute
    pub fn target(&self) -> Result<Target> {
        let uri: Uri = self
            .uri
            .parse()
            .map_err(|e| MimicError::InvalidUri(format!("'{}': {e}", self.uri)))?;

        let scheme = uri
            .scheme_str()
            .ok_or_else(|| MimicError::InvalidUri(format!("'{}' has no scheme", self.uri)))?;
        let host = uri
            .host()
            .ok_or_else(|| MimicError::InvalidUri(format!("'{}' has no host", self.uri)))?;

        Ok(Target {
            scheme: scheme.to_ascii_lowercase(),
            host: host.to_ascii_lowercase(),
            path: uri.path().to_string(),
        })
    }
}

impl Response {
    /// Create a response with no headers and an empty body
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Builder-style header setter
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder-style body setter
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value, ignoring the case of the name
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn decode_component(component: &str) -> Result<String> {
    let component = component.replace('+', " ");
    urlencoding::decode(&component)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| MimicError::InvalidUri(format!("Invalid query component '{component}': {e}")))
}
