//! Run-wide settings and request history
//!
//! [`Mimic`] is constructed explicitly and handed to the dispatcher and store.
//! [`Mimic::instance`] offers a process-global shared instance for harnesses
//! that want one, but nothing in the core reads it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use crate::config::{validate_scenario_name, ConfigOverrides, MimicConfig, PathLayout};
use crate::formatter::FormatterRegistry;
use crate::request::Request;
use crate::{MimicError, Result};

/// A session shared between a harness and its dispatcher
pub type SharedMimic = Arc<Mutex<Mimic>>;

static INSTANCE: Mutex<Option<SharedMimic>> = Mutex::new(None);

static PREVIOUS_EXTERNAL_CLIENT: RwLock<Option<String>> = RwLock::new(None);

/// Record the executor that was in effect before mimic was installed.
///
/// Sessions with no configured `external_client` fall back to this value.
pub fn set_previous_external_client(client: Option<String>) {
    *PREVIOUS_EXTERNAL_CLIENT
        .write()
        .unwrap_or_else(PoisonError::into_inner) = client;
}

/// The executor that was in effect before mimic was installed
pub fn previous_external_client() -> Option<String> {
    PREVIOUS_EXTERNAL_CLIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Session controller: settings plus the log of every outgoing request
#[derive(Debug)]
pub struct Mimic {
    base_path: PathBuf,
    active_mime: String,
    enable_recording: bool,
    enable_updating: bool,
    debug_headers: bool,
    external_client: Option<String>,
    path_layout: PathLayout,
    formatters: FormatterRegistry,
    history: Vec<Request>,
}

impl Mimic {
    /// Create a session from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: MimicConfig) -> Result<Self> {
        config.validate()?;
        let formatters = FormatterRegistry::from_config(&config.response_formatters)?;

        Ok(Self {
            base_path: config.base_path,
            active_mime: config.active_mime,
            enable_recording: config.enable_recording,
            enable_updating: config.enable_updating,
            debug_headers: config.debug_headers,
            external_client: config.external_client,
            path_layout: config.path_layout,
            formatters,
            history: Vec::new(),
        })
    }

    /// Get the process-global session, creating it on first use.
    ///
    /// The global is built from [`MimicConfig::from_env`] merged with
    /// `overrides`. Passing `reset` replaces any existing global with a fresh
    /// session.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::AlreadyInitialised`] if overrides are passed while
    /// a global exists and `reset` is false, or any configuration error
    pub fn instance(overrides: ConfigOverrides, reset: bool) -> Result<SharedMimic> {
        let mut slot = INSTANCE.lock().unwrap_or_else(PoisonError::into_inner);

        if !reset {
            if let Some(existing) = slot.as_ref() {
                if !overrides.is_empty() {
                    return Err(MimicError::AlreadyInitialised);
                }
                return Ok(Arc::clone(existing));
            }
        }

        let mimic = Self::new(MimicConfig::from_env()?.merged(overrides))?.shared();
        *slot = Some(Arc::clone(&mimic));
        info!("Initialised global mimic session");

        Ok(mimic)
    }

    /// Wrap this session for sharing with a dispatcher
    pub fn shared(self) -> SharedMimic {
        Arc::new(Mutex::new(self))
    }

    /// Root directory for all scenarios
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Set the root directory for all scenarios
    pub fn set_base_path(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.base_path = path.into();
        self
    }

    /// Whether unmatched requests are executed and recorded
    pub fn enable_recording(&self) -> bool {
        self.enable_recording
    }

    /// Enable or disable recording of unmatched requests
    pub fn set_enable_recording(&mut self, enable: bool) -> &mut Self {
        self.enable_recording = enable;
        self
    }

    /// Whether matched requests are re-executed and their fixtures overwritten
    pub fn enable_updating(&self) -> bool {
        self.enable_updating
    }

    /// Enable or disable updating of matched fixtures
    pub fn set_enable_updating(&mut self, enable: bool) -> &mut Self {
        self.enable_updating = enable;
        self
    }

    /// Whether replayed responses carry diagnostic headers
    pub fn debug_headers(&self) -> bool {
        self.debug_headers
    }

    /// Enable or disable diagnostic headers on replayed responses
    pub fn set_debug_headers(&mut self, enable: bool) -> &mut Self {
        self.debug_headers = enable;
        self
    }

    /// Executor identifier, falling back to [`previous_external_client`]
    pub fn external_client(&self) -> Option<String> {
        self.external_client
            .clone()
            .or_else(previous_external_client)
    }

    /// Set the executor identifier used for live requests
    pub fn set_external_client(&mut self, client: impl Into<String>) -> &mut Self {
        self.external_client = Some(client.into());
        self
    }

    /// Name of the active scenario
    pub fn active_mime(&self) -> &str {
        &self.active_mime
    }

    /// Switch to another scenario
    ///
    /// # Errors
    ///
    /// Returns error if the name is not a valid scenario name
    pub fn load_mime(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        let name = name.into();
        validate_scenario_name(&name)?;
        debug!("Switching scenario: {} -> {}", self.active_mime, name);
        self.active_mime = name;
        Ok(self)
    }

    /// Directory holding the active scenario's fixtures
    pub fn mime_path(&self) -> PathBuf {
        self.base_path.join(&self.active_mime)
    }

    /// Storage directory layout
    pub fn path_layout(&self) -> PathLayout {
        self.path_layout
    }

    /// Set the storage directory layout
    pub fn set_path_layout(&mut self, layout: PathLayout) -> &mut Self {
        self.path_layout = layout;
        self
    }

    /// Content-type to formatter mapping
    pub fn formatters(&self) -> &FormatterRegistry {
        &self.formatters
    }

    /// Append a request to the history
    pub fn log_request(&mut self, request: Request) {
        debug!(
            "Logged request {}: {} {}",
            self.history.len(),
            request.method,
            request.uri
        );
        self.history.push(request);
    }

    /// Number of requests logged since the last reset
    pub fn request_count(&self) -> usize {
        self.history.len()
    }

    /// All logged requests in call order
    pub fn request_history(&self) -> &[Request] {
        &self.history
    }

    /// The request logged at `index` (zero-based)
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::OutOfRange`] if fewer requests were logged
    pub fn request_at(&self, index: usize) -> Result<&Request> {
        self.history.get(index).ok_or(MimicError::OutOfRange {
            index,
            len: self.history.len(),
        })
    }

    /// The most recently logged request
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::OutOfRange`] if no request was logged
    pub fn last_request(&self) -> Result<&Request> {
        self.history.last().ok_or(MimicError::OutOfRange {
            index: 0,
            len: 0,
        })
    }

    /// Whether any logged request went to `url` (including query), optionally with `method`
    pub fn contains_request(&self, url: &str, method: Option<&str>) -> bool {
        self.history.iter().any(|request| {
            method.map_or(true, |method| request.method == method) && request.url() == url
        })
    }

    /// Clear the request history
    pub fn reset_requests(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_mimic() -> Mimic {
        let config = MimicConfig {
            base_path: PathBuf::from("/foo/config_setting"),
            active_mime: "default_config".to_string(),
            ..MimicConfig::default()
        };
        Mimic::new(config).unwrap()
    }

    fn logged_mimic() -> Mimic {
        let mut mimic = test_mimic();
        for i in 0..3 {
            mimic.log_request(Request::new("GET", format!("http://foo.bar.com/{i}")));
        }
        mimic
    }

    #[test]
    fn test_constructor_takes_config() {
        let mimic = test_mimic();
        assert_eq!(mimic.base_path(), Path::new("/foo/config_setting"));
        assert_eq!(mimic.active_mime(), "default_config");
        assert!(!mimic.enable_recording());
        assert!(!mimic.enable_updating());
        assert!(!mimic.debug_headers());
    }

    #[test]
    fn test_constructor_rejects_invalid_config() {
        let config = MimicConfig {
            active_mime: "../escape".to_string(),
            ..MimicConfig::default()
        };
        assert!(matches!(
            Mimic::new(config),
            Err(MimicError::InvalidScenario(_))
        ));
    }

    #[test]
    fn test_setters_chain() {
        let mut mimic = test_mimic();
        mimic
            .set_base_path("/foo/other")
            .set_enable_recording(true)
            .set_enable_updating(true)
            .set_debug_headers(true)
            .set_external_client("http");

        assert_eq!(mimic.base_path(), Path::new("/foo/other"));
        assert!(mimic.enable_recording());
        assert!(mimic.enable_updating());
        assert!(mimic.debug_headers());
        assert_eq!(mimic.external_client().as_deref(), Some("http"));
    }

    #[test]
    fn test_get_and_set_active_mime() {
        let mut mimic = test_mimic();
        mimic.load_mime("another_mime").unwrap();
        assert_eq!(mimic.active_mime(), "another_mime");

        assert!(mimic.load_mime("bad/name").is_err());
        assert_eq!(mimic.active_mime(), "another_mime");
    }

    #[test]
    fn test_mime_path() {
        let mimic = test_mimic();
        assert_eq!(
            mimic.mime_path(),
            Path::new("/foo/config_setting").join("default_config")
        );
    }

    #[test]
    fn test_counts_requests() {
        let mut mimic = test_mimic();
        assert_eq!(mimic.request_count(), 0);

        let mimic_logged = logged_mimic();
        assert_eq!(mimic_logged.request_count(), 3);

        mimic.log_request(Request::new("POST", "http://foo.bar.com/"));
        assert_eq!(mimic.request_count(), 1);
    }

    #[test]
    fn test_request_at_returns_in_call_order() {
        let mimic = logged_mimic();
        for i in 0..3 {
            assert_eq!(
                mimic.request_at(i).unwrap().uri,
                format!("http://foo.bar.com/{i}")
            );
        }
        assert_eq!(mimic.request_history().len(), 3);
    }

    #[test]
    fn test_request_at_out_of_range() {
        let mimic = logged_mimic();
        assert!(matches!(
            mimic.request_at(3),
            Err(MimicError::OutOfRange { index: 3, len: 3 })
        ));
        assert!(mimic.request_at(5).is_err());
    }

    #[test]
    fn test_last_request() {
        let mut mimic = logged_mimic();
        assert_eq!(mimic.last_request().unwrap().uri, "http://foo.bar.com/2");

        mimic.reset_requests();
        assert_eq!(mimic.request_count(), 0);
        assert!(mimic.request_history().is_empty());
        assert!(matches!(
            mimic.last_request(),
            Err(MimicError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_contains_request() {
        let mut mimic = test_mimic();
        mimic.log_request(Request::new("POST", "http://foo.bar.com/form").with_query("a", "1"));

        assert!(mimic.contains_request("http://foo.bar.com/form?a=1", None));
        assert!(mimic.contains_request("http://foo.bar.com/form?a=1", Some("POST")));
        assert!(!mimic.contains_request("http://foo.bar.com/form?a=1", Some("GET")));
        assert!(!mimic.contains_request("http://foo.bar.com/form", None));
    }

    // Global state is touched by this test only, so its steps run sequentially
    #[test]
    fn test_global_instance_and_previous_client() {
        let first = Mimic::instance(ConfigOverrides::default(), false).unwrap();
        let same = Mimic::instance(ConfigOverrides::default(), false).unwrap();
        assert!(Arc::ptr_eq(&first, &same));

        let overrides = ConfigOverrides {
            base_path: Some(PathBuf::from("/foo/singleton/path")),
            ..ConfigOverrides::default()
        };
        assert!(matches!(
            Mimic::instance(overrides.clone(), false),
            Err(MimicError::AlreadyInitialised)
        ));

        let fresh = Mimic::instance(overrides, true).unwrap();
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(
            fresh.lock().unwrap().base_path(),
            Path::new("/foo/singleton/path")
        );

        set_previous_external_client(Some("curl".to_string()));
        assert_eq!(previous_external_client().as_deref(), Some("curl"));
        let mimic = test_mimic();
        assert_eq!(mimic.external_client().as_deref(), Some("curl"));

        let mut configured = test_mimic();
        configured.set_external_client("foo");
        assert_eq!(configured.external_client().as_deref(), Some("foo"));
        set_previous_external_client(None);
    }
}
