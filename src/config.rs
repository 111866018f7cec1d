//! Configuration types for Mimic

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::formatter::FormatterKind;
use crate::{MimicError, Result};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "MIMIC_CONFIG";

/// Scenario used when none is configured
pub const DEFAULT_SCENARIO: &str = "default";

/// Content-type key for the mandatory fallback formatter
pub const FALLBACK_CONTENT_TYPE: &str = "*";

/// How the request host is laid out under the scenario directory.
///
/// Part of the on-disk fixture format: changing it orphans existing recordings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathLayout {
    /// `http/www.example.com/path/`
    #[default]
    Flat,
    /// `http/www/example/com/path/`
    SplitHost,
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimicConfig {
    /// Root directory for all scenarios
    #[serde(default = "default_base_path")]
    pub base_path: PathBuf,
    /// Active scenario (subdirectory of `base_path`)
    #[serde(default = "default_scenario")]
    pub active_mime: String,
    /// Execute and record requests with no matching fixture
    #[serde(default)]
    pub enable_recording: bool,
    /// Re-execute matched requests and overwrite their fixtures
    #[serde(default)]
    pub enable_updating: bool,
    /// Attach diagnostic headers to replayed responses
    #[serde(default)]
    pub debug_headers: bool,
    /// Identifier of the executor used for live requests
    #[serde(default)]
    pub external_client: Option<String>,
    /// Storage directory layout
    #[serde(default)]
    pub path_layout: PathLayout,
    /// Content-type to body formatter mapping
    #[serde(default = "default_response_formatters")]
    pub response_formatters: BTreeMap<String, FormatterKind>,
}

/// Per-field overrides applied on top of a base configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Override for `base_path`
    pub base_path: Option<PathBuf>,
    /// Override for `active_mime`
    pub active_mime: Option<String>,
    /// Override for `enable_recording`
    pub enable_recording: Option<bool>,
    /// Override for `enable_updating`
    pub enable_updating: Option<bool>,
    /// Override for `debug_headers`
    pub debug_headers: Option<bool>,
    /// Override for `external_client`
    pub external_client: Option<String>,
    /// Override for `path_layout`
    pub path_layout: Option<PathLayout>,
}

fn default_base_path() -> PathBuf {
    PathBuf::from("tests/test_data/mimic")
}

fn default_scenario() -> String {
    DEFAULT_SCENARIO.to_string()
}

fn default_response_formatters() -> BTreeMap<String, FormatterKind> {
    [
        ("text/html", FormatterKind::Html),
        ("application/json", FormatterKind::Json),
        ("application/javascript", FormatterKind::Javascript),
        ("text/javascript", FormatterKind::Javascript),
        ("application/xml", FormatterKind::Xml),
        ("text/xml", FormatterKind::Xml),
        ("application/atom+xml", FormatterKind::Xml),
        ("application/rss+xml", FormatterKind::Xml),
        (FALLBACK_CONTENT_TYPE, FormatterKind::Generic),
    ]
    .into_iter()
    .map(|(content_type, kind)| (content_type.to_string(), kind))
    .collect()
}

impl Default for MimicConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            active_mime: default_scenario(),
            enable_recording: false,
            enable_updating: false,
            debug_headers: false,
            external_client: None,
            path_layout: PathLayout::default(),
            response_formatters: default_response_formatters(),
        }
    }
}

impl MimicConfig {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MimicError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| MimicError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file named by `MIMIC_CONFIG`, or the defaults when it is unset
    ///
    /// # Errors
    ///
    /// Returns error if the named file cannot be loaded
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    /// Return a copy with every set override applied
    #[must_use]
    pub fn merged(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(base_path) = overrides.base_path {
            self.base_path = base_path;
        }
        if let Some(active_mime) = overrides.active_mime {
            self.active_mime = active_mime;
        }
        if let Some(enable) = overrides.enable_recording {
            self.enable_recording = enable;
        }
        if let Some(enable) = overrides.enable_updating {
            self.enable_updating = enable;
        }
        if let Some(enable) = overrides.debug_headers {
            self.debug_headers = enable;
        }
        if overrides.external_client.is_some() {
            self.external_client = overrides.external_client;
        }
        if let Some(layout) = overrides.path_layout {
            self.path_layout = layout;
        }
        self
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if !self.response_formatters.contains_key(FALLBACK_CONTENT_TYPE) {
            return Err(MimicError::ConfigError(format!(
                "response_formatters must contain a '{FALLBACK_CONTENT_TYPE}' fallback entry"
            )));
        }

        validate_scenario_name(&self.active_mime)?;

        Ok(())
    }
}

impl ConfigOverrides {
    /// Whether no override is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Validate a scenario name
///
/// Scenario names become a single directory under the base path.
///
/// # Errors
///
/// Returns error if the name is empty, too long, or could escape the base path
pub fn validate_scenario_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MimicError::InvalidScenario(
            "Scenario name cannot be empty".to_string(),
        ));
    }

    if name.len() > 255 {
        return Err(MimicError::InvalidScenario(format!(
            "Scenario name too long: {} > 255",
            name.len()
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(MimicError::InvalidScenario(
            "Scenario name cannot contain path separators".to_string(),
        ));
    }

    if name.starts_with('.') {
        return Err(MimicError::InvalidScenario(
            "Scenario name cannot start with dot".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MimicError::InvalidScenario(
            "Scenario name cannot contain null bytes".to_string(),
        ));
    }

    if name.contains("..") {
        return Err(MimicError::InvalidScenario(
            "Scenario name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}
