//! Response body formatters
//!
//! A formatter stores a response body beside its index file, choosing a file
//! extension for the content type and optionally rewriting minified content
//! into something easier to read and hand-edit. Output must remain valid for
//! the content type.

mod json;
mod xml;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use json::JsonFormatter;
pub use xml::XmlFormatter;

use crate::config::FALLBACK_CONTENT_TYPE;
use crate::{MimicError, Result};

/// Stores response bodies to disk
pub trait ResponseFormatter {
    /// Extension appended to the file prefix, including the dot
    fn extension(&self) -> &'static str;

    /// Readable form of the content, or `None` to store it unchanged
    fn format(&self, _content: &[u8]) -> Option<Vec<u8>> {
        None
    }

    /// Write `content` to `<prefix><extension>` inside `dir`
    ///
    /// Returns the file name relative to `dir`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    fn put_contents(&self, dir: &Path, prefix: &str, content: &[u8]) -> Result<String> {
        let file = format!("{prefix}{}", self.extension());
        let formatted = self.format(content);
        std::fs::write(dir.join(&file), formatted.as_deref().unwrap_or(content))?;
        Ok(file)
    }
}

/// Stores bodies verbatim as `.body`
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericFormatter;

impl ResponseFormatter for GenericFormatter {
    fn extension(&self) -> &'static str {
        ".body"
    }
}

/// Stores HTML bodies verbatim as `.html`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFormatter;

impl ResponseFormatter for HtmlFormatter {
    fn extension(&self) -> &'static str {
        ".html"
    }
}

/// Stores Javascript bodies verbatim as `.js`
#[derive(Debug, Clone, Copy, Default)]
pub struct JavascriptFormatter;

impl ResponseFormatter for JavascriptFormatter {
    fn extension(&self) -> &'static str {
        ".js"
    }
}

/// Formatter selection, as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatterKind {
    /// [`GenericFormatter`]
    Generic,
    /// [`HtmlFormatter`]
    Html,
    /// [`JavascriptFormatter`]
    Javascript,
    /// [`JsonFormatter`]
    Json,
    /// [`XmlFormatter`]
    Xml,
}

impl FormatterKind {
    /// The formatter implementing this kind
    pub fn formatter(self) -> &'static dyn ResponseFormatter {
        match self {
            Self::Generic => &GenericFormatter,
            Self::Html => &HtmlFormatter,
            Self::Javascript => &JavascriptFormatter,
            Self::Json => &JsonFormatter,
            Self::Xml => &XmlFormatter,
        }
    }
}

/// Maps normalized content types to formatters, with a mandatory fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatterRegistry {
    formatters: HashMap<String, FormatterKind>,
    fallback: FormatterKind,
}

impl FormatterRegistry {
    /// Build a registry from the configured mapping
    ///
    /// # Errors
    ///
    /// Returns error if the mapping has no `"*"` fallback entry
    pub fn from_config(mapping: &BTreeMap<String, FormatterKind>) -> Result<Self> {
        let fallback = *mapping.get(FALLBACK_CONTENT_TYPE).ok_or_else(|| {
            MimicError::ConfigError(format!(
                "response_formatters must contain a '{FALLBACK_CONTENT_TYPE}' fallback entry"
            ))
        })?;

        let formatters = mapping
            .iter()
            .filter(|(content_type, _)| content_type.as_str() != FALLBACK_CONTENT_TYPE)
            .map(|(content_type, kind)| (normalize_content_type(content_type), *kind))
            .collect();

        Ok(Self {
            formatters,
            fallback,
        })
    }

    /// Formatter kind for a Content-Type header value (parameters ignored)
    pub fn kind_for(&self, content_type: Option<&str>) -> FormatterKind {
        content_type
            .map(normalize_content_type)
            .and_then(|content_type| self.formatters.get(&content_type).copied())
            .unwrap_or(self.fallback)
    }

    /// Formatter for a Content-Type header value
    pub fn formatter_for(&self, content_type: Option<&str>) -> &'static dyn ResponseFormatter {
        self.kind_for(content_type).formatter()
    }
}

impl Default for FormatterRegistry {
    fn default() -> Self {
        let mapping = crate::config::MimicConfig::default().response_formatters;
        let fallback = mapping
            .get(FALLBACK_CONTENT_TYPE)
            .copied()
            .unwrap_or(FormatterKind::Generic);
        Self {
            formatters: mapping
                .into_iter()
                .filter(|(content_type, _)| content_type != FALLBACK_CONTENT_TYPE)
                .collect(),
            fallback,
        }
    }
}

/// Primary type only: `text/HTML; charset=utf-8` becomes `text/html`
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generic_writes_verbatim() {
        let dir = TempDir::new().unwrap();
        let content = b"some \x00 binary {\"a\":1}";

        let file = GenericFormatter
            .put_contents(dir.path(), "response_0", content)
            .unwrap();

        assert_eq!(file, "response_0.body");
        assert_eq!(std::fs::read(dir.path().join(&file)).unwrap(), content);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(FormatterKind::Generic.formatter().extension(), ".body");
        assert_eq!(FormatterKind::Html.formatter().extension(), ".html");
        assert_eq!(FormatterKind::Javascript.formatter().extension(), ".js");
        assert_eq!(FormatterKind::Json.formatter().extension(), ".json");
        assert_eq!(FormatterKind::Xml.formatter().extension(), ".xml");
    }

    #[test]
    fn test_html_and_javascript_store_unchanged() {
        let dir = TempDir::new().unwrap();
        let html = b"<html><body><p>unclosed</body>";
        let script = b"var a=1;function f(){return a}";

        let html_file = HtmlFormatter.put_contents(dir.path(), "page", html).unwrap();
        let js_file = JavascriptFormatter
            .put_contents(dir.path(), "script", script)
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join(html_file)).unwrap(), html);
        assert_eq!(std::fs::read(dir.path().join(js_file)).unwrap(), script);
    }

    #[test]
    fn test_registry_selects_by_primary_type() {
        let registry = FormatterRegistry::default();

        assert_eq!(registry.kind_for(Some("application/json")), FormatterKind::Json);
        assert_eq!(
            registry.kind_for(Some("text/html; charset=utf-8")),
            FormatterKind::Html
        );
        assert_eq!(
            registry.kind_for(Some(" Application/RSS+XML ;q=1")),
            FormatterKind::Xml
        );
        assert_eq!(registry.kind_for(Some("text/javascript")), FormatterKind::Javascript);
    }

    #[test]
    fn test_registry_falls_back() {
        let registry = FormatterRegistry::default();

        assert_eq!(registry.kind_for(None), FormatterKind::Generic);
        assert_eq!(registry.kind_for(Some("image/png")), FormatterKind::Generic);
        assert_eq!(registry.kind_for(Some("")), FormatterKind::Generic);
    }

    #[test]
    fn test_registry_from_config() {
        let mut mapping = BTreeMap::new();
        mapping.insert("Text/Plain".to_string(), FormatterKind::Html);
        mapping.insert("*".to_string(), FormatterKind::Json);

        let registry = FormatterRegistry::from_config(&mapping).unwrap();
        assert_eq!(registry.kind_for(Some("text/plain")), FormatterKind::Html);
        assert_eq!(registry.kind_for(Some("application/json")), FormatterKind::Json);
        assert_eq!(registry.kind_for(None), FormatterKind::Json);
    }

    #[test]
    fn test_registry_requires_fallback() {
        let mut mapping = BTreeMap::new();
        mapping.insert("application/json".to_string(), FormatterKind::Json);

        assert!(matches!(
            FormatterRegistry::from_config(&mapping),
            Err(MimicError::ConfigError(_))
        ));
    }
}
