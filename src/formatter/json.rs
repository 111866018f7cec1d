//! JSON response formatter

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use tracing::warn;

use super::ResponseFormatter;

/// Stores JSON bodies as tab-indented `.json`, keeping the original key order
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl ResponseFormatter for JsonFormatter {
    fn extension(&self) -> &'static str {
        ".json"
    }

    fn format(&self, content: &[u8]) -> Option<Vec<u8>> {
        let value: Value = match serde_json::from_slice(content) {
            Ok(value) => value,
            Err(e) => {
                warn!("Storing unparseable JSON body unchanged: {e}");
                return None;
            }
        };

        // Scalars gain nothing from reformatting
        if !(value.is_object() || value.is_array()) {
            return None;
        }

        let mut out = Vec::with_capacity(content.len() * 2);
        let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"\t"));
        value.serialize(&mut serializer).ok()?;
        Some(out)
    }
}
