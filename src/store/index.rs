//! Request index file format
//!
//! One `request_index.json` per (scheme, host, path), holding an ordered JSON
//! array of fixture definitions. Order is significant: lookups take the first
//! matching definition. The file is meant to be read and edited by hand.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::request::{Request, Response};
use crate::{MimicError, Result};

/// Index file name inside each request storage directory
pub const INDEX_FILE: &str = "request_index.json";

/// Key of the tagged object representing [`Criterion::Present`]
pub const WILDCARD_TAG: &str = "__mimic_wildcard__";

/// Method criterion matching any request method
pub const ANY_METHOD: &str = "*";

/// A header or query criterion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CriterionRepr", into = "CriterionRepr")]
pub enum Criterion {
    /// Value must equal this string
    Exact(String),
    /// Key must be present with a non-empty value
    Present,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CriterionRepr {
    Literal(String),
    Number(serde_json::Number),
    Bool(bool),
    Tagged(WildcardTag),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WildcardTag {
    #[serde(rename = "__mimic_wildcard__")]
    wildcard: bool,
}

impl TryFrom<CriterionRepr> for Criterion {
    type Error = String;

    fn try_from(repr: CriterionRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            CriterionRepr::Literal(value) => Ok(Self::Exact(value)),
            CriterionRepr::Number(value) => Ok(Self::Exact(value.to_string())),
            CriterionRepr::Bool(value) => Ok(Self::Exact(value.to_string())),
            CriterionRepr::Tagged(WildcardTag { wildcard: true }) => Ok(Self::Present),
            CriterionRepr::Tagged(WildcardTag { wildcard: false }) => {
                Err(format!("{WILDCARD_TAG} must be true"))
            }
        }
    }
}

impl From<Criterion> for CriterionRepr {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Exact(value) => Self::Literal(value),
            Criterion::Present => Self::Tagged(WildcardTag { wildcard: true }),
        }
    }
}

impl From<&str> for Criterion {
    fn from(value: &str) -> Self {
        Self::Exact(value.to_string())
    }
}

/// Criteria keyed by header name or query key
pub type Criteria = BTreeMap<String, Criterion>;

/// One recorded request definition and its response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureDefinition {
    /// Request method, or `*` for any
    pub method: String,
    /// Header criteria; names compare case-insensitively
    #[serde(default)]
    pub headers: Criteria,
    /// Query criteria
    #[serde(default)]
    pub query: Criteria,
    /// Response to replay
    pub response: FixtureResponse,
    /// Request actually executed when this entry was last updated.
    /// Kept for audit only, never used in matching.
    #[serde(
        rename = "_executed_request",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub executed_request: Option<ExecutedRequest>,
}

/// Stored response for a definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers; repeated headers keep every value in order
    #[serde(default)]
    pub headers: BTreeMap<String, HeaderValues>,
    /// Body file relative to the index directory, `None` for an empty body
    #[serde(default)]
    pub body_file: Option<String>,
}

/// Values of one stored response header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValues {
    /// Header sent once
    One(String),
    /// Header sent several times, e.g. `set-cookie`
    Many(Vec<String>),
}

impl HeaderValues {
    /// All values in the order they were received
    pub fn as_slice(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }

    fn push(&mut self, value: String) {
        match self {
            Self::One(first) => *self = Self::Many(vec![std::mem::take(first), value]),
            Self::Many(values) => values.push(value),
        }
    }
}

impl From<&str> for HeaderValues {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

/// Raw request data stashed on update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutedRequest {
    /// Request method
    pub method: String,
    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query parameters
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl FixtureDefinition {
    /// A definition requiring exactly this request's method, headers and query
    pub fn from_request(request: &Request, response: FixtureResponse) -> Self {
        let executed = ExecutedRequest::from_request(request);
        Self {
            method: executed.method,
            headers: exact_criteria(executed.headers),
            query: exact_criteria(executed.query),
            response,
            executed_request: None,
        }
    }
}

impl FixtureResponse {
    /// Status and headers of `response`, with the given body file
    pub fn from_response(response: &Response, body_file: Option<String>) -> Self {
        let mut headers: BTreeMap<String, HeaderValues> = BTreeMap::new();
        for (name, value) in &response.headers {
            match headers.get_mut(&name.to_ascii_lowercase()) {
                Some(values) => values.push(value.clone()),
                None => {
                    headers.insert(name.to_ascii_lowercase(), HeaderValues::One(value.clone()));
                }
            }
        }

        Self {
            status: response.status,
            headers,
            body_file,
        }
    }
}

impl ExecutedRequest {
    /// Method, headers (lowercased names) and query of `request`
    pub fn from_request(request: &Request) -> Self {
        Self {
            method: request.method.clone(),
            headers: request
                .headers
                .iter()
                .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
                .collect(),
            query: request.query.iter().cloned().collect(),
        }
    }
}

fn exact_criteria(values: BTreeMap<String, String>) -> Criteria {
    values
        .into_iter()
        .map(|(key, value)| (key, Criterion::Exact(value)))
        .collect()
}

/// Read an index file.
///
/// A missing file is an empty index; a malformed one is an error.
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn read_index(path: &Path) -> Result<Option<Vec<FixtureDefinition>>> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| MimicError::InvalidIndex {
            path: path.to_path_buf(),
            source,
        })
}

/// Write an index file, replacing any existing one atomically
///
/// # Errors
///
/// Returns error if serialization or any filesystem step fails
pub fn write_index(path: &Path, definitions: &[FixtureDefinition]) -> Result<()> {
    let mut content =
        serde_json::to_vec_pretty(definitions).map_err(|source| MimicError::InvalidIndex {
            path: path.to_path_buf(),
            source,
        })?;
    content.push(b'\n');

    let temp_path = temp_path_for(path);
    fs::write(&temp_path, &content)?;
    fs::rename(&temp_path, path)?;

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_hand_written_index() {
        let json = r#"[
            {
                "method": "GET",
                "headers": {"x-test": "foo", "authorization": {"__mimic_wildcard__": true}},
                "query": {"page": 1},
                "response": {"status": 201, "headers": {"x-mimic-id": "1"}, "body_file": null}
            },
            {
                "method": "*",
                "response": {"status": 404}
            }
        ]"#;

        let definitions: Vec<FixtureDefinition> = serde_json::from_str(json).unwrap();
        assert_eq!(definitions.len(), 2);

        let first = &definitions[0];
        assert_eq!(first.headers["x-test"], Criterion::Exact("foo".to_string()));
        assert_eq!(first.headers["authorization"], Criterion::Present);
        assert_eq!(first.query["page"], Criterion::Exact("1".to_string()));
        assert_eq!(first.response.body_file, None);

        let second = &definitions[1];
        assert_eq!(second.method, ANY_METHOD);
        assert!(second.headers.is_empty());
        assert!(second.query.is_empty());
        assert!(second.response.headers.is_empty());
    }

    #[test]
    fn test_wildcard_serializes_as_tagged_object() {
        let value = serde_json::to_value(Criterion::Present).unwrap();
        assert_eq!(value, serde_json::json!({ "__mimic_wildcard__": true }));

        let value = serde_json::to_value(Criterion::from("bar")).unwrap();
        assert_eq!(value, serde_json::json!("bar"));
    }

    #[test]
    fn test_wildcard_false_rejected() {
        let result: std::result::Result<Criterion, _> =
            serde_json::from_str(r#"{"__mimic_wildcard__": false}"#);
        assert!(result.is_err());

        let result: std::result::Result<Criterion, _> =
            serde_json::from_str(r#"{"something_else": true}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_executed_request_omitted_until_set() {
        let request = Request::new("GET", "http://foo.bar.com/").with_header("X-Test", "foo");
        let definition =
            FixtureDefinition::from_request(&request, FixtureResponse::from_response(&Response::new(200), None));

        let value = serde_json::to_value(&definition).unwrap();
        assert!(value.get("_executed_request").is_none());
        assert_eq!(value["headers"]["x-test"], "foo");
    }

    #[test]
    fn test_repeated_response_headers_kept() {
        let response = Response::new(200)
            .with_header("Set-Cookie", "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT")
            .with_header("Content-Type", "text/plain")
            .with_header("set-cookie", "b=2");
        let stored = FixtureResponse::from_response(&response, None);

        assert_eq!(stored.headers["content-type"], HeaderValues::from("text/plain"));
        assert_eq!(
            stored.headers["set-cookie"].as_slice(),
            ["a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT", "b=2"]
        );

        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["headers"]["content-type"], "text/plain");
        assert_eq!(
            value["headers"]["set-cookie"],
            serde_json::json!(["a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT", "b=2"])
        );
    }

    #[test]
    fn test_missing_index_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(read_index(&dir.path().join(INDEX_FILE)).unwrap().is_none());
    }

    #[test]
    fn test_malformed_index_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);
        std::fs::write(&path, "[{\"method\": ").unwrap();

        assert!(matches!(
            read_index(&path),
            Err(MimicError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE);

        let mut definition = FixtureDefinition::from_request(
            &Request::new("POST", "http://foo.bar.com/").with_query("b", "2").with_query("a", "1"),
            FixtureResponse {
                status: 201,
                headers: BTreeMap::from([("content-type".to_string(), "text/plain".into())]),
                body_file: Some("response_0.body".to_string()),
            },
        );
        definition.query.insert("token".to_string(), Criterion::Present);

        write_index(&path, &[definition.clone()]).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("]\n"));
        assert!(content.find("\"a\"").unwrap() < content.find("\"b\"").unwrap());

        let read = read_index(&path).unwrap().unwrap();
        assert_eq!(read, vec![definition]);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }
}
