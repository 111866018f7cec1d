//! Fixture storage: matching requests against recorded definitions on disk
//!
//! Every distinct (scheme, host, path) gets one directory under the active
//! scenario, holding a `request_index.json` and the response body files its
//! definitions point to. Methods, headers and query strings that share a
//! path are told apart inside the index, not by separate files.

mod index;
mod matcher;

use std::fs;
use std::path::PathBuf;

use bytes::Bytes;
use tracing::{debug, info};

pub use index::{
    read_index, write_index, Criteria, Criterion, ExecutedRequest, FixtureDefinition,
    FixtureResponse, HeaderValues, ANY_METHOD, INDEX_FILE, WILDCARD_TAG,
};
pub use matcher::{criteria_match, definition_matches, find_match, method_matches};

use crate::config::PathLayout;
use crate::request::{Request, Response};
use crate::session::Mimic;
use crate::{MimicError, Result};

/// Debug header carrying the index file path
pub const DEBUG_INDEX_FILE_HEADER: &str = "x-mimic-indexfile";

/// Debug header carrying the number of definitions in the index
pub const DEBUG_DEFINITION_COUNT_HEADER: &str = "x-mimic-definitioncount";

/// Debug header carrying the zero-based position of the matched definition
pub const DEBUG_MATCHED_INDEX_HEADER: &str = "x-mimic-matchedindex";

/// Loads and records fixtures for the session's active scenario
pub struct FixtureStore<'a> {
    mimic: &'a Mimic,
}

/// Result of searching one index file
struct IndexSearch {
    dir: PathBuf,
    index_path: PathBuf,
    definitions: Vec<FixtureDefinition>,
    matched: Option<usize>,
}

impl<'a> FixtureStore<'a> {
    /// Create a store reading settings from `mimic`
    pub fn new(mimic: &'a Mimic) -> Self {
        Self { mimic }
    }

    /// Directory holding the index and bodies for a request's path
    ///
    /// # Errors
    ///
    /// Returns error if the URI is not absolute or its path contains `.` or `..`
    pub fn request_store_path(&self, request: &Request) -> Result<PathBuf> {
        let target = request.target()?;

        let mut path = self.mimic.mime_path();
        path.push(&target.scheme);
        match self.mimic.path_layout() {
            PathLayout::Flat => path.push(&target.host),
            PathLayout::SplitHost => {
                for label in target.host.split('.').filter(|label| !label.is_empty()) {
                    path.push(label);
                }
            }
        }

        for segment in target.path.split('/').filter(|segment| !segment.is_empty()) {
            if segment == "." || segment == ".." {
                return Err(MimicError::InvalidUri(format!(
                    "'{}' contains a relative path segment",
                    request.uri
                )));
            }
            path.push(segment);
        }

        Ok(path)
    }

    /// Find a stored response for the request
    ///
    /// Returns `None` when no index exists for the path or no definition matches.
    ///
    /// # Errors
    ///
    /// Returns error if the index is malformed or a body file cannot be read
    pub fn load(&self, request: &Request) -> Result<Option<Response>> {
        let search = self.search(request)?;
        let Some(position) = search.matched else {
            debug!("No fixture for {} {}", request.method, request.url());
            return Ok(None);
        };

        let stored = &search.definitions[position].response;
        let body = match &stored.body_file {
            Some(file) => Bytes::from(fs::read(search.dir.join(file))?),
            None => Bytes::new(),
        };

        let mut response = Response {
            status: stored.status,
            headers: stored
                .headers
                .iter()
                .flat_map(|(name, values)| {
                    values
                        .as_slice()
                        .iter()
                        .map(move |value| (name.clone(), value.clone()))
                })
                .collect(),
            body,
        };

        if self.mimic.debug_headers() {
            response.headers.push((
                DEBUG_INDEX_FILE_HEADER.to_string(),
                search.index_path.display().to_string(),
            ));
            response.headers.push((
                DEBUG_DEFINITION_COUNT_HEADER.to_string(),
                search.definitions.len().to_string(),
            ));
            response
                .headers
                .push((DEBUG_MATCHED_INDEX_HEADER.to_string(), position.to_string()));
        }

        debug!(
            "Matched {} {} to definition {} of {}",
            request.method,
            request.url(),
            position,
            search.index_path.display()
        );

        Ok(Some(response))
    }

    /// Persist an executed request and its response.
    ///
    /// Unmatched requests are appended as new definitions. A matched
    /// definition keeps its criteria, gets its response replaced and the
    /// executed request stashed under `_executed_request`.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::NotExecuted`] if no response is attached,
    /// [`MimicError::UpdatingDisabled`] if a definition matched but updating
    /// is off, or any filesystem error
    pub fn record(&self, request: &Request) -> Result<()> {
        let Some(response) = request.response() else {
            return Err(MimicError::NotExecuted {
                method: request.method.clone(),
                uri: request.uri.clone(),
            });
        };

        let mut search = self.search(request)?;
        let position = match search.matched {
            Some(position) if !self.mimic.enable_updating() => {
                return Err(MimicError::UpdatingDisabled {
                    position,
                    path: search.dir,
                });
            }
            Some(position) => position,
            None => search.definitions.len(),
        };

        fs::create_dir_all(&search.dir)?;

        let formatter = self
            .mimic
            .formatters()
            .formatter_for(response.header("content-type"));
        let body_file =
            formatter.put_contents(&search.dir, &format!("response_{position}"), &response.body)?;
        let stored = FixtureResponse::from_response(response, Some(body_file));

        match search.matched {
            Some(position) => {
                let entry = &mut search.definitions[position];
                entry.executed_request = Some(ExecutedRequest::from_request(request));
                entry.response = stored;
            }
            None => search
                .definitions
                .push(FixtureDefinition::from_request(request, stored)),
        }

        write_index(&search.index_path, &search.definitions)?;

        info!(
            "{} definition {} in {} for {} {}",
            if search.matched.is_some() { "Updated" } else { "Recorded" },
            position,
            search.index_path.display(),
            request.method,
            request.url()
        );

        Ok(())
    }

    fn search(&self, request: &Request) -> Result<IndexSearch> {
        let dir = self.request_store_path(request)?;
        let index_path = dir.join(INDEX_FILE);
        let definitions = read_index(&index_path)?.unwrap_or_default();
        let matched = find_match(&definitions, request);

        Ok(IndexSearch {
            dir,
            index_path,
            definitions,
            matched,
        })
    }
}
