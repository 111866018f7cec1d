//! First-match-wins selection of a fixture definition

use std::collections::BTreeMap;

use super::index::{Criteria, Criterion, FixtureDefinition, ANY_METHOD};
use crate::request::Request;

/// Position of the first definition matching `request`, in file order
pub fn find_match(definitions: &[FixtureDefinition], request: &Request) -> Option<usize> {
    definitions
        .iter()
        .position(|definition| definition_matches(definition, request))
}

/// Method, then headers, then query
pub fn definition_matches(definition: &FixtureDefinition, request: &Request) -> bool {
    method_matches(&request.method, &definition.method)
        && criteria_match(&request.headers, &definition.headers, true)
        && criteria_match(&request.query, &definition.query, false)
}

/// Exact method, `HEAD` against `GET`, or the `*` wildcard
pub fn method_matches(request_method: &str, criterion: &str) -> bool {
    request_method == criterion
        || (request_method == "HEAD" && criterion == "GET")
        || criterion == ANY_METHOD
}

/// Every criterion satisfied and no request key left unlisted.
///
/// With `fold_case` keys compare ASCII case-insensitively (header names).
pub fn criteria_match(values: &[(String, String)], criteria: &Criteria, fold_case: bool) -> bool {
    let normalize = |key: &str| {
        if fold_case {
            key.to_ascii_lowercase()
        } else {
            key.to_string()
        }
    };

    let mut remaining: BTreeMap<String, &str> = values
        .iter()
        .map(|(key, value)| (normalize(key), value.as_str()))
        .collect();

    for (key, criterion) in criteria {
        let Some(value) = remaining.remove(&normalize(key)) else {
            return false;
        };

        let satisfied = match criterion {
            Criterion::Exact(expected) => value == expected,
            Criterion::Present => !value.is_empty(),
        };
        if !satisfied {
            return false;
        }
    }

    remaining.is_empty()
}
