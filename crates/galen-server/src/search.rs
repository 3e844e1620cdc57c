//! Search argument assembly and typing.
//!
//! Search handlers receive a [`SearchArgs`] holding the already-validated
//! query values for the legal parameters of their resource type. Values
//! arrive from the URL query string and, for `POST /{type}/_search`, from
//! the form body as well; the two sources are merged before validation.

use galen_catalog::{Catalog, SearchParamType};
use galen_core::{FhirError, IssueCode};

/// Validated search parameter values, in request order.
///
/// Repeated parameters are preserved: `?_id=a&_id=b` yields two entries
/// under `_id`. Parameters that are not legal for the resource type are
/// dropped before the handler sees them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchArgs {
    values: Vec<(String, String)>,
}

impl SearchArgs {
    /// Creates an empty argument set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first value for a parameter, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns all values for a parameter, in request order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.values
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns whether the parameter was supplied.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(n, _)| n == name)
    }

    /// Returns all (name, value) pairs in request order.
    #[must_use]
    pub fn pairs(&self) -> &[(String, String)] {
        &self.values
    }

    /// Returns `true` if no parameters were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Result-control prefixes a date or number value may carry.
const COMPARATOR_PREFIXES: [&str; 8] = ["eq", "ne", "gt", "lt", "ge", "le", "sa", "eb"];

/// Builds a [`SearchArgs`] from raw (name, value) pairs.
///
/// Pairs whose name is not a legal search parameter of `resource_type` are
/// silently dropped, as are underscore-prefixed control parameters handled
/// by the transport layer (`_pretty`, `_format`). Legal pairs are checked
/// against the parameter's declared type.
///
/// # Errors
///
/// Returns a 400 `FhirError` when a value fails its type check, e.g. a
/// non-integer `_count` or an unparseable `_lastUpdated`.
pub fn collect_search_args(
    catalog: &Catalog,
    resource_type: &str,
    pairs: &[(String, String)],
) -> Result<SearchArgs, FhirError> {
    let mut values = Vec::new();

    for (name, value) in pairs {
        let Some(spec) = catalog.search_parameter(resource_type, name) else {
            continue;
        };
        check_value_type(name, spec.param_type(), value)?;
        values.push((name.clone(), value.clone()));
    }

    Ok(SearchArgs { values })
}

fn check_value_type(
    name: &str,
    param_type: SearchParamType,
    value: &str,
) -> Result<(), FhirError> {
    match param_type {
        SearchParamType::Number => {
            let stripped = strip_comparator(value);
            if stripped.parse::<i64>().is_err() {
                return Err(FhirError::invalid_with_code(
                    IssueCode::Value,
                    format!("search parameter '{name}' expects a number, got '{value}'"),
                ));
            }
        }
        SearchParamType::Date => {
            let stripped = strip_comparator(value);
            if !is_valid_date(stripped) {
                return Err(FhirError::invalid_with_code(
                    IssueCode::Value,
                    format!("search parameter '{name}' expects a date, got '{value}'"),
                ));
            }
        }
        // String, token, reference, uri, quantity, and composite values
        // are opaque to the transport layer.
        _ => {}
    }
    Ok(())
}

fn strip_comparator(value: &str) -> &str {
    for prefix in COMPARATOR_PREFIXES {
        if let Some(rest) = value.strip_prefix(prefix) {
            // Only treat it as a comparator when something follows.
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    value
}

/// Accepts the date forms the protocol allows: YYYY, YYYY-MM,
/// YYYY-MM-DD, and full timestamps with an optional offset.
fn is_valid_date(value: &str) -> bool {
    if chrono::DateTime::parse_from_rfc3339(value).is_ok() {
        return true;
    }
    if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
        return true;
    }
    match value.len() {
        4 => value.parse::<u16>().is_ok(),
        7 => chrono::NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galen_catalog::{FhirVersion, SearchParamSpec};

    fn catalog() -> Catalog {
        Catalog::builder(FhirVersion::R4B)
            .custom_parameter(
                "Patient",
                SearchParamSpec::builder("nickname", SearchParamType::String)
                    .description("Nickname")
                    .uri("https://example.org/sp/nickname")
                    .build(),
            )
            .unwrap()
            .build()
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_legal_parameters_collected() {
        let args = collect_search_args(
            &catalog(),
            "Patient",
            &pairs(&[("nickname", "Bob"), ("_id", "abc")]),
        )
        .unwrap();

        assert_eq!(args.get("nickname"), Some("Bob"));
        assert_eq!(args.get("_id"), Some("abc"));
    }

    #[test]
    fn test_unknown_parameters_dropped() {
        let args = collect_search_args(
            &catalog(),
            "Patient",
            &pairs(&[("favorite-color", "blue"), ("nickname", "Bob")]),
        )
        .unwrap();

        assert!(!args.contains("favorite-color"));
        assert!(args.contains("nickname"));
    }

    #[test]
    fn test_repeated_values_preserved_in_order() {
        let args = collect_search_args(
            &catalog(),
            "Patient",
            &pairs(&[("_id", "a"), ("_id", "b")]),
        )
        .unwrap();

        let all: Vec<&str> = args.get_all("_id").collect();
        assert_eq!(all, ["a", "b"]);
    }

    #[test]
    fn test_number_type_checked() {
        let err = collect_search_args(&catalog(), "Patient", &pairs(&[("_count", "ten")]))
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);

        let ok = collect_search_args(&catalog(), "Patient", &pairs(&[("_count", "10")]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_date_type_checked() {
        for good in ["2024", "2024-03", "2024-03-01", "2024-03-01T10:00:00Z", "ge2024-03-01"] {
            let result =
                collect_search_args(&catalog(), "Patient", &pairs(&[("_lastUpdated", good)]));
            assert!(result.is_ok(), "expected '{good}' to be accepted");
        }

        let err =
            collect_search_args(&catalog(), "Patient", &pairs(&[("_lastUpdated", "yesterday")]))
                .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_comparator_prefix_stripped_for_number() {
        let ok = collect_search_args(&catalog(), "Patient", &pairs(&[("_count", "le5")]));
        assert!(ok.is_ok());
    }

    #[test]
    fn test_empty_args() {
        let args = SearchArgs::new();
        assert!(args.is_empty());
        assert_eq!(args.get("anything"), None);
    }
}
