//! The resource-model seam.
//!
//! Galen treats the FHIR resource model as an external collaborator: any type
//! implementing [`FhirResource`] can be registered for interactions. The
//! framework only relies on the type name, the logical [`Id`], and serde.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a FHIR logical id.
const ID_MAX_LEN: usize = 64;

/// Error returned when a string does not satisfy the FHIR id grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid FHIR id '{value}': {reason}")]
pub struct IdError {
    /// The rejected value.
    pub value: String,
    /// Why the value was rejected.
    pub reason: &'static str,
}

/// A FHIR logical id.
///
/// Ids are constrained to the protocol grammar: 1 to 64 characters, each an
/// ASCII letter, digit, `-`, or `.`. Construction validates the grammar, so
/// a held `Id` is always well-formed.
///
/// # Example
///
/// ```
/// use galen_core::Id;
///
/// let id = Id::new("patient-123").unwrap();
/// assert_eq!(id.as_str(), "patient-123");
/// assert!(Id::new("no/slashes").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id(String);

impl Id {
    /// Creates an id, validating it against the FHIR id grammar.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError {
                value,
                reason: "must not be empty",
            });
        }
        if value.len() > ID_MAX_LEN {
            return Err(IdError {
                value,
                reason: "must be at most 64 characters",
            });
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        {
            return Err(IdError {
                value,
                reason: "may only contain ASCII letters, digits, '-', and '.'",
            });
        }
        Ok(Self(value))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Id {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl std::str::FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

/// A strongly-typed FHIR resource.
///
/// Implemented by every structural type a developer registers interactions
/// for. The framework uses `TYPE` for route paths and the capability
/// statement, and `id()` to derive the `Location` header on create.
///
/// # Example
///
/// ```
/// use galen_core::{FhirResource, Id};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Patient {
///     resource_type: String,
///     id: Option<Id>,
///     name: Vec<String>,
/// }
///
/// impl FhirResource for Patient {
///     const TYPE: &'static str = "Patient";
///
///     fn id(&self) -> Option<&Id> {
///         self.id.as_ref()
///     }
/// }
/// ```
pub trait FhirResource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The protocol resource type name (e.g. "Patient").
    const TYPE: &'static str;

    /// The logical id of this instance, if assigned.
    fn id(&self) -> Option<&Id>;
}

/// Search mode of a bundle entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEntryMode {
    /// The entry matched the search criteria.
    Match,
    /// The entry was included because a matched entry referenced it.
    Include,
    /// The entry is an `OperationOutcome` about the search process.
    Outcome,
}

/// `search` element of a bundle entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntrySearch {
    /// How the entry relates to the search.
    pub mode: SearchEntryMode,
}

/// One entry in a [`Bundle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleEntry {
    /// Absolute URL of the resource, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_url: Option<String>,
    /// The resource content.
    pub resource: serde_json::Value,
    /// Search-related metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<BundleEntrySearch>,
}

/// The FHIR `Bundle` envelope used for search results.
///
/// Only the searchset shape is modelled; handlers for search interactions
/// return one of these.
///
/// # Example
///
/// ```
/// use galen_core::Bundle;
///
/// let bundle = Bundle::searchset([serde_json::json!({
///     "resourceType": "Patient",
///     "id": "p1",
/// })]);
/// assert_eq!(bundle.total, Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Always "Bundle".
    pub resource_type: String,
    /// The bundle type; "searchset" for search results.
    #[serde(rename = "type")]
    pub bundle_type: String,
    /// Total number of matches across all pages, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// The entries in this page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// Builds a searchset bundle from serialized resources.
    ///
    /// `total` is set to the number of entries; callers paging across larger
    /// result sets should override it.
    #[must_use]
    pub fn searchset(resources: impl IntoIterator<Item = serde_json::Value>) -> Self {
        let entry: Vec<BundleEntry> = resources
            .into_iter()
            .map(|resource| BundleEntry {
                full_url: None,
                resource,
                search: Some(BundleEntrySearch {
                    mode: SearchEntryMode::Match,
                }),
            })
            .collect();
        Self {
            resource_type: "Bundle".to_string(),
            bundle_type: "searchset".to_string(),
            total: Some(entry.len() as u64),
            entry,
        }
    }

    /// Builds a searchset bundle from typed resources.
    ///
    /// Serialization failures are skipped; resources registered with Galen
    /// serialize infallibly in practice.
    #[must_use]
    pub fn searchset_of<R: FhirResource>(resources: impl IntoIterator<Item = R>) -> Self {
        Self::searchset(
            resources
                .into_iter()
                .filter_map(|r| serde_json::to_value(&r).ok()),
        )
    }

    /// Overrides the total match count.
    #[must_use]
    pub fn with_total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_valid_grammar() {
        for value in ["a", "123", "patient-1.2", "A-B.c", &"x".repeat(64)] {
            assert!(Id::new(value).is_ok(), "'{value}' should be a valid id");
        }
    }

    #[test]
    fn test_id_rejects_invalid_grammar() {
        for value in ["", "has space", "no/slash", "under_score", &"x".repeat(65)] {
            assert!(Id::new(value).is_err(), "'{value}' should be rejected");
        }
    }

    #[test]
    fn test_id_serde_round_trip() {
        let id = Id::new("patient-123").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"patient-123\"");
        let parsed: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_id_deserialization_validates() {
        let result: Result<Id, _> = serde_json::from_str("\"not valid!\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_searchset_bundle() {
        let bundle = Bundle::searchset([
            serde_json::json!({"resourceType": "Patient", "id": "p1"}),
            serde_json::json!({"resourceType": "Patient", "id": "p2"}),
        ]);

        assert_eq!(bundle.resource_type, "Bundle");
        assert_eq!(bundle.bundle_type, "searchset");
        assert_eq!(bundle.total, Some(2));
        assert_eq!(bundle.entry.len(), 2);
        assert_eq!(
            bundle.entry[0].search.as_ref().unwrap().mode,
            SearchEntryMode::Match
        );
    }

    #[test]
    fn test_searchset_serialization_shape() {
        let bundle = Bundle::searchset([serde_json::json!({"resourceType": "Patient"})]);
        let json = serde_json::to_value(&bundle).unwrap();
        assert_eq!(json["resourceType"], "Bundle");
        assert_eq!(json["type"], "searchset");
        assert_eq!(json["entry"][0]["search"]["mode"], "match");
    }

    #[test]
    fn test_empty_searchset_omits_entry() {
        let bundle = Bundle::searchset([]);
        assert_eq!(bundle.total, Some(0));
        let json = serde_json::to_string(&bundle).unwrap();
        assert!(!json.contains("\"entry\""));
    }
}
