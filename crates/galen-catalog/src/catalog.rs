//! The resource type catalog.
//!
//! A [`Catalog`] holds, per resource type, the ordered set of legal search
//! parameters: the built-in parameters every resource type supports, merged
//! with deployment-defined custom parameters. Built once at assembly time
//! and immutable afterwards.

use indexmap::IndexMap;
use thiserror::Error;

use crate::param::{SearchParamSpec, SearchParamType};
use crate::version::FhirVersion;

/// Errors raised while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A custom parameter collides with a built-in parameter name.
    #[error("custom search parameter '{name}' for {resource_type} collides with a built-in parameter")]
    ParameterCollision {
        /// The colliding parameter name.
        name: String,
        /// The resource type the parameter was declared for.
        resource_type: String,
    },

    /// A custom parameter was declared twice for the same resource type.
    #[error("custom search parameter '{name}' for {resource_type} is declared more than once")]
    DuplicateParameter {
        /// The duplicated parameter name.
        name: String,
        /// The resource type the parameter was declared for.
        resource_type: String,
    },
}

/// The immutable search-parameter catalog for one protocol version.
///
/// # Example
///
/// ```
/// use galen_catalog::{Catalog, FhirVersion, SearchParamSpec, SearchParamType};
///
/// let catalog = Catalog::builder(FhirVersion::R4B)
///     .custom_parameter(
///         "Patient",
///         SearchParamSpec::builder("nickname", SearchParamType::String)
///             .description("Nickname")
///             .uri("https://example.org/sp/nickname")
///             .build(),
///     )
///     .unwrap()
///     .build();
///
/// let params = catalog.search_parameters("Patient");
/// assert!(params.iter().any(|p| p.name() == "_id"));
/// assert!(params.iter().any(|p| p.name() == "nickname"));
/// ```
#[derive(Debug, Clone)]
pub struct Catalog {
    version: FhirVersion,
    builtin: Vec<SearchParamSpec>,
    custom: IndexMap<String, Vec<SearchParamSpec>>,
}

impl Catalog {
    /// Creates a catalog builder for the given protocol version.
    #[must_use]
    pub fn builder(version: FhirVersion) -> CatalogBuilder {
        CatalogBuilder {
            version,
            custom: IndexMap::new(),
        }
    }

    /// Returns the protocol version this catalog was built for.
    #[must_use]
    pub const fn version(&self) -> FhirVersion {
        self.version
    }

    /// Returns the full legal search-parameter set for a resource type:
    /// built-ins first (in fixed order), then custom parameters sorted by
    /// name. The ordering is deterministic across runs.
    #[must_use]
    pub fn search_parameters(&self, resource_type: &str) -> Vec<SearchParamSpec> {
        let mut params = self.builtin.clone();
        if let Some(custom) = self.custom.get(resource_type) {
            params.extend(custom.iter().cloned());
        }
        params
    }

    /// Returns the descriptor for one parameter of a resource type, if legal.
    #[must_use]
    pub fn search_parameter(&self, resource_type: &str, name: &str) -> Option<SearchParamSpec> {
        self.builtin
            .iter()
            .find(|p| p.name() == name)
            .or_else(|| {
                self.custom
                    .get(resource_type)
                    .and_then(|params| params.iter().find(|p| p.name() == name))
            })
            .cloned()
    }

    /// Returns whether `name` is a legal search parameter for the type.
    #[must_use]
    pub fn is_legal_parameter(&self, resource_type: &str, name: &str) -> bool {
        self.search_parameter(resource_type, name).is_some()
    }
}

/// Builder for [`Catalog`].
#[derive(Debug)]
pub struct CatalogBuilder {
    version: FhirVersion,
    custom: IndexMap<String, Vec<SearchParamSpec>>,
}

impl CatalogBuilder {
    /// Declares one custom search parameter for a resource type.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::ParameterCollision`] if the name collides
    /// with a built-in parameter, or [`CatalogError::DuplicateParameter`] if
    /// the same custom name is declared twice for one resource type.
    pub fn custom_parameter(
        mut self,
        resource_type: impl Into<String>,
        spec: SearchParamSpec,
    ) -> Result<Self, CatalogError> {
        let resource_type = resource_type.into();

        if builtin_parameters().iter().any(|p| p.name() == spec.name()) {
            return Err(CatalogError::ParameterCollision {
                name: spec.name().to_string(),
                resource_type,
            });
        }

        let params = self.custom.entry(resource_type.clone()).or_default();
        if params.iter().any(|p| p.name() == spec.name()) {
            return Err(CatalogError::DuplicateParameter {
                name: spec.name().to_string(),
                resource_type,
            });
        }

        params.push(spec);
        Ok(self)
    }

    /// Declares many custom parameters at once.
    pub fn custom_parameters<I>(mut self, parameters: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (String, SearchParamSpec)>,
    {
        for (resource_type, spec) in parameters {
            self = self.custom_parameter(resource_type, spec)?;
        }
        Ok(self)
    }

    /// Builds the immutable catalog.
    ///
    /// Custom parameters are sorted by name per resource type, and resource
    /// types are sorted by name, so iteration order is stable across runs
    /// with identical configuration.
    #[must_use]
    pub fn build(mut self) -> Catalog {
        for params in self.custom.values_mut() {
            params.sort_by(|a, b| a.name().cmp(b.name()));
        }
        self.custom.sort_keys();
        Catalog {
            version: self.version,
            builtin: builtin_parameters(),
            custom: self.custom,
        }
    }
}

/// The built-in search parameters every resource type supports.
///
/// `_id` and `_lastUpdated` are capability-visible; `_count` and `_sort`
/// are accepted on every search but are result parameters, not search
/// criteria, and are left out of the capability statement.
fn builtin_parameters() -> Vec<SearchParamSpec> {
    vec![
        SearchParamSpec::builder("_id", SearchParamType::Token)
            .description("Logical id of this artifact")
            .uri("http://hl7.org/fhir/SearchParameter/Resource-id")
            .build(),
        SearchParamSpec::builder("_lastUpdated", SearchParamType::Date)
            .description("When the resource version last changed")
            .uri("http://hl7.org/fhir/SearchParameter/Resource-lastUpdated")
            .build(),
        SearchParamSpec::builder("_count", SearchParamType::Number)
            .description("Number of results per page")
            .uri("http://hl7.org/fhir/SearchParameter/Resource-count")
            .include_in_capability(false)
            .build(),
        SearchParamSpec::builder("_sort", SearchParamType::String)
            .description("Order to sort results in")
            .uri("http://hl7.org/fhir/SearchParameter/Resource-sort")
            .include_in_capability(false)
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nickname() -> SearchParamSpec {
        SearchParamSpec::builder("nickname", SearchParamType::String)
            .description("Nickname")
            .uri("https://example.org/sp/nickname")
            .build()
    }

    #[test]
    fn test_builtin_set_always_present() {
        let catalog = Catalog::builder(FhirVersion::R4B).build();
        let params = catalog.search_parameters("Patient");
        let names: Vec<&str> = params.iter().map(SearchParamSpec::name).collect();
        assert_eq!(names, ["_id", "_lastUpdated", "_count", "_sort"]);
    }

    #[test]
    fn test_custom_parameter_merged() {
        let catalog = Catalog::builder(FhirVersion::R4B)
            .custom_parameter("Patient", nickname())
            .unwrap()
            .build();

        assert!(catalog.is_legal_parameter("Patient", "nickname"));
        // Custom parameters are scoped to their resource type.
        assert!(!catalog.is_legal_parameter("Observation", "nickname"));
        // Built-ins are legal for every type.
        assert!(catalog.is_legal_parameter("Observation", "_id"));
    }

    #[test]
    fn test_builtin_collision_rejected() {
        let result = Catalog::builder(FhirVersion::R4B).custom_parameter(
            "Patient",
            SearchParamSpec::builder("_id", SearchParamType::String).build(),
        );
        assert!(matches!(
            result,
            Err(CatalogError::ParameterCollision { .. })
        ));
    }

    #[test]
    fn test_duplicate_custom_rejected() {
        let result = Catalog::builder(FhirVersion::R4B)
            .custom_parameter("Patient", nickname())
            .unwrap()
            .custom_parameter("Patient", nickname());
        assert!(matches!(
            result,
            Err(CatalogError::DuplicateParameter { .. })
        ));
    }

    #[test]
    fn test_deterministic_ordering() {
        let build = || {
            Catalog::builder(FhirVersion::R4B)
                .custom_parameter(
                    "Patient",
                    SearchParamSpec::builder("zeta", SearchParamType::String).build(),
                )
                .unwrap()
                .custom_parameter(
                    "Patient",
                    SearchParamSpec::builder("alpha", SearchParamType::String).build(),
                )
                .unwrap()
                .build()
        };

        let a: Vec<String> = build()
            .search_parameters("Patient")
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        let b: Vec<String> = build()
            .search_parameters("Patient")
            .iter()
            .map(|p| p.name().to_string())
            .collect();

        assert_eq!(a, b);
        // Custom parameters come after built-ins, sorted by name.
        assert_eq!(&a[4..], ["alpha", "zeta"]);
    }

    #[test]
    fn test_capability_visibility_flags() {
        let catalog = Catalog::builder(FhirVersion::R4B).build();
        let visible: Vec<String> = catalog
            .search_parameters("Patient")
            .iter()
            .filter(|p| p.include_in_capability())
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(visible, ["_id", "_lastUpdated"]);
    }
}
