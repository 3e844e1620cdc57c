//! Capability statement construction.
//!
//! The capability statement is built once at assembly time from the
//! synthesized route descriptors and the search-parameter catalog, then
//! served verbatim from `GET /metadata`. Identical registrations always
//! produce an identical document: resource types are sorted by name and
//! interaction codes follow the fixed kind order.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use galen_catalog::{Catalog, FhirVersion};
use galen_core::{InteractionContext, InteractionKind};

use crate::synthesis::RouteSpec;

/// The server conformance document served from `GET /metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatement {
    /// Always "CapabilityStatement".
    pub resource_type: String,
    /// Publication status; always "active".
    pub status: String,
    /// Assembly timestamp, RFC 3339.
    pub date: String,
    /// Always "instance".
    pub kind: String,
    /// Publisher name from configuration, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Protocol version string, e.g. "4.3.0".
    pub fhir_version: String,
    /// Supported wire formats.
    pub format: Vec<String>,
    /// REST capabilities.
    pub rest: Vec<RestComponent>,
}

/// One REST endpoint description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestComponent {
    /// Always "server".
    pub mode: String,
    /// Per-resource-type capabilities, sorted by type name.
    pub resource: Vec<ResourceComponent>,
}

/// Capabilities for one resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceComponent {
    /// The resource type name.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Supported interactions, in fixed kind order.
    pub interaction: Vec<InteractionComponent>,
    /// Capability-visible search parameters, built-ins first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<SearchParamComponent>,
}

/// One supported interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionComponent {
    /// The interaction code, e.g. "search-type".
    pub code: String,
}

/// One capability-visible search parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParamComponent {
    /// Parameter name.
    pub name: String,
    /// Canonical definition URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    /// Parameter value type.
    #[serde(rename = "type")]
    pub param_type: String,
    /// Human-readable documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

/// Per-request hook that may rewrite the capability statement.
///
/// The hook receives a clone of the assembled document plus the request
/// context and returns the document to serve; its output is emitted
/// verbatim.
pub type CapabilityModifier =
    Arc<dyn Fn(CapabilityStatement, &InteractionContext) -> CapabilityStatement + Send + Sync>;

impl CapabilityStatement {
    /// Builds the statement from synthesized route descriptors.
    ///
    /// Routes registered with `include_in_capability = false` are left
    /// out, as are search parameters flagged hidden in the catalog.
    #[must_use]
    pub fn build(
        version: FhirVersion,
        publisher: Option<String>,
        specs: &[RouteSpec],
        catalog: &Catalog,
    ) -> Self {
        let mut resource_types: Vec<&str> = specs
            .iter()
            .filter(|s| s.visible)
            .map(|s| s.resource_type.as_str())
            .collect();
        resource_types.sort_unstable();
        resource_types.dedup();

        let resource = resource_types
            .into_iter()
            .map(|resource_type| {
                let interaction = InteractionKind::ALL
                    .iter()
                    .filter(|kind| {
                        specs.iter().any(|s| {
                            s.visible
                                && s.resource_type == resource_type
                                && s.interaction == **kind
                        })
                    })
                    .map(|kind| InteractionComponent {
                        code: kind.code().to_string(),
                    })
                    .collect();

                let has_search = specs.iter().any(|s| {
                    s.visible
                        && s.resource_type == resource_type
                        && s.interaction == InteractionKind::SearchType
                });
                let search_param = if has_search {
                    catalog
                        .search_parameters(resource_type)
                        .into_iter()
                        .filter(galen_catalog::SearchParamSpec::include_in_capability)
                        .map(|p| SearchParamComponent {
                            name: p.name().to_string(),
                            definition: if p.uri().is_empty() {
                                None
                            } else {
                                Some(p.uri().to_string())
                            },
                            param_type: p.param_type().as_str().to_string(),
                            documentation: if p.description().is_empty() {
                                None
                            } else {
                                Some(p.description().to_string())
                            },
                        })
                        .collect()
                } else {
                    Vec::new()
                };

                ResourceComponent {
                    resource_type: resource_type.to_string(),
                    interaction,
                    search_param,
                }
            })
            .collect();

        Self {
            resource_type: "CapabilityStatement".to_string(),
            status: "active".to_string(),
            date: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            kind: "instance".to_string(),
            publisher,
            fhir_version: version.version_string().to_string(),
            format: vec!["json".to_string()],
            rest: vec![RestComponent {
                mode: "server".to_string(),
                resource,
            }],
        }
    }
}
