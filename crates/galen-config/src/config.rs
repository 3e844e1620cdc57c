//! Main configuration types.
//!
//! This module provides the top-level [`GalenConfig`] struct: server
//! settings, the protocol version, capability-statement fields, and the
//! declarative custom search-parameter table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use galen_catalog::{FhirVersion, SearchParamSpec, SearchParamType};

use crate::ConfigError;

/// Complete Galen server configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load configuration from
/// files and environment variables.
///
/// # Example
///
/// ```
/// use galen_config::GalenConfig;
///
/// let config = GalenConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert_eq!(config.fhir.version, "R4B");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct GalenConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerSection,

    /// Protocol version selection.
    #[serde(default)]
    pub fhir: FhirSection,

    /// Capability statement fields.
    #[serde(default, rename = "capability-statement")]
    pub capability_statement: CapabilityStatementSection,

    /// Custom search parameters, keyed by resource type then parameter name.
    #[serde(default, rename = "search-parameters")]
    pub search_parameters: BTreeMap<String, BTreeMap<String, SearchParameterEntry>>,
}

/// Server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Socket address to bind.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Seconds to wait for in-flight requests during shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

const fn default_shutdown_timeout() -> u64 {
    30
}

/// Protocol version selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FhirSection {
    /// Version name: "R4", "R4B", or "R5".
    #[serde(default = "default_fhir_version")]
    pub version: String,
}

impl Default for FhirSection {
    fn default() -> Self {
        Self {
            version: default_fhir_version(),
        }
    }
}

fn default_fhir_version() -> String {
    "R4B".to_string()
}

/// Capability statement fields supplied by deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CapabilityStatementSection {
    /// The publisher name, if any.
    #[serde(default)]
    pub publisher: Option<String>,
}

/// One declared custom search parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SearchParameterEntry {
    /// The parameter value type ("string", "token", ...).
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable documentation.
    #[serde(default)]
    pub description: String,

    /// The canonical URI identifying the parameter definition.
    pub uri: String,

    /// Whether the parameter appears in the capability statement.
    #[serde(default = "default_true", rename = "include-in-capability-statement")]
    pub include_in_capability_statement: bool,
}

const fn default_true() -> bool {
    true
}

impl GalenConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the server address is not a valid socket
    /// address, the version name is unknown, or a search parameter entry
    /// names an unknown type.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        self.fhir_version()?;

        for (resource_type, params) in &self.search_parameters {
            for (name, entry) in params {
                if SearchParamType::parse(&entry.param_type).is_none() {
                    return Err(ConfigError::invalid_search_parameter(
                        name,
                        resource_type,
                        format!("unknown type '{}'", entry.param_type),
                    ));
                }
                if entry.uri.is_empty() {
                    return Err(ConfigError::invalid_search_parameter(
                        name,
                        resource_type,
                        "uri must not be empty",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Returns the configured protocol version.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the version name is not one of "R4",
    /// "R4B", or "R5".
    pub fn fhir_version(&self) -> Result<FhirVersion, ConfigError> {
        match self.fhir.version.as_str() {
            "R4" => Ok(FhirVersion::R4),
            "R4B" => Ok(FhirVersion::R4B),
            "R5" => Ok(FhirVersion::R5),
            other => Err(ConfigError::invalid_value(
                "fhir.version",
                format!("unknown version '{other}', expected R4, R4B, or R5"),
            )),
        }
    }

    /// Converts the declarative search-parameter table into catalog
    /// descriptors, paired with their resource types.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for malformed entries; the shape rules are
    /// the same as [`validate`](Self::validate).
    pub fn search_parameter_specs(
        &self,
    ) -> Result<Vec<(String, SearchParamSpec)>, ConfigError> {
        let mut specs = Vec::new();
        for (resource_type, params) in &self.search_parameters {
            for (name, entry) in params {
                let param_type = SearchParamType::parse(&entry.param_type).ok_or_else(|| {
                    ConfigError::invalid_search_parameter(
                        name,
                        resource_type,
                        format!("unknown type '{}'", entry.param_type),
                    )
                })?;
                if entry.uri.is_empty() {
                    return Err(ConfigError::invalid_search_parameter(
                        name,
                        resource_type,
                        "uri must not be empty",
                    ));
                }
                let spec = SearchParamSpec::builder(name.clone(), param_type)
                    .description(entry.description.clone())
                    .uri(entry.uri.clone())
                    .include_in_capability(entry.include_in_capability_statement)
                    .build();
                specs.push((resource_type.clone(), spec));
            }
        }
        Ok(specs)
    }
}
