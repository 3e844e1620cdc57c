//! Search parameter descriptors.

use serde::{Deserialize, Serialize};

/// The value type of a search parameter, per the protocol's search
/// parameter type vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// Simple number comparison.
    Number,
    /// Date or date range.
    Date,
    /// Simple string matching.
    String,
    /// Coded value, possibly with a system.
    Token,
    /// Reference to another resource.
    Reference,
    /// Composite of multiple parameters.
    Composite,
    /// Quantity with units.
    Quantity,
    /// URI matching.
    Uri,
}

impl SearchParamType {
    /// Returns the wire representation of this type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Date => "date",
            Self::String => "string",
            Self::Token => "token",
            Self::Reference => "reference",
            Self::Composite => "composite",
            Self::Quantity => "quantity",
            Self::Uri => "uri",
        }
    }

    /// Parses a wire representation.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "string" => Some(Self::String),
            "token" => Some(Self::Token),
            "reference" => Some(Self::Reference),
            "composite" => Some(Self::Composite),
            "quantity" => Some(Self::Quantity),
            "uri" => Some(Self::Uri),
            _ => None,
        }
    }
}

impl std::fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor for one legal search parameter of a resource type.
///
/// Descriptors feed both request parsing (the synthesized search callable
/// consults the name and type) and documentation (the capability statement
/// lists every descriptor flagged `include_in_capability`).
///
/// # Example
///
/// ```
/// use galen_catalog::{SearchParamSpec, SearchParamType};
///
/// let spec = SearchParamSpec::builder("nickname", SearchParamType::String)
///     .description("Nickname")
///     .uri("https://example.org/SearchParameter/patient-nickname")
///     .build();
/// assert!(spec.include_in_capability());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParamSpec {
    /// The query-parameter name (e.g. "_id", "nickname").
    name: String,
    /// The value type.
    #[serde(rename = "type")]
    param_type: SearchParamType,
    /// Human-readable documentation for the parameter.
    description: String,
    /// The canonical URI identifying the parameter definition.
    uri: String,
    /// Whether this parameter is listed in the capability statement.
    include_in_capability: bool,
}

impl SearchParamSpec {
    /// Creates a builder for a parameter with the given name and type.
    #[must_use]
    pub fn builder(name: impl Into<String>, param_type: SearchParamType) -> SearchParamSpecBuilder {
        SearchParamSpecBuilder {
            name: name.into(),
            param_type,
            description: String::new(),
            uri: String::new(),
            include_in_capability: true,
        }
    }

    /// Returns the query-parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value type.
    #[must_use]
    pub const fn param_type(&self) -> SearchParamType {
        self.param_type
    }

    /// Returns the documentation text.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the canonical defining URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Returns whether this parameter appears in the capability statement.
    #[must_use]
    pub const fn include_in_capability(&self) -> bool {
        self.include_in_capability
    }
}

/// Builder for [`SearchParamSpec`].
#[derive(Debug)]
pub struct SearchParamSpecBuilder {
    name: String,
    param_type: SearchParamType,
    description: String,
    uri: String,
    include_in_capability: bool,
}

impl SearchParamSpecBuilder {
    /// Sets the documentation text.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the canonical defining URI.
    #[must_use]
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    /// Sets whether the parameter appears in the capability statement.
    #[must_use]
    pub fn include_in_capability(mut self, include: bool) -> Self {
        self.include_in_capability = include;
        self
    }

    /// Builds the descriptor.
    #[must_use]
    pub fn build(self) -> SearchParamSpec {
        SearchParamSpec {
            name: self.name,
            param_type: self.param_type,
            description: self.description,
            uri: self.uri,
            include_in_capability: self.include_in_capability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let spec = SearchParamSpec::builder("nickname", SearchParamType::String)
            .description("Nickname")
            .uri("https://example.org/sp/nickname")
            .include_in_capability(false)
            .build();

        assert_eq!(spec.name(), "nickname");
        assert_eq!(spec.param_type(), SearchParamType::String);
        assert_eq!(spec.description(), "Nickname");
        assert!(!spec.include_in_capability());
    }

    #[test]
    fn test_type_parse_round_trip() {
        for t in [
            SearchParamType::Number,
            SearchParamType::Date,
            SearchParamType::String,
            SearchParamType::Token,
            SearchParamType::Reference,
            SearchParamType::Composite,
            SearchParamType::Quantity,
            SearchParamType::Uri,
        ] {
            assert_eq!(SearchParamType::parse(t.as_str()), Some(t));
        }
        assert_eq!(SearchParamType::parse("special"), None);
    }

    #[test]
    fn test_spec_serialization_uses_type_key() {
        let spec = SearchParamSpec::builder("_id", SearchParamType::Token).build();
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["type"], "token");
        assert_eq!(json["name"], "_id");
    }
}
