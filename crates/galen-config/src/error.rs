//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// Failed to read configuration file.
    #[error("failed to read configuration file: {path}")]
    ReadError {
        /// Path to the file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML configuration: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Invalid configuration value.
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue {
        /// The field with the invalid value.
        field: String,
        /// Explanation of why the value is invalid.
        reason: String,
    },

    /// A declared search parameter is malformed.
    #[error("invalid search parameter '{name}' for {resource_type}: {reason}")]
    InvalidSearchParameter {
        /// The parameter name.
        name: String,
        /// The resource type the parameter was declared for.
        resource_type: String,
        /// Explanation of why the declaration is invalid.
        reason: String,
    },

    /// Environment variable parsing error.
    #[error("failed to parse environment variable {var}: {reason}")]
    EnvParseError {
        /// The environment variable name.
        var: String,
        /// Explanation of the parsing error.
        reason: String,
    },

    /// Validation error after loading.
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Create a new file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Create a new read error.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// Create a new invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid search parameter error.
    pub fn invalid_search_parameter(
        name: impl Into<String>,
        resource_type: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidSearchParameter {
            name: name.into(),
            resource_type: resource_type.into(),
            reason: reason.into(),
        }
    }

    /// Create a new environment variable parse error.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// Create a new validation error.
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_not_found_error() {
        let err = ConfigError::file_not_found("/path/to/galen.toml");
        assert!(err.to_string().contains("/path/to/galen.toml"));
    }

    #[test]
    fn test_invalid_value_error() {
        let err = ConfigError::invalid_value("fhir.version", "unknown version 'R9'");
        assert!(err.to_string().contains("fhir.version"));
        assert!(err.to_string().contains("R9"));
    }

    #[test]
    fn test_invalid_search_parameter_error() {
        let err =
            ConfigError::invalid_search_parameter("nickname", "Patient", "unknown type 'word'");
        assert!(err.to_string().contains("nickname"));
        assert!(err.to_string().contains("Patient"));
        assert!(err.to_string().contains("word"));
    }

    #[test]
    fn test_env_parse_error() {
        let err = ConfigError::env_parse_error("GALEN__FHIR__VERSION", "unknown version");
        assert!(err.to_string().contains("GALEN__FHIR__VERSION"));
    }
}
