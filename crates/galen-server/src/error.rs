//! Assembly-time error types.
//!
//! Everything in this module is raised while the server is being put
//! together, before it starts accepting connections. Request-time failures
//! use [`galen_core::FhirError`] instead.

use http::Method;
use thiserror::Error;

use galen_catalog::CatalogError;
use galen_config::ConfigError;
use galen_core::InteractionKind;

/// Errors raised while assembling a server from providers and configuration.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// Two handlers were registered for the same resource type and
    /// interaction kind.
    #[error("duplicate registration: {resource_type} {interaction} is already registered")]
    DuplicateRegistration {
        /// The resource type.
        resource_type: String,
        /// The interaction kind.
        interaction: InteractionKind,
    },

    /// Two routes were bound to the same method and path template.
    #[error("duplicate route: {method} {path} is already bound")]
    DuplicateRoute {
        /// The HTTP method.
        method: Method,
        /// The path template.
        path: String,
    },

    /// A declared dependency name collides with a legal search parameter
    /// of the same resource type.
    #[error(
        "dependency name '{name}' collides with a search parameter of {resource_type}"
    )]
    DependencyNameCollision {
        /// The colliding dependency name.
        name: String,
        /// The resource type whose parameter set it collides with.
        resource_type: String,
    },

    /// Catalog construction failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The server could not bind to the configured address.
    #[error("failed to bind {addr}: {reason}")]
    Bind {
        /// The address.
        addr: String,
        /// The failure reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_display() {
        let err = AssemblyError::DuplicateRegistration {
            resource_type: "Patient".to_string(),
            interaction: InteractionKind::Read,
        };
        assert!(err.to_string().contains("Patient"));
        assert!(err.to_string().contains("read"));
    }

    #[test]
    fn test_duplicate_route_display() {
        let err = AssemblyError::DuplicateRoute {
            method: Method::GET,
            path: "/Patient/{id}".to_string(),
        };
        assert!(err.to_string().contains("GET"));
        assert!(err.to_string().contains("/Patient/{id}"));
    }
}
