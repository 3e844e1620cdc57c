//! Resource type catalog for Galen.
//!
//! The catalog maps a resource type name to its legal search parameter set:
//! the protocol's built-in parameters merged with deployment-defined custom
//! parameters. It is built once at assembly time, for a fixed protocol
//! version, and is read-only while the server runs.

pub mod catalog;
pub mod param;
pub mod version;

pub use catalog::{Catalog, CatalogBuilder, CatalogError};
pub use param::{SearchParamSpec, SearchParamType};
pub use version::FhirVersion;
