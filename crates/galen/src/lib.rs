//! Galen: a FHIR interaction framework.
//!
//! Galen turns typed async handlers into a routed FHIR server. Register
//! handlers for the resource-level interactions on a
//! [`FhirProvider`](server::FhirProvider), hand the providers to
//! [`GalenServer::builder`](server::GalenServer::builder), and the assembly
//! step synthesizes routes, validates search parameters against a
//! per-version catalog, and builds the capability statement served at
//! `GET /metadata`.
//!
//! This crate is a facade; the implementation lives in the member crates,
//! re-exported here under stable module names:
//!
//! - [`core`] — context, errors, resources, dependency injection
//! - [`catalog`] — search-parameter catalog and protocol versions
//! - [`config`] — layered configuration loading
//! - [`server`] — registration, synthesis, routing, HTTP serving
//!
//! # Example
//!
//! ```rust,ignore
//! use galen::prelude::*;
//!
//! async fn patient_read(ctx: InteractionContext, id: Id) -> Result<Patient, FhirError> {
//!     // fetch from storage...
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut provider = FhirProvider::new();
//!     provider.register_read::<Patient, _, _>(patient_read);
//!
//!     let server = GalenServer::builder().add_provider(provider).build()?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub use galen_catalog as catalog;
pub use galen_config as config;
pub use galen_core as core;
pub use galen_server as server;

/// The commonly needed names, for glob import.
pub mod prelude {
    pub use galen_catalog::{Catalog, FhirVersion, SearchParamSpec, SearchParamType};
    pub use galen_config::{ConfigError, ConfigLoader, GalenConfig};
    pub use galen_core::{
        Bundle, Container, FhirError, FhirResource, FhirResult, Id, InteractionContext,
        InteractionKind, IssueCode, IssueSeverity, JsonPatch, OperationOutcome,
    };
    pub use galen_server::{
        AssemblyError, FhirProvider, GalenServer, RouteOptions, SearchArgs, ShutdownSignal,
    };
}
