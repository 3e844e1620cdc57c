//! FHIR interaction server: registration, route synthesis, and HTTP serving.
//!
//! Handlers for the six resource-level interactions are registered on a
//! [`FhirProvider`] as plain async functions. At assembly time each
//! registration is synthesized into an explicit route descriptor plus a
//! type-erased callable, bound into a route table, and summarized in a
//! `CapabilityStatement` served at `GET /metadata`. The assembled
//! [`GalenServer`] is immutable and serves requests over HTTP/1.1 with
//! graceful shutdown.
//!
//! ```rust,ignore
//! use galen_server::{FhirProvider, GalenServer};
//!
//! let mut provider = FhirProvider::new();
//! provider.register_read::<Patient, _, _>(patient_read);
//!
//! let server = GalenServer::builder()
//!     .http_addr("0.0.0.0:8080")
//!     .add_provider(provider)
//!     .build()?;
//! server.run().await?;
//! ```

pub mod capability;
pub mod config;
pub mod error;
pub mod provider;
pub mod router;
pub mod search;
pub mod server;
pub mod shutdown;
pub mod synthesis;
pub mod translate;

pub use capability::{CapabilityModifier, CapabilityStatement};
pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::AssemblyError;
pub use provider::{
    BoxFhirFuture, FhirProvider, InteractionHandler, Registration, RouteOptions,
};
pub use router::{RouteMatch, RouteOutcome, Router};
pub use search::{collect_search_args, SearchArgs};
pub use server::{GalenServer, GalenServerBuilder};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use synthesis::{
    synthesize, CallParts, FhirResponse, ParamLocation, ParamSpec, RouteCallable, RouteSpec,
    SynthesizedRoute,
};
pub use translate::{HttpResponse, ResponseBody, FHIR_JSON};
