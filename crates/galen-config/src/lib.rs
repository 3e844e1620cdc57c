//! Configuration loading for Galen FHIR servers.
//!
//! Configuration is applied in layers: built-in defaults, then an optional
//! TOML file, then `GALEN__`-prefixed environment variables. Everything is
//! validated at startup; a malformed search-parameter declaration is a
//! [`ConfigError`], never a runtime failure.
//!
//! # Example
//!
//! ```no_run
//! use galen_config::ConfigLoader;
//!
//! # fn main() -> Result<(), galen_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("galen.toml")?
//!     .with_env_prefix("GALEN")
//!     .load()?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod loader;

pub use config::{
    CapabilityStatementSection, FhirSection, GalenConfig, SearchParameterEntry, ServerSection,
};
pub use error::ConfigError;
pub use loader::ConfigLoader;
