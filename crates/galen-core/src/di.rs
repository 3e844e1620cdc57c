//! Dependency injection container.
//!
//! Services are registered once at assembly time and resolved by type
//! inside handlers via the [`InteractionContext`](crate::InteractionContext).
//! The container is never mutated after the server starts serving.
//!
//! # Example
//!
//! ```rust
//! use galen_core::Container;
//! use std::sync::Arc;
//!
//! struct Repository {
//!     connection_string: String,
//! }
//!
//! let mut container = Container::new();
//! container.register(Arc::new(Repository {
//!     connection_string: "postgres://localhost/fhir".to_string(),
//! }));
//!
//! let repo: Arc<Repository> = container.resolve().unwrap();
//! assert!(repo.connection_string.starts_with("postgres"));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Error when a dependency cannot be resolved.
#[derive(Debug, Clone)]
pub struct InjectionError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
}

impl fmt::Display for InjectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service {} is not registered", self.type_name)
    }
}

impl std::error::Error for InjectionError {}

/// A dependency injection container.
///
/// Stores `Arc`-wrapped services keyed by their type. The container is
/// `Send + Sync` and is shared immutably across concurrent requests.
#[derive(Default)]
pub struct Container {
    services: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Registers a service in the container.
    ///
    /// Registering a second service of the same type replaces the first.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(TypeId::of::<T>(), service);
    }

    /// Resolves a service from the container.
    ///
    /// Returns `None` if the service is not registered.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|service| Arc::clone(service).downcast::<T>().ok())
    }

    /// Resolves a service, returning an error if it is not registered.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or(InjectionError {
            type_name: std::any::type_name::<T>(),
        })
    }

    /// Returns whether a service of type `T` is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns whether the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("services", &self.services.len())
            .finish()
    }
}
