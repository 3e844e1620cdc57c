//! Per-request context types.
//!
//! The [`InteractionContext`] carries all per-request state into interaction
//! handlers: the request identity, the transport details a handler may need
//! (method, path, headers), the resolved interaction metadata, and the
//! dependency container.

use crate::di::Container;
use crate::interaction::InteractionKind;
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which makes it ideal for request tracking
/// and log correlation.
///
/// # Example
///
/// ```
/// use galen_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    ///
    /// Useful when parsing request IDs from headers or other sources.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RequestId> for Uuid {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

/// Per-request context passed to every interaction handler.
///
/// `InteractionContext` is allocated fresh per invocation and never shared
/// across concurrent requests. It carries:
///
/// - Unique request ID for tracing
/// - The HTTP method and path of the request
/// - A snapshot of the request headers
/// - The resource type and interaction kind resolved by the router
/// - The dependency container registered at assembly time
///
/// # Example
///
/// ```
/// use galen_core::InteractionContext;
///
/// let ctx = InteractionContext::mock();
/// println!("Processing request: {}", ctx.request_id());
/// ```
#[derive(Debug, Clone)]
pub struct InteractionContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// HTTP method of the request.
    method: Method,

    /// Request path (e.g. "/Patient/123").
    path: String,

    /// Snapshot of the request headers.
    headers: HeaderMap,

    /// The resource type this interaction operates on, if resolved.
    resource_type: Option<String>,

    /// The interaction kind resolved by the router, if any.
    interaction: Option<InteractionKind>,

    /// Dependencies registered at assembly time.
    dependencies: Arc<Container>,

    /// When the request started processing.
    started_at: Instant,
}

impl InteractionContext {
    /// Creates a new context for the given method and path.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            resource_type: None,
            interaction: None,
            dependencies: Arc::new(Container::new()),
            started_at: Instant::now(),
        }
    }

    /// Creates a mock context for testing purposes.
    ///
    /// # Example
    ///
    /// ```
    /// use galen_core::InteractionContext;
    ///
    /// let ctx = InteractionContext::mock();
    /// // Use ctx in tests...
    /// ```
    #[must_use]
    pub fn mock() -> Self {
        Self::new(Method::GET, "/")
    }

    /// Returns the request ID.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the HTTP method of the request.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a new context with the specified headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the resource type this interaction operates on, if resolved.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// Returns a new context with the specified resource type.
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Returns the interaction kind resolved by the router, if any.
    #[must_use]
    pub const fn interaction(&self) -> Option<InteractionKind> {
        self.interaction
    }

    /// Returns a new context with the specified interaction kind.
    #[must_use]
    pub fn with_interaction(mut self, kind: InteractionKind) -> Self {
        self.interaction = Some(kind);
        self
    }

    /// Returns the dependency container.
    #[must_use]
    pub fn dependencies(&self) -> &Container {
        &self.dependencies
    }

    /// Returns a new context with the specified dependency container.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Arc<Container>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_new_generates_unique_ids() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2, "Each RequestId should be unique");
    }

    #[test]
    fn test_request_id_display() {
        let id = RequestId::new();
        let display = id.to_string();
        // UUID v7 format: xxxxxxxx-xxxx-7xxx-xxxx-xxxxxxxxxxxx
        assert_eq!(display.len(), 36, "UUID string should be 36 characters");
        assert!(display.contains('-'), "UUID should contain hyphens");
    }

    #[test]
    fn test_request_id_serialization() {
        let id = RequestId::new();
        let json = serde_json::to_string(&id).expect("serialization should work");
        let parsed: RequestId = serde_json::from_str(&json).expect("deserialization should work");
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_context_new() {
        let ctx = InteractionContext::new(Method::GET, "/Patient/123");
        assert_eq!(ctx.method(), &Method::GET);
        assert_eq!(ctx.path(), "/Patient/123");
        assert!(ctx.resource_type().is_none());
        assert!(ctx.interaction().is_none());
    }

    #[test]
    fn test_context_builder_pattern() {
        let ctx = InteractionContext::new(Method::GET, "/Patient/123")
            .with_resource_type("Patient")
            .with_interaction(InteractionKind::Read);

        assert_eq!(ctx.resource_type(), Some("Patient"));
        assert_eq!(ctx.interaction(), Some(InteractionKind::Read));
    }

    #[test]
    fn test_context_dependencies() {
        struct Marker(u32);

        let mut container = Container::new();
        container.register(Arc::new(Marker(7)));

        let ctx = InteractionContext::mock().with_dependencies(Arc::new(container));
        let marker: Arc<Marker> = ctx.dependencies().resolve().expect("registered");
        assert_eq!(marker.0, 7);
    }

    #[test]
    fn test_context_elapsed() {
        let ctx = InteractionContext::mock();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(ctx.elapsed() >= std::time::Duration::from_millis(5));
    }
}
