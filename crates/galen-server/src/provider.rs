//! Interaction registration.
//!
//! A [`FhirProvider`] accumulates typed handler registrations for FHIR
//! interactions. Handlers are plain async functions; registration erases
//! their types behind per-kind closures so the route synthesizer can treat
//! every registration uniformly.
//!
//! # Example
//!
//! ```rust,ignore
//! use galen_server::FhirProvider;
//! use galen_core::{FhirError, Id, InteractionContext};
//!
//! async fn patient_read(ctx: InteractionContext, id: Id) -> Result<Patient, FhirError> {
//!     // fetch from storage...
//! }
//!
//! let mut provider = FhirProvider::new();
//! provider.register_read::<Patient, _, _>(patient_read);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use galen_core::{
    Bundle, FhirError, FhirResource, Id, InteractionContext, InteractionKind, IssueCode,
    JsonPatch,
};

use crate::search::SearchArgs;

/// Boxed future returned by erased handlers.
pub type BoxFhirFuture<T> = Pin<Box<dyn Future<Output = Result<T, FhirError>> + Send>>;

/// Erased create handler: body bytes in, created resource (and its id) out.
pub type CreateFn =
    Arc<dyn Fn(InteractionContext, Bytes) -> BoxFhirFuture<(Option<Id>, Value)> + Send + Sync>;

/// Erased read handler.
pub type ReadFn = Arc<dyn Fn(InteractionContext, Id) -> BoxFhirFuture<Value> + Send + Sync>;

/// Erased update handler.
pub type UpdateFn =
    Arc<dyn Fn(InteractionContext, Id, Bytes) -> BoxFhirFuture<Value> + Send + Sync>;

/// Erased patch handler.
pub type PatchFn =
    Arc<dyn Fn(InteractionContext, Id, Bytes) -> BoxFhirFuture<Value> + Send + Sync>;

/// Erased delete handler.
pub type DeleteFn = Arc<dyn Fn(InteractionContext, Id) -> BoxFhirFuture<()> + Send + Sync>;

/// Erased search handler.
pub type SearchFn =
    Arc<dyn Fn(InteractionContext, SearchArgs) -> BoxFhirFuture<Value> + Send + Sync>;

/// A type-erased interaction handler, tagged by kind.
#[derive(Clone)]
pub enum InteractionHandler {
    /// Create a new resource instance.
    Create(CreateFn),
    /// Read a resource by id.
    Read(ReadFn),
    /// Replace a resource by id.
    Update(UpdateFn),
    /// Apply a JSON patch to a resource by id.
    Patch(PatchFn),
    /// Delete a resource by id.
    Delete(DeleteFn),
    /// Search the resource type.
    Search(SearchFn),
}

impl InteractionHandler {
    /// Returns the interaction kind this handler serves.
    #[must_use]
    pub const fn kind(&self) -> InteractionKind {
        match self {
            Self::Create(_) => InteractionKind::Create,
            Self::Read(_) => InteractionKind::Read,
            Self::Update(_) => InteractionKind::Update,
            Self::Patch(_) => InteractionKind::Patch,
            Self::Delete(_) => InteractionKind::Delete,
            Self::Search(_) => InteractionKind::SearchType,
        }
    }
}

impl std::fmt::Debug for InteractionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InteractionHandler")
            .field(&self.kind())
            .finish()
    }
}

/// Per-registration route options.
///
/// # Example
///
/// ```
/// use galen_server::RouteOptions;
///
/// let options = RouteOptions::new()
///     .summary("Read a patient")
///     .include_in_capability(false);
/// assert!(!options.is_visible());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOptions {
    summary: Option<String>,
    description: Option<String>,
    include_in_capability: bool,
    dependencies: Vec<String>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            summary: None,
            description: None,
            include_in_capability: true,
            dependencies: Vec::new(),
        }
    }
}

impl RouteOptions {
    /// Creates options with defaults: visible, no summary, no dependencies.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the documentation summary line.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Sets the documentation description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Controls whether the interaction is listed in the capability
    /// statement. Defaults to `true`.
    #[must_use]
    pub fn include_in_capability(mut self, include: bool) -> Self {
        self.include_in_capability = include;
        self
    }

    /// Declares a dependency name used by this route's handler.
    ///
    /// The name is reserved at synthesis time so it cannot collide with a
    /// legal search-parameter name of the same resource type. The value
    /// itself is resolved by type through the context's container, not by
    /// this name.
    #[must_use]
    pub fn dependency(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Returns the summary, if set.
    #[must_use]
    pub fn summary_text(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Returns the description, if set.
    #[must_use]
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns whether the interaction is capability-visible.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.include_in_capability
    }

    /// Returns the declared dependency names.
    #[must_use]
    pub fn dependency_names(&self) -> &[String] {
        &self.dependencies
    }
}

/// One registered (resource type, interaction) pair with its handler.
#[derive(Debug, Clone)]
pub struct Registration {
    resource_type: String,
    handler: InteractionHandler,
    options: RouteOptions,
}

impl Registration {
    /// Returns the resource type name.
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Returns the interaction kind.
    #[must_use]
    pub const fn kind(&self) -> InteractionKind {
        self.handler.kind()
    }

    /// Returns the erased handler.
    #[must_use]
    pub const fn handler(&self) -> &InteractionHandler {
        &self.handler
    }

    /// Returns the route options.
    #[must_use]
    pub const fn options(&self) -> &RouteOptions {
        &self.options
    }
}

/// Registry of interaction handlers for one or more resource types.
///
/// Providers are consumed by the server builder; at that point every
/// registration is validated, synthesized into a route descriptor, and
/// bound. After assembly the registry is immutable.
#[derive(Debug, Default)]
pub struct FhirProvider {
    registrations: Vec<Registration>,
}

impl FhirProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulated registrations.
    #[must_use]
    pub fn registrations(&self) -> &[Registration] {
        &self.registrations
    }

    /// Consumes the provider, returning its registrations.
    #[must_use]
    pub fn into_registrations(self) -> Vec<Registration> {
        self.registrations
    }

    /// Registers a create handler for `R` with default options.
    pub fn register_create<R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        self.register_create_with::<R, F, Fut>(handler, RouteOptions::default())
    }

    /// Registers a create handler for `R`.
    ///
    /// The synthesized route is `POST /{type}`; success is `201 Created`
    /// with a `Location` header derived from the returned resource's id.
    pub fn register_create_with<R, F, Fut>(
        &mut self,
        handler: F,
        options: RouteOptions,
    ) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: CreateFn = Arc::new(move |ctx, body| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let resource: R = parse_resource(&body)?;
                let created = handler(ctx, resource).await?;
                let id = created.id().cloned();
                Ok((id, to_value(&created)?))
            })
        });
        self.push::<R>(InteractionHandler::Create(erased), options)
    }

    /// Registers a read handler for `R` with default options.
    pub fn register_read<R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        self.register_read_with::<R, F, Fut>(handler, RouteOptions::default())
    }

    /// Registers a read handler for `R`.
    ///
    /// The synthesized route is `GET /{type}/{id}`.
    pub fn register_read_with<R, F, Fut>(&mut self, handler: F, options: RouteOptions) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ReadFn = Arc::new(move |ctx, id| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let resource = handler(ctx, id).await?;
                to_value(&resource)
            })
        });
        self.push::<R>(InteractionHandler::Read(erased), options)
    }

    /// Registers an update handler for `R` with default options.
    pub fn register_update<R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        self.register_update_with::<R, F, Fut>(handler, RouteOptions::default())
    }

    /// Registers an update handler for `R`.
    ///
    /// The synthesized route is `PUT /{type}/{id}`.
    pub fn register_update_with<R, F, Fut>(
        &mut self,
        handler: F,
        options: RouteOptions,
    ) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id, R) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: UpdateFn = Arc::new(move |ctx, id, body| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let resource: R = parse_resource(&body)?;
                let updated = handler(ctx, id, resource).await?;
                to_value(&updated)
            })
        });
        self.push::<R>(InteractionHandler::Update(erased), options)
    }

    /// Registers a patch handler for `R` with default options.
    pub fn register_patch<R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id, JsonPatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        self.register_patch_with::<R, F, Fut>(handler, RouteOptions::default())
    }

    /// Registers a patch handler for `R`.
    ///
    /// The synthesized route is `PATCH /{type}/{id}`; the body is a JSON
    /// patch document, validated before the handler runs.
    pub fn register_patch_with<R, F, Fut>(&mut self, handler: F, options: RouteOptions) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id, JsonPatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, FhirError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: PatchFn = Arc::new(move |ctx, id, body| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let patch: JsonPatch = serde_json::from_slice(&body).map_err(|e| {
                    FhirError::invalid_with_code(
                        IssueCode::Structure,
                        format!("invalid JSON patch document: {e}"),
                    )
                })?;
                patch.validate()?;
                let patched = handler(ctx, id, patch).await?;
                to_value(&patched)
            })
        });
        self.push::<R>(InteractionHandler::Patch(erased), options)
    }

    /// Registers a delete handler for `R` with default options.
    pub fn register_delete<R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FhirError>> + Send + 'static,
    {
        self.register_delete_with::<R, F, Fut>(handler, RouteOptions::default())
    }

    /// Registers a delete handler for `R`.
    ///
    /// The synthesized route is `DELETE /{type}/{id}`; success is
    /// `204 No Content`.
    pub fn register_delete_with<R, F, Fut>(
        &mut self,
        handler: F,
        options: RouteOptions,
    ) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, Id) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), FhirError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: DeleteFn = Arc::new(move |ctx, id| {
            let handler = Arc::clone(&handler);
            Box::pin(async move { handler(ctx, id).await })
        });
        self.push::<R>(InteractionHandler::Delete(erased), options)
    }

    /// Registers a search handler for `R` with default options.
    pub fn register_search<R, F, Fut>(&mut self, handler: F) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, SearchArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bundle, FhirError>> + Send + 'static,
    {
        self.register_search_with::<R, F, Fut>(handler, RouteOptions::default())
    }

    /// Registers a search handler for `R`.
    ///
    /// Two routes are synthesized: `GET /{type}` and `POST /{type}/_search`.
    /// Both deliver the same validated [`SearchArgs`] to the handler, which
    /// returns a searchset [`Bundle`].
    pub fn register_search_with<R, F, Fut>(
        &mut self,
        handler: F,
        options: RouteOptions,
    ) -> &mut Self
    where
        R: FhirResource,
        F: Fn(InteractionContext, SearchArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bundle, FhirError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: SearchFn = Arc::new(move |ctx, args| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let bundle = handler(ctx, args).await?;
                to_value(&bundle)
            })
        });
        self.push::<R>(InteractionHandler::Search(erased), options)
    }

    fn push<R: FhirResource>(
        &mut self,
        handler: InteractionHandler,
        options: RouteOptions,
    ) -> &mut Self {
        self.registrations.push(Registration {
            resource_type: R::TYPE.to_string(),
            handler,
            options,
        });
        self
    }
}

fn parse_resource<R: FhirResource>(body: &Bytes) -> Result<R, FhirError> {
    serde_json::from_slice(body).map_err(|e| {
        FhirError::invalid_with_code(
            IssueCode::Structure,
            format!("invalid {} resource body: {e}", R::TYPE),
        )
    })
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, FhirError> {
    serde_json::to_value(value)
        .map_err(|e| FhirError::internal_with_source("failed to serialize response resource", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Patient {
        resource_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<Id>,
        name: String,
    }

    impl FhirResource for Patient {
        const TYPE: &'static str = "Patient";

        fn id(&self) -> Option<&Id> {
            self.id.as_ref()
        }
    }

    fn patient(id: &str, name: &str) -> Patient {
        Patient {
            resource_type: "Patient".to_string(),
            id: Some(id.parse().unwrap()),
            name: name.to_string(),
        }
    }

    async fn read_handler(_ctx: InteractionContext, id: Id) -> Result<Patient, FhirError> {
        Ok(patient(id.as_str(), "Test"))
    }

    #[test]
    fn test_registration_metadata() {
        let mut provider = FhirProvider::new();
        provider.register_read::<Patient, _, _>(read_handler);

        let regs = provider.registrations();
        assert_eq!(regs.len(), 1);
        assert_eq!(regs[0].resource_type(), "Patient");
        assert_eq!(regs[0].kind(), InteractionKind::Read);
        assert!(regs[0].options().is_visible());
    }

    #[test]
    fn test_route_options_builder() {
        let options = RouteOptions::new()
            .summary("s")
            .description("d")
            .include_in_capability(false)
            .dependency("repo");

        assert_eq!(options.summary_text(), Some("s"));
        assert_eq!(options.description_text(), Some("d"));
        assert!(!options.is_visible());
        assert_eq!(options.dependency_names(), ["repo"]);
    }

    #[tokio::test]
    async fn test_erased_create_returns_id_and_value() {
        let mut provider = FhirProvider::new();
        provider.register_create::<Patient, _, _>(|_ctx, mut p: Patient| async move {
            p.id = Some("generated".parse().map_err(|_| FhirError::internal("id"))?);
            Ok(p)
        });

        let InteractionHandler::Create(handler) = provider.registrations()[0].handler().clone()
        else {
            panic!("expected create handler");
        };

        let body = Bytes::from(r#"{"resourceType":"Patient","name":"Ada"}"#);
        let (id, value) = handler(InteractionContext::mock(), body).await.unwrap();

        assert_eq!(id.unwrap().as_str(), "generated");
        assert_eq!(value["name"], "Ada");
    }

    #[tokio::test]
    async fn test_erased_create_rejects_malformed_body() {
        let mut provider = FhirProvider::new();
        provider.register_create::<Patient, _, _>(|_ctx, p: Patient| async move { Ok(p) });

        let InteractionHandler::Create(handler) = provider.registrations()[0].handler().clone()
        else {
            panic!("expected create handler");
        };

        let body = Bytes::from("not json");
        let err = handler(InteractionContext::mock(), body).await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
        assert_eq!(err.issue_code(), IssueCode::Structure);
    }

    #[tokio::test]
    async fn test_erased_patch_validates_document() {
        let mut provider = FhirProvider::new();
        provider.register_patch::<Patient, _, _>(|_ctx, id, _patch| async move {
            Ok(patient(id.as_str(), "Patched"))
        });

        let InteractionHandler::Patch(handler) = provider.registrations()[0].handler().clone()
        else {
            panic!("expected patch handler");
        };

        // Structurally valid patch.
        let body = Bytes::from(r#"[{"op":"replace","path":"/name","value":"X"}]"#);
        let id: Id = "p1".parse().unwrap();
        let value = handler(InteractionContext::mock(), id.clone(), body)
            .await
            .unwrap();
        assert_eq!(value["name"], "Patched");

        // Missing path: rejected before the handler runs.
        let body = Bytes::from(r#"[{"op":"replace","value":"X"}]"#);
        let err = handler(InteractionContext::mock(), id, body)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_erased_search_serializes_bundle() {
        let mut provider = FhirProvider::new();
        provider.register_search::<Patient, _, _>(|_ctx, _args| async move {
            Ok(Bundle::searchset_of([patient("a", "Ada")]))
        });

        let InteractionHandler::Search(handler) = provider.registrations()[0].handler().clone()
        else {
            panic!("expected search handler");
        };

        let value = handler(InteractionContext::mock(), SearchArgs::new())
            .await
            .unwrap();
        assert_eq!(value["resourceType"], "Bundle");
        assert_eq!(value["type"], "searchset");
    }
}
