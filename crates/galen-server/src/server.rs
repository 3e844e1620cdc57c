//! Server assembly and HTTP serving.
//!
//! [`GalenServer`] is assembled once from providers and configuration:
//! registrations are ordered, validated, synthesized into routes, and
//! bound, and the capability statement is built. After assembly nothing
//! mutates, so request serving shares the server behind an `Arc` without
//! locking.
//!
//! # Example
//!
//! ```rust,ignore
//! use galen_server::{FhirProvider, GalenServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut provider = FhirProvider::new();
//!     provider.register_read::<Patient, _, _>(patient_read);
//!
//!     let server = GalenServer::builder()
//!         .http_addr("0.0.0.0:8080")
//!         .add_provider(provider)
//!         .build()?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use galen_catalog::Catalog;
use galen_config::GalenConfig;
use galen_core::{
    Container, FhirError, InteractionContext, InteractionKind, IssueCode, IssueSeverity,
    OperationOutcome,
};

use crate::capability::{CapabilityModifier, CapabilityStatement};
use crate::config::ServerConfig;
use crate::error::AssemblyError;
use crate::provider::{FhirProvider, Registration};
use crate::router::{RouteOutcome, Router};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::synthesis::{self, CallParts, RouteSpec, SynthesizedRoute};
use crate::translate::{self, HttpResponse};

/// Query values `_format` may carry.
const ACCEPTED_FORMATS: [&str; 3] = ["json", "application/json", "application/fhir+json"];

/// Operation id the capability statement route is bound under.
const METADATA_OPERATION: &str = "capabilities";

/// The assembled, immutable FHIR server.
pub struct GalenServer {
    config: ServerConfig,
    catalog: Catalog,
    router: Router,
    routes: HashMap<String, SynthesizedRoute>,
    capability: CapabilityStatement,
    modifier: Option<CapabilityModifier>,
    container: Arc<Container>,
}

impl std::fmt::Debug for GalenServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GalenServer")
            .field("config", &self.config)
            .field("routes", &self.router.route_count())
            .finish_non_exhaustive()
    }
}

impl GalenServer {
    /// Creates a server builder.
    #[must_use]
    pub fn builder() -> GalenServerBuilder {
        GalenServerBuilder::default()
    }

    /// Returns the transport settings.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the search-parameter catalog the server was built with.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Returns the assembled capability statement.
    #[must_use]
    pub fn capability_statement(&self) -> &CapabilityStatement {
        &self.capability
    }

    /// Returns the synthesized route descriptors, in no particular order.
    pub fn route_specs(&self) -> impl Iterator<Item = &RouteSpec> {
        self.routes.values().map(|r| &r.spec)
    }

    /// Runs the server until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Bind`] when the listener cannot bind.
    pub async fn run(self) -> Result<(), AssemblyError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server with a caller-controlled shutdown signal.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::Bind`] when the listener cannot bind.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), AssemblyError> {
        let addr = self.config.socket_addr().map_err(|e| AssemblyError::Bind {
            addr: self.config.http_addr().to_string(),
            reason: e.to_string(),
        })?;

        let listener = TcpListener::bind(addr).await.map_err(|e| AssemblyError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

        tracing::info!(%addr, routes = self.router.route_count(), "server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) =
                                    server.handle_connection(stream, shutdown).await
                                {
                                    tracing::error!(%remote_addr, error = %e, "connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
            }
        }

        let drain = server.config.shutdown_timeout();
        tracing::info!(
            active = tracker.active_connections(),
            timeout_secs = drain.as_secs(),
            "draining connections"
        );
        tokio::select! {
            () = tracker.drained() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(drain) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "drain timeout reached"
                );
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: tokio::net::TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&self);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);

        tokio::select! {
            result = conn => result,
            () = shutdown.recv() => Ok(()),
        }
    }

    async fn handle_request(
        self: Arc<Self>,
        req: Request<Incoming>,
    ) -> Result<HttpResponse, Infallible> {
        let method = req.method().clone();
        let uri = req.uri().clone();
        let headers = req.headers().clone();

        let body = match tokio::time::timeout(
            self.config.request_timeout(),
            req.into_body().collect(),
        )
        .await
        {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to read request body");
                let outcome = OperationOutcome::single(
                    IssueSeverity::Error,
                    IssueCode::Structure,
                    "failed to read request body",
                );
                return Ok(translate::outcome_response(
                    StatusCode::BAD_REQUEST,
                    &outcome,
                    false,
                ));
            }
            Err(_) => {
                let outcome = OperationOutcome::single(
                    IssueSeverity::Error,
                    IssueCode::Processing,
                    "request body read timed out",
                );
                return Ok(translate::outcome_response(
                    StatusCode::REQUEST_TIMEOUT,
                    &outcome,
                    false,
                ));
            }
        };

        let path = uri.path().to_string();
        let raw_query = uri.query().unwrap_or("").to_string();

        let response = match tokio::time::timeout(
            self.config.request_timeout(),
            self.dispatch(method.clone(), &path, &raw_query, headers, body),
        )
        .await
        {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(%method, %path, "handler timed out");
                let outcome = OperationOutcome::single(
                    IssueSeverity::Error,
                    IssueCode::Processing,
                    "handler execution timed out",
                );
                translate::outcome_response(StatusCode::GATEWAY_TIMEOUT, &outcome, false)
            }
        };

        Ok(response)
    }

    /// Resolves and executes one request.
    ///
    /// Exposed separately from the socket loop so tests can drive the full
    /// routing, validation, and translation pipeline in memory.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        raw_query: &str,
        headers: HeaderMap,
        body: Bytes,
    ) -> HttpResponse {
        tracing::debug!(%method, %path, "request");

        let mut query: Vec<(String, String)> = match serde_urlencoded::from_str(raw_query) {
            Ok(pairs) => pairs,
            Err(e) => {
                let error = FhirError::invalid_with_code(
                    IssueCode::Structure,
                    format!("malformed query string: {e}"),
                );
                return translate::error_response(&error, false);
            }
        };

        let outcome = self.router.resolve(&method, path);

        // The form body of a POST search carries parameters with the same
        // standing as the query string, control parameters included. Merge
        // it before reading `_pretty` or `_format`.
        if let RouteOutcome::Matched(route_match) = &outcome {
            if let Some(route) = self.routes.get(route_match.operation_id()) {
                if route.spec.interaction == InteractionKind::SearchType
                    && method == Method::POST
                {
                    match serde_urlencoded::from_bytes::<Vec<(String, String)>>(&body) {
                        Ok(form_pairs) => query.extend(form_pairs),
                        Err(e) => {
                            let error = FhirError::invalid_with_code(
                                IssueCode::Structure,
                                format!("malformed search form body: {e}"),
                            );
                            return translate::error_response(&error, pretty_requested(&query));
                        }
                    }
                }
            }
        }

        let pretty = pretty_requested(&query);

        if let Some((_, format)) = query.iter().find(|(n, _)| n == "_format") {
            if !ACCEPTED_FORMATS.contains(&format.as_str()) {
                let error = FhirError::invalid_with_code(
                    IssueCode::Structure,
                    format!("unsupported _format '{format}', only JSON is supported"),
                );
                return translate::error_response(&error, pretty);
            }
        }

        match outcome {
            RouteOutcome::Matched(route_match) => {
                if route_match.operation_id() == METADATA_OPERATION {
                    return self.serve_metadata(&method, path, headers, pretty);
                }

                let Some(route) = self.routes.get(route_match.operation_id()) else {
                    // Router and route table are built together; a miss here
                    // is an assembly bug.
                    let error = FhirError::internal(format!(
                        "no callable bound for operation {}",
                        route_match.operation_id()
                    ));
                    return translate::error_response(&error, pretty);
                };

                let ctx = InteractionContext::new(method.clone(), path)
                    .with_headers(headers)
                    .with_resource_type(route.spec.resource_type.clone())
                    .with_interaction(route.spec.interaction)
                    .with_dependencies(Arc::clone(&self.container));

                let parts = CallParts {
                    ctx,
                    id: route_match.param("id").map(String::from),
                    body,
                    query,
                };

                match (route.callable)(parts).await {
                    Ok(response) => {
                        let location = response.created_id.as_ref().map(|id| {
                            format!(
                                "{}/{}/{}/_history/1",
                                self.config.base_url(),
                                route.spec.resource_type,
                                id
                            )
                        });
                        match response.payload {
                            Some(value) => translate::resource_response(
                                response.status,
                                &value,
                                pretty,
                                location.as_deref(),
                            ),
                            None => translate::empty_response(response.status),
                        }
                    }
                    Err(error) => translate::error_response(&error, pretty),
                }
            }
            RouteOutcome::MethodNotAllowed => {
                let error = FhirError::method_not_allowed(format!(
                    "{method} is not allowed on {path}"
                ));
                translate::error_response(&error, pretty)
            }
            RouteOutcome::NotFound => {
                let outcome = OperationOutcome::single(
                    IssueSeverity::Error,
                    IssueCode::NotFound,
                    format!("unknown path: {path}"),
                );
                translate::outcome_response(StatusCode::NOT_FOUND, &outcome, pretty)
            }
        }
    }

    fn serve_metadata(
        &self,
        method: &Method,
        path: &str,
        headers: HeaderMap,
        pretty: bool,
    ) -> HttpResponse {
        let statement = match &self.modifier {
            Some(modifier) => {
                let ctx = InteractionContext::new(method.clone(), path)
                    .with_headers(headers)
                    .with_dependencies(Arc::clone(&self.container));
                modifier(self.capability.clone(), &ctx)
            }
            None => self.capability.clone(),
        };

        match serde_json::to_value(&statement) {
            Ok(value) => {
                translate::resource_response(StatusCode::OK, &value, pretty, None)
            }
            Err(e) => translate::error_response(
                &FhirError::internal_with_source("failed to serialize capability statement", e),
                pretty,
            ),
        }
    }
}

/// Builder that assembles a [`GalenServer`].
#[derive(Default)]
pub struct GalenServerBuilder {
    app_config: GalenConfig,
    server_config: Option<ServerConfig>,
    http_addr: Option<String>,
    base_url: Option<String>,
    providers: Vec<FhirProvider>,
    container: Container,
    modifier: Option<CapabilityModifier>,
}

impl GalenServerBuilder {
    /// Uses a loaded application configuration (version, publisher, custom
    /// search parameters, server address).
    #[must_use]
    pub fn config(mut self, config: GalenConfig) -> Self {
        self.app_config = config;
        self
    }

    /// Overrides the bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = Some(addr.into());
        self
    }

    /// Sets the external base URL used in `Location` headers.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Overrides the transport settings wholesale.
    #[must_use]
    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = Some(config);
        self
    }

    /// Adds one provider's registrations.
    #[must_use]
    pub fn add_provider(mut self, provider: FhirProvider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Adds several providers.
    #[must_use]
    pub fn add_providers(mut self, providers: impl IntoIterator<Item = FhirProvider>) -> Self {
        self.providers.extend(providers);
        self
    }

    /// Registers a dependency available to handlers through the context.
    #[must_use]
    pub fn dependency<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.container.register(value);
        self
    }

    /// Installs a per-request capability statement modifier.
    #[must_use]
    pub fn capability_modifier<F>(mut self, modifier: F) -> Self
    where
        F: Fn(CapabilityStatement, &InteractionContext) -> CapabilityStatement
            + Send
            + Sync
            + 'static,
    {
        self.modifier = Some(Arc::new(modifier));
        self
    }

    /// Assembles the server.
    ///
    /// Ordering is canonical: registrations are sorted by resource type
    /// name, then by the fixed interaction-kind order, so identical inputs
    /// always produce identical route tables and capability statements.
    ///
    /// # Errors
    ///
    /// Returns an [`AssemblyError`] for invalid configuration, duplicate
    /// registrations, route collisions, or dependency-name collisions.
    pub fn build(self) -> Result<GalenServer, AssemblyError> {
        self.app_config.validate()?;
        let version = self.app_config.fhir_version()?;

        let catalog = Catalog::builder(version)
            .custom_parameters(self.app_config.search_parameter_specs()?)?
            .build();

        let mut registrations: Vec<Registration> = self
            .providers
            .into_iter()
            .flat_map(FhirProvider::into_registrations)
            .collect();
        registrations.sort_by_key(|r| (r.resource_type().to_string(), kind_order(r.kind())));

        for window in registrations.windows(2) {
            if window[0].resource_type() == window[1].resource_type()
                && window[0].kind() == window[1].kind()
            {
                return Err(AssemblyError::DuplicateRegistration {
                    resource_type: window[0].resource_type().to_string(),
                    interaction: window[0].kind(),
                });
            }
        }

        let mut router = Router::new();
        let mut routes = HashMap::new();
        let mut specs = Vec::new();

        // The capability statement route goes through the same table as
        // interaction routes, so wrong-method requests on it get the same
        // 405 treatment.
        router.add_route(Method::GET, "/metadata", METADATA_OPERATION)?;

        for registration in &registrations {
            for route in synthesis::synthesize(registration, &catalog)? {
                router.add_route(
                    route.spec.method.clone(),
                    &route.spec.path,
                    &route.spec.operation_id,
                )?;
                specs.push(route.spec.clone());
                routes.insert(route.spec.operation_id.clone(), route);
            }
        }

        let capability = CapabilityStatement::build(
            version,
            self.app_config.capability_statement.publisher.clone(),
            &specs,
            &catalog,
        );

        let mut config_builder = ServerConfig::builder();
        if let Some(config) = self.server_config {
            config_builder = config_builder
                .shutdown_timeout(config.shutdown_timeout())
                .request_timeout(config.request_timeout())
                .http_addr(config.http_addr().to_string());
        } else {
            config_builder = config_builder
                .http_addr(self.app_config.server.http_addr.clone())
                .shutdown_timeout(std::time::Duration::from_secs(
                    self.app_config.server.shutdown_timeout_secs,
                ));
        }
        if let Some(addr) = self.http_addr {
            config_builder = config_builder.http_addr(addr);
        }
        if let Some(base_url) = self.base_url {
            config_builder = config_builder.base_url(base_url);
        }

        Ok(GalenServer {
            config: config_builder.build(),
            catalog,
            router,
            routes,
            capability,
            modifier: self.modifier,
            container: Arc::new(self.container),
        })
    }
}

fn pretty_requested(query: &[(String, String)]) -> bool {
    query.iter().any(|(n, v)| n == "_pretty" && v == "true")
}

fn kind_order(kind: InteractionKind) -> usize {
    InteractionKind::ALL
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(InteractionKind::ALL.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use galen_core::{Bundle, FhirResource, Id};
    use http_body_util::BodyExt;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

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

    fn provider() -> FhirProvider {
        let mut provider = FhirProvider::new();
        provider.register_read::<Patient, _, _>(|_ctx, id| async move {
            if id.as_str() == "known" {
                Ok(patient("known", "Ada"))
            } else {
                Err(FhirError::not_found("Patient", Some(id.as_str())))
            }
        });
        provider.register_create::<Patient, _, _>(|_ctx, mut p: Patient| async move {
            p.id = Some("new1".parse().map_err(|_| FhirError::internal("id"))?);
            Ok(p)
        });
        provider.register_search::<Patient, _, _>(|_ctx, args| async move {
            let name = args.get("nickname").unwrap_or("nobody").to_string();
            Ok(Bundle::searchset_of([patient("known", &name)]).with_total(1))
        });
        provider
    }

    fn server() -> GalenServer {
        let config: GalenConfig = toml::from_str(
            r#"
            [capability-statement]
            publisher = "Example Org"

            [search-parameters.Patient.nickname]
            type = "string"
            description = "Nickname"
            uri = "https://example.org/sp/nickname"
        "#,
        )
        .unwrap();

        GalenServer::builder()
            .config(config)
            .base_url("http://fhir.example.org")
            .add_provider(provider())
            .build()
            .unwrap()
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn dispatch(
        server: &GalenServer,
        method: Method,
        path: &str,
        raw_query: &str,
        body: &str,
    ) -> HttpResponse {
        server
            .dispatch(
                method,
                path,
                raw_query,
                HeaderMap::new(),
                Bytes::from(body.to_string()),
            )
            .await
    }

    #[tokio::test]
    async fn test_read_known_resource() {
        let server = server();
        let response = dispatch(&server, Method::GET, "/Patient/known", "", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Ada");
    }

    #[tokio::test]
    async fn test_read_missing_resource_is_not_found_outcome() {
        let server = server();
        let response = dispatch(&server, Method::GET, "/Patient/absent", "", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["resourceType"], "OperationOutcome");
        assert_eq!(body["issue"].as_array().unwrap().len(), 1);
        assert_eq!(body["issue"][0]["code"], "not-found");
    }

    #[tokio::test]
    async fn test_create_sets_location_header() {
        let server = server();
        let response = dispatch(
            &server,
            Method::POST,
            "/Patient",
            "",
            r#"{"resourceType":"Patient","name":"Grace"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(http::header::LOCATION).unwrap(),
            "http://fhir.example.org/Patient/new1/_history/1"
        );
    }

    #[tokio::test]
    async fn test_create_response_round_trips() {
        let server = server();
        let response = dispatch(
            &server,
            Method::POST,
            "/Patient",
            "",
            r#"{"resourceType":"Patient","name":"Grace"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let returned: Patient = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(returned.resource_type, "Patient");
        assert_eq!(returned.name, "Grace");
        assert_eq!(returned.id.as_ref().map(Id::as_str), Some("new1"));
    }

    #[tokio::test]
    async fn test_search_via_get_with_custom_parameter() {
        let server = server();
        let response =
            dispatch(&server, Method::GET, "/Patient", "nickname=Bob", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["type"], "searchset");
        assert_eq!(body["entry"][0]["resource"]["name"], "Bob");
    }

    #[tokio::test]
    async fn test_search_via_post_form_body() {
        let server = server();
        let response = dispatch(
            &server,
            Method::POST,
            "/Patient/_search",
            "",
            "nickname=FormBob",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["entry"][0]["resource"]["name"], "FormBob");
    }

    #[tokio::test]
    async fn test_search_post_merges_query_and_form() {
        let server = server();
        // Query supplies the value; form body is empty.
        let response = dispatch(
            &server,
            Method::POST,
            "/Patient/_search",
            "nickname=QueryBob",
            "",
        )
        .await;
        let body = body_json(response).await;
        assert_eq!(body["entry"][0]["resource"]["name"], "QueryBob");
    }

    #[tokio::test]
    async fn test_unknown_search_parameter_ignored() {
        let server = server();
        let response =
            dispatch(&server, Method::GET, "/Patient", "favorite-color=blue", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        // Handler saw no nickname, so the default shows through.
        assert_eq!(body["entry"][0]["resource"]["name"], "nobody");
    }

    #[tokio::test]
    async fn test_metadata_served() {
        let server = server();
        let response = dispatch(&server, Method::GET, "/metadata", "", "").await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["resourceType"], "CapabilityStatement");
        assert_eq!(body["publisher"], "Example Org");

        let resource = &body["rest"][0]["resource"][0];
        assert_eq!(resource["type"], "Patient");
        let codes: Vec<&str> = resource["interaction"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["code"].as_str().unwrap())
            .collect();
        assert_eq!(codes, ["create", "read", "search-type"]);

        let names: Vec<&str> = resource["searchParam"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["_id", "_lastUpdated", "nickname"]);
    }

    #[tokio::test]
    async fn test_metadata_deterministic_across_assemblies() {
        let a = server();
        let b = server();
        let mut statement_a = a.capability_statement().clone();
        let mut statement_b = b.capability_statement().clone();
        // The assembly timestamp is the only nondeterministic field.
        statement_a.date = String::new();
        statement_b.date = String::new();
        assert_eq!(statement_a, statement_b);
    }

    #[tokio::test]
    async fn test_capability_modifier_output_served_verbatim() {
        let config = GalenConfig::default();
        let server = GalenServer::builder()
            .config(config)
            .add_provider(provider())
            .capability_modifier(|mut statement, _ctx| {
                statement.publisher = Some("Rewritten".to_string());
                statement
            })
            .build()
            .unwrap();

        let response = dispatch(&server, Method::GET, "/metadata", "", "").await;
        let body = body_json(response).await;
        assert_eq!(body["publisher"], "Rewritten");
    }

    #[tokio::test]
    async fn test_method_not_allowed_vs_not_found() {
        let server = server();

        let response = dispatch(&server, Method::DELETE, "/Patient/known", "", "").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["issue"][0]["code"], "not-supported");

        let response = dispatch(&server, Method::GET, "/Observation/xyz", "", "").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_on_metadata_is_method_not_allowed() {
        let server = server();
        let response = dispatch(&server, Method::POST, "/metadata", "", "").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body = body_json(response).await;
        assert_eq!(body["issue"][0]["code"], "not-supported");
    }

    #[tokio::test]
    async fn test_invalid_id_grammar_rejected() {
        let server = server();
        let response = dispatch(&server, Method::GET, "/Patient/bad!id", "", "").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected_with_structure_issue() {
        let server = server();
        let response = dispatch(&server, Method::POST, "/Patient", "", "not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["issue"][0]["code"], "structure");
    }

    #[tokio::test]
    async fn test_unsupported_format_rejected() {
        let server = server();
        let response =
            dispatch(&server, Method::GET, "/Patient/known", "_format=xml", "").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response =
            dispatch(&server, Method::GET, "/Patient/known", "_format=json", "").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_pretty_flag_changes_rendering() {
        let server = server();
        let compact = dispatch(&server, Method::GET, "/Patient/known", "", "").await;
        let pretty =
            dispatch(&server, Method::GET, "/Patient/known", "_pretty=true", "").await;

        let compact_bytes = compact.into_body().collect().await.unwrap().to_bytes();
        let pretty_bytes = pretty.into_body().collect().await.unwrap().to_bytes();
        assert!(!compact_bytes.iter().any(|b| *b == b'\n'));
        assert!(pretty_bytes.iter().any(|b| *b == b'\n'));
    }

    #[tokio::test]
    async fn test_pretty_flag_honored_from_search_form_body() {
        let server = server();
        let response = dispatch(
            &server,
            Method::POST,
            "/Patient/_search",
            "",
            "nickname=Bob&_pretty=true",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.iter().any(|b| *b == b'\n'));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut extra = FhirProvider::new();
        extra.register_read::<Patient, _, _>(|_ctx, id| async move {
            Ok(patient(id.as_str(), "Dup"))
        });

        let err = GalenServer::builder()
            .config(GalenConfig::default())
            .add_provider(provider())
            .add_provider(extra)
            .build()
            .unwrap_err();

        assert!(matches!(err, AssemblyError::DuplicateRegistration { .. }));
    }

    #[test]
    fn test_dependency_collision_rejected_at_build() {
        use crate::provider::RouteOptions;

        let mut provider = FhirProvider::new();
        provider.register_search_with::<Patient, _, _>(
            |_ctx, _args| async move { Ok(Bundle::searchset(Vec::new())) },
            RouteOptions::new().dependency("_id"),
        );

        let err = GalenServer::builder()
            .config(GalenConfig::default())
            .add_provider(provider)
            .build()
            .unwrap_err();

        assert!(matches!(err, AssemblyError::DependencyNameCollision { .. }));
    }

    #[tokio::test]
    async fn test_dependency_resolved_through_context() {
        #[derive(Debug)]
        struct Greeting(&'static str);

        let mut provider = FhirProvider::new();
        provider.register_read::<Patient, _, _>(|ctx, id| async move {
            let greeting = ctx
                .dependencies()
                .resolve::<Greeting>()
                .ok_or_else(|| FhirError::internal("missing greeting"))?;
            Ok(patient(id.as_str(), greeting.0))
        });

        let server = GalenServer::builder()
            .config(GalenConfig::default())
            .add_provider(provider)
            .dependency(Arc::new(Greeting("hi")))
            .build()
            .unwrap();

        let response = dispatch(&server, Method::GET, "/Patient/known", "", "").await;
        let body = body_json(response).await;
        assert_eq!(body["name"], "hi");
    }

    #[tokio::test]
    async fn test_delete_returns_no_content() {
        let mut provider = FhirProvider::new();
        provider.register_delete::<Patient, _, _>(|_ctx, _id| async move { Ok(()) });

        let server = GalenServer::builder()
            .config(GalenConfig::default())
            .add_provider(provider)
            .build()
            .unwrap();

        let response = dispatch(&server, Method::DELETE, "/Patient/p1", "", "").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let server = GalenServer::builder()
            .config(GalenConfig::default())
            .http_addr("127.0.0.1:0")
            .add_provider(provider())
            .build()
            .unwrap();

        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            server.run_with_shutdown(shutdown),
        )
        .await;
        assert!(result.is_ok());
        assert!(result.unwrap().is_ok());
    }
}
