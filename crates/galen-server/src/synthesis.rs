//! Route synthesis.
//!
//! Every registration is turned into one or two [`SynthesizedRoute`]s: an
//! explicit [`RouteSpec`] descriptor (method, path template, documentation,
//! parameter list) paired with a type-erased async callable. The router and
//! the capability statement consult the descriptor; request parsing is
//! driven by it, so what is documented and what is parsed never drift
//! apart.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::Value;

use galen_catalog::{Catalog, SearchParamType};
use galen_core::{FhirError, Id, InteractionContext, InteractionKind, IssueCode};

use crate::error::AssemblyError;
use crate::provider::{BoxFhirFuture, InteractionHandler, Registration};
use crate::search;

/// Where a request parameter lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    /// A path segment, e.g. `{id}`.
    Path,
    /// A query-string (or search form body) parameter.
    Query,
}

/// Descriptor for one request parameter of a synthesized route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Where the parameter is carried.
    pub location: ParamLocation,
    /// Declared search parameter type, for query parameters.
    pub param_type: Option<SearchParamType>,
    /// Human-readable documentation.
    pub documentation: String,
    /// Whether the parameter is listed in the capability statement.
    pub visible: bool,
}

/// Descriptor for one synthesized route.
///
/// Descriptors are pure data: synthesizing the same registration against
/// the same catalog always yields an equal descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSpec {
    /// HTTP method.
    pub method: Method,
    /// Path template, e.g. `/Patient/{id}`.
    pub path: String,
    /// Unique operation identifier, e.g. `Patient-read`.
    pub operation_id: String,
    /// One-line documentation summary.
    pub summary: String,
    /// Longer documentation.
    pub description: String,
    /// Status code on success.
    pub success_status: StatusCode,
    /// The resource type served.
    pub resource_type: String,
    /// The interaction kind served.
    pub interaction: InteractionKind,
    /// Ordered request parameters.
    pub params: Vec<ParamSpec>,
    /// Whether the route is listed in the capability statement.
    pub visible: bool,
}

/// Transport-level parts handed to a route callable.
#[derive(Debug)]
pub struct CallParts {
    /// The request context.
    pub ctx: InteractionContext,
    /// The `{id}` path parameter, when the template has one.
    pub id: Option<String>,
    /// Raw request body.
    pub body: Bytes,
    /// Query pairs, already merged with the search form body if any.
    pub query: Vec<(String, String)>,
}

/// The protocol-level outcome of a successful interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FhirResponse {
    /// HTTP status to emit.
    pub status: StatusCode,
    /// Response document, absent for delete.
    pub payload: Option<Value>,
    /// Id of a newly created resource, for the `Location` header.
    pub created_id: Option<Id>,
}

/// Type-erased async route callable.
pub type RouteCallable = Arc<dyn Fn(CallParts) -> BoxFhirFuture<FhirResponse> + Send + Sync>;

/// A descriptor and its callable, ready for binding.
#[derive(Clone)]
pub struct SynthesizedRoute {
    /// The route descriptor.
    pub spec: RouteSpec,
    /// The callable invoked when the route matches.
    pub callable: RouteCallable,
}

impl std::fmt::Debug for SynthesizedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesizedRoute")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Synthesizes the route(s) for one registration.
///
/// Search registrations yield two routes (`GET /{type}` and
/// `POST /{type}/_search`) sharing one callable; every other kind yields
/// exactly one.
///
/// # Errors
///
/// Returns [`AssemblyError::DependencyNameCollision`] when a declared
/// dependency name is also a legal search parameter of the resource type.
pub fn synthesize(
    registration: &Registration,
    catalog: &Catalog,
) -> Result<Vec<SynthesizedRoute>, AssemblyError> {
    let resource_type = registration.resource_type().to_string();
    let kind = registration.kind();
    let options = registration.options();

    for name in options.dependency_names() {
        if catalog.is_legal_parameter(&resource_type, name) {
            return Err(AssemblyError::DependencyNameCollision {
                name: name.clone(),
                resource_type: resource_type.clone(),
            });
        }
    }

    let summary = options
        .summary_text()
        .map_or_else(|| default_summary(&resource_type, kind), String::from);
    let description = options
        .description_text()
        .map_or_else(|| default_description(&resource_type, kind), String::from);
    let visible = options.is_visible();

    let spec = |method: Method, path: String, op_suffix: &str, status: StatusCode, params| {
        RouteSpec {
            method,
            path,
            operation_id: format!("{resource_type}-{op_suffix}"),
            summary: summary.clone(),
            description: description.clone(),
            success_status: status,
            resource_type: resource_type.clone(),
            interaction: kind,
            params,
            visible,
        }
    };

    let routes = match registration.handler() {
        InteractionHandler::Create(handler) => {
            let handler = Arc::clone(handler);
            let callable: RouteCallable = Arc::new(move |parts: CallParts| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let (id, payload) = handler(parts.ctx, parts.body).await?;
                    Ok(FhirResponse {
                        status: StatusCode::CREATED,
                        payload: Some(payload),
                        created_id: id,
                    })
                })
            });
            vec![SynthesizedRoute {
                spec: spec(
                    Method::POST,
                    format!("/{resource_type}"),
                    "create",
                    StatusCode::CREATED,
                    Vec::new(),
                ),
                callable,
            }]
        }
        InteractionHandler::Read(handler) => {
            let handler = Arc::clone(handler);
            let callable: RouteCallable = Arc::new(move |parts: CallParts| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let id = require_id(&parts)?;
                    let payload = handler(parts.ctx, id).await?;
                    Ok(ok_response(payload))
                })
            });
            vec![SynthesizedRoute {
                spec: spec(
                    Method::GET,
                    format!("/{resource_type}/{{id}}"),
                    "read",
                    StatusCode::OK,
                    vec![id_param(&resource_type)],
                ),
                callable,
            }]
        }
        InteractionHandler::Update(handler) => {
            let handler = Arc::clone(handler);
            let callable: RouteCallable = Arc::new(move |parts: CallParts| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let id = require_id(&parts)?;
                    let payload = handler(parts.ctx, id, parts.body).await?;
                    Ok(ok_response(payload))
                })
            });
            vec![SynthesizedRoute {
                spec: spec(
                    Method::PUT,
                    format!("/{resource_type}/{{id}}"),
                    "update",
                    StatusCode::OK,
                    vec![id_param(&resource_type)],
                ),
                callable,
            }]
        }
        InteractionHandler::Patch(handler) => {
            let handler = Arc::clone(handler);
            let callable: RouteCallable = Arc::new(move |parts: CallParts| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let id = require_id(&parts)?;
                    let payload = handler(parts.ctx, id, parts.body).await?;
                    Ok(ok_response(payload))
                })
            });
            vec![SynthesizedRoute {
                spec: spec(
                    Method::PATCH,
                    format!("/{resource_type}/{{id}}"),
                    "patch",
                    StatusCode::OK,
                    vec![id_param(&resource_type)],
                ),
                callable,
            }]
        }
        InteractionHandler::Delete(handler) => {
            let handler = Arc::clone(handler);
            let callable: RouteCallable = Arc::new(move |parts: CallParts| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let id = require_id(&parts)?;
                    handler(parts.ctx, id).await?;
                    Ok(FhirResponse {
                        status: StatusCode::NO_CONTENT,
                        payload: None,
                        created_id: None,
                    })
                })
            });
            vec![SynthesizedRoute {
                spec: spec(
                    Method::DELETE,
                    format!("/{resource_type}/{{id}}"),
                    "delete",
                    StatusCode::NO_CONTENT,
                    vec![id_param(&resource_type)],
                ),
                callable,
            }]
        }
        InteractionHandler::Search(handler) => {
            let search_params = search_param_specs(catalog, &resource_type);

            let callable = {
                let handler = Arc::clone(handler);
                let catalog = catalog.clone();
                let resource_type = resource_type.clone();
                let callable: RouteCallable = Arc::new(move |parts: CallParts| {
                    let handler = Arc::clone(&handler);
                    let catalog = catalog.clone();
                    let resource_type = resource_type.clone();
                    Box::pin(async move {
                        let args =
                            search::collect_search_args(&catalog, &resource_type, &parts.query)?;
                        let payload = handler(parts.ctx, args).await?;
                        Ok(ok_response(payload))
                    })
                });
                callable
            };

            vec![
                SynthesizedRoute {
                    spec: spec(
                        Method::GET,
                        format!("/{resource_type}"),
                        "search-type",
                        StatusCode::OK,
                        search_params.clone(),
                    ),
                    callable: Arc::clone(&callable),
                },
                SynthesizedRoute {
                    spec: spec(
                        Method::POST,
                        format!("/{resource_type}/_search"),
                        "search-type-post",
                        StatusCode::OK,
                        search_params,
                    ),
                    callable,
                },
            ]
        }
    };

    Ok(routes)
}

fn ok_response(payload: Value) -> FhirResponse {
    FhirResponse {
        status: StatusCode::OK,
        payload: Some(payload),
        created_id: None,
    }
}

/// Extracts and grammar-checks the `{id}` path parameter.
fn require_id(parts: &CallParts) -> Result<Id, FhirError> {
    let raw = parts
        .id
        .as_deref()
        .ok_or_else(|| FhirError::internal("route matched without an id segment"))?;
    raw.parse::<Id>().map_err(|e| {
        FhirError::invalid_with_code(IssueCode::Value, format!("invalid resource id: {e}"))
    })
}

fn id_param(resource_type: &str) -> ParamSpec {
    ParamSpec {
        name: "id".to_string(),
        location: ParamLocation::Path,
        param_type: None,
        documentation: format!("Logical id of the {resource_type} resource"),
        visible: true,
    }
}

fn search_param_specs(catalog: &Catalog, resource_type: &str) -> Vec<ParamSpec> {
    catalog
        .search_parameters(resource_type)
        .into_iter()
        .map(|p| ParamSpec {
            name: p.name().to_string(),
            location: ParamLocation::Query,
            param_type: Some(p.param_type()),
            documentation: p.description().to_string(),
            visible: p.include_in_capability(),
        })
        .collect()
}

fn default_summary(resource_type: &str, kind: InteractionKind) -> String {
    format!("{resource_type} {}", kind.code())
}

fn default_description(resource_type: &str, kind: InteractionKind) -> String {
    match kind {
        InteractionKind::Create => format!(
            "The create interaction creates a new {resource_type} resource in a server-assigned location."
        ),
        InteractionKind::Read => format!(
            "The read interaction accesses the current contents of a {resource_type} resource."
        ),
        InteractionKind::Update => format!(
            "The update interaction creates a new current version for an existing {resource_type} resource."
        ),
        InteractionKind::Patch => format!(
            "The patch interaction modifies part of an existing {resource_type} resource."
        ),
        InteractionKind::Delete => {
            format!("The delete interaction removes an existing {resource_type} resource.")
        }
        InteractionKind::SearchType => format!(
            "The search-type interaction searches the set of {resource_type} resources by given criteria."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FhirProvider, RouteOptions};
    use galen_catalog::{FhirVersion, SearchParamSpec};
    use galen_core::FhirResource;
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

    fn catalog() -> Catalog {
        Catalog::builder(FhirVersion::R4B)
            .custom_parameter(
                "Patient",
                SearchParamSpec::builder("nickname", SearchParamType::String)
                    .description("Nickname")
                    .uri("https://example.org/sp/nickname")
                    .build(),
            )
            .unwrap()
            .build()
    }

    fn parts(id: Option<&str>, body: &str, query: &[(&str, &str)]) -> CallParts {
        CallParts {
            ctx: InteractionContext::mock(),
            id: id.map(String::from),
            body: Bytes::from(body.to_string()),
            query: query
                .iter()
                .map(|(n, v)| ((*n).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_read_spec_shape() {
        let mut provider = FhirProvider::new();
        provider.register_read::<Patient, _, _>(|_ctx, id| async move {
            Ok(Patient {
                resource_type: "Patient".to_string(),
                id: Some(id),
                name: "x".to_string(),
            })
        });

        let routes = synthesize(&provider.registrations()[0], &catalog()).unwrap();
        assert_eq!(routes.len(), 1);

        let spec = &routes[0].spec;
        assert_eq!(spec.method, Method::GET);
        assert_eq!(spec.path, "/Patient/{id}");
        assert_eq!(spec.operation_id, "Patient-read");
        assert_eq!(spec.success_status, StatusCode::OK);
        assert_eq!(spec.params.len(), 1);
        assert_eq!(spec.params[0].name, "id");
        assert_eq!(spec.params[0].location, ParamLocation::Path);
    }

    #[test]
    fn test_search_yields_two_routes_with_shared_params() {
        let mut provider = FhirProvider::new();
        provider.register_search::<Patient, _, _>(|_ctx, _args| async move {
            Ok(galen_core::Bundle::searchset(Vec::new()))
        });

        let routes = synthesize(&provider.registrations()[0], &catalog()).unwrap();
        assert_eq!(routes.len(), 2);

        assert_eq!(routes[0].spec.method, Method::GET);
        assert_eq!(routes[0].spec.path, "/Patient");
        assert_eq!(routes[1].spec.method, Method::POST);
        assert_eq!(routes[1].spec.path, "/Patient/_search");

        // Same descriptor parameter list on both routes.
        assert_eq!(routes[0].spec.params, routes[1].spec.params);

        let names: Vec<&str> = routes[0]
            .spec
            .params
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, ["_id", "_lastUpdated", "_count", "_sort", "nickname"]);

        // Result-control parameters are supported but hidden.
        let count = routes[0]
            .spec
            .params
            .iter()
            .find(|p| p.name == "_count")
            .unwrap();
        assert!(!count.visible);
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let build = || {
            let mut provider = FhirProvider::new();
            provider.register_search::<Patient, _, _>(|_ctx, _args| async move {
                Ok(galen_core::Bundle::searchset(Vec::new()))
            });
            synthesize(&provider.registrations()[0], &catalog())
                .unwrap()
                .into_iter()
                .map(|r| r.spec)
                .collect::<Vec<_>>()
        };

        assert_eq!(build(), build());
    }

    #[test]
    fn test_dependency_collision_rejected() {
        let mut provider = FhirProvider::new();
        provider.register_search_with::<Patient, _, _>(
            |_ctx, _args| async move { Ok(galen_core::Bundle::searchset(Vec::new())) },
            RouteOptions::new().dependency("nickname"),
        );

        let err = synthesize(&provider.registrations()[0], &catalog()).unwrap_err();
        assert!(matches!(
            err,
            AssemblyError::DependencyNameCollision { .. }
        ));
    }

    #[tokio::test]
    async fn test_callable_rejects_bad_id_grammar() {
        let mut provider = FhirProvider::new();
        provider.register_read::<Patient, _, _>(|_ctx, id| async move {
            Ok(Patient {
                resource_type: "Patient".to_string(),
                id: Some(id),
                name: "x".to_string(),
            })
        });

        let routes = synthesize(&provider.registrations()[0], &catalog()).unwrap();
        let err = (routes[0].callable)(parts(Some("bad!id"), "", &[]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_callable_carries_created_id() {
        let mut provider = FhirProvider::new();
        provider.register_create::<Patient, _, _>(|_ctx, mut p: Patient| async move {
            p.id = Some("p7".parse().map_err(|_| FhirError::internal("id"))?);
            Ok(p)
        });

        let routes = synthesize(&provider.registrations()[0], &catalog()).unwrap();
        let response = (routes[0].callable)(parts(
            None,
            r#"{"resourceType":"Patient","name":"Ada"}"#,
            &[],
        ))
        .await
        .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.created_id.unwrap().as_str(), "p7");
    }

    #[tokio::test]
    async fn test_search_callable_filters_and_types_args() {
        let mut provider = FhirProvider::new();
        provider.register_search::<Patient, _, _>(|_ctx, args| async move {
            assert_eq!(args.get("nickname"), Some("Bob"));
            assert!(!args.contains("bogus"));
            Ok(galen_core::Bundle::searchset(Vec::new()))
        });

        let routes = synthesize(&provider.registrations()[0], &catalog()).unwrap();
        let response = (routes[0].callable)(parts(
            None,
            "",
            &[("nickname", "Bob"), ("bogus", "x")],
        ))
        .await
        .unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }
}
