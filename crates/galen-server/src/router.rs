//! Request routing and path matching.
//!
//! Maps an incoming method + path to the operation id of a synthesized
//! route, extracting the `{id}` path parameter along the way. Binding the
//! same method and template twice is an assembly error, and a path that
//! matches a template under a different method resolves to "method not
//! allowed" rather than "not found".

use std::collections::HashMap;

use http::Method;

use crate::error::AssemblyError;

/// A matched route with extracted path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    operation_id: String,
    params: HashMap<String, String>,
}

impl RouteMatch {
    /// Returns the operation id of the bound route.
    #[must_use]
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Returns a path parameter by name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// The result of resolving a request against the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A route matched.
    Matched(RouteMatch),
    /// The path is known but not under this method.
    MethodNotAllowed,
    /// Nothing matched.
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    segments: Vec<PathSegment>,
    operation_id: String,
}

impl Route {
    fn new(method: Method, pattern: &str, operation_id: String) -> Self {
        Self {
            method,
            segments: parse_segments(pattern),
            operation_id,
        }
    }

    fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if path_segments.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (pattern, actual) in self.segments.iter().zip(path_segments.iter()) {
            match pattern {
                PathSegment::Literal(expected) => {
                    if expected != *actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    params.insert(name.clone(), (*actual).to_string());
                }
            }
        }

        Some(params)
    }
}

fn parse_segments(pattern: &str) -> Vec<PathSegment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            if s.starts_with('{') && s.ends_with('}') {
                PathSegment::Param(s[1..s.len() - 1].to_string())
            } else {
                PathSegment::Literal(s.to_string())
            }
        })
        .collect()
}

/// Route table for synthesized routes.
///
/// # Example
///
/// ```
/// use galen_server::{RouteOutcome, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router.add_route(Method::GET, "/Patient/{id}", "Patient-read").unwrap();
///
/// match router.resolve(&Method::GET, "/Patient/123") {
///     RouteOutcome::Matched(m) => {
///         assert_eq!(m.operation_id(), "Patient-read");
///         assert_eq!(m.param("id"), Some("123"));
///     }
///     other => panic!("unexpected outcome: {other:?}"),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Binds a route.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::DuplicateRoute`] when the same method and
    /// template are already bound. Templates are compared structurally, so
    /// `/Patient/{id}` and `/Patient/{identifier}` collide.
    pub fn add_route(
        &mut self,
        method: Method,
        pattern: impl AsRef<str>,
        operation_id: impl Into<String>,
    ) -> Result<(), AssemblyError> {
        let pattern = pattern.as_ref();
        let segments = parse_segments(pattern);

        let collides = self.routes.iter().any(|r| {
            r.method == method
                && r.segments.len() == segments.len()
                && r.segments.iter().zip(segments.iter()).all(|(a, b)| {
                    match (a, b) {
                        (PathSegment::Literal(x), PathSegment::Literal(y)) => x == y,
                        // Any two parameter segments shadow each other.
                        (PathSegment::Param(_), PathSegment::Param(_)) => true,
                        _ => false,
                    }
                })
        });
        if collides {
            return Err(AssemblyError::DuplicateRoute {
                method,
                path: pattern.to_string(),
            });
        }

        self.routes
            .push(Route::new(method, pattern, operation_id.into()));
        Ok(())
    }

    /// Returns the number of bound routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Resolves a request against the route table.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> RouteOutcome {
        let mut path_known = false;

        for route in &self.routes {
            if let Some(params) = route.match_path(path) {
                if route.method == *method {
                    return RouteOutcome::Matched(RouteMatch {
                        operation_id: route.operation_id.clone(),
                        params,
                    });
                }
                path_known = true;
            }
        }

        if path_known {
            RouteOutcome::MethodNotAllowed
        } else {
            RouteOutcome::NotFound
        }
    }
}
