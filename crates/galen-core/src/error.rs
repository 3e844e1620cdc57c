//! Error types for Galen.
//!
//! This module provides [`FhirError`], the standard request-time error type
//! used throughout the framework, and [`OperationOutcome`], the standardized
//! wire-visible error document every failed request is converted into.
//!
//! The HTTP status mapping follows the FHIR http module: each error kind maps
//! 1:1 to a transport status code and an `OperationOutcome` issue code, e.g.
//! 409 Conflict <-> issue code `conflict`, 410 Gone <-> issue code `deleted`.
//! Internal faults are always reported with a generic diagnostic; the
//! underlying message is never sent to the client.

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Issue severity for an [`OperationOutcome`] issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// The issue caused the action to fail and no further checking was done.
    Fatal,
    /// The issue is sufficiently important to cause the action to fail.
    Error,
    /// The issue is not important enough to cause the action to fail.
    Warning,
    /// The issue has no relation to the degree of success of the action.
    Information,
}

impl IssueSeverity {
    /// Returns the wire representation of this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "information",
        }
    }
}

/// Closed vocabulary of `OperationOutcome` issue type codes used by Galen.
///
/// This is the subset of the FHIR issue-type value set that the framework
/// emits or lets handlers emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    /// Content invalid against the specification or a profile.
    Invalid,
    /// A structural issue in the content.
    Structure,
    /// A required element is missing.
    Required,
    /// An element value is invalid.
    Value,
    /// The reference provided was not found.
    NotFound,
    /// The content/operation failed to pass some business rule.
    BusinessRule,
    /// An edit conflicted with another change.
    Conflict,
    /// The reference pointed to content that has been deleted.
    Deleted,
    /// The user does not have the rights to perform this operation.
    Forbidden,
    /// The operation is not supported.
    NotSupported,
    /// The operation was too costly to perform.
    TooCostly,
    /// The content could not be accepted because of an authorization failure.
    Unknown,
    /// Processing issues.
    Processing,
    /// An unexpected internal error.
    Exception,
}

impl IssueCode {
    /// Returns the wire representation of this code.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Structure => "structure",
            Self::Required => "required",
            Self::Value => "value",
            Self::NotFound => "not-found",
            Self::BusinessRule => "business-rule",
            Self::Conflict => "conflict",
            Self::Deleted => "deleted",
            Self::Forbidden => "forbidden",
            Self::NotSupported => "not-supported",
            Self::TooCostly => "too-costly",
            Self::Unknown => "unknown",
            Self::Processing => "processing",
            Self::Exception => "exception",
        }
    }
}

/// Standard request-time error type for Galen.
///
/// `FhirError` provides structured errors with a fixed HTTP status mapping
/// and conversion into the [`OperationOutcome`] wire document. Handlers
/// return `FhirError` for domain failures; the framework raises it for
/// validation failures before the handler runs.
///
/// # Example
///
/// ```
/// use galen_core::{FhirError, FhirResult};
///
/// fn lookup(id: &str) -> FhirResult<()> {
///     Err(FhirError::not_found("Patient", Some(id)))
/// }
///
/// let err = lookup("123").unwrap_err();
/// assert_eq!(err.status_code().as_u16(), 404);
/// ```
#[derive(Error, Debug)]
pub enum FhirError {
    /// The requested resource does not exist.
    #[error("Unknown {resource_type} resource{}", .id.as_deref().map(|i| format!(" '{i}'")).unwrap_or_default())]
    NotFound {
        /// The resource type that was requested.
        resource_type: String,
        /// The identifier of the resource, if known.
        id: Option<String>,
    },

    /// The request content is invalid (400).
    #[error("{message}")]
    Invalid {
        /// The issue code reported in the `OperationOutcome`.
        code: IssueCode,
        /// Human-readable diagnostics.
        message: String,
    },

    /// The request content is well-formed but semantically unprocessable (422).
    #[error("{message}")]
    Unprocessable {
        /// The issue code reported in the `OperationOutcome`.
        code: IssueCode,
        /// Human-readable diagnostics.
        message: String,
    },

    /// The request conflicts with the current state of the resource (409).
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable diagnostics.
        message: String,
    },

    /// The resource existed but has been deleted (410).
    #[error("Gone: {message}")]
    Gone {
        /// Human-readable diagnostics.
        message: String,
    },

    /// The caller is not authenticated (401).
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable diagnostics.
        message: String,
    },

    /// The caller is authenticated but not permitted (403).
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Human-readable diagnostics.
        message: String,
    },

    /// The interaction is not supported on this route (405).
    #[error("Method not allowed: {message}")]
    MethodNotAllowed {
        /// Human-readable diagnostics.
        message: String,
    },

    /// The operation was refused because it would be too expensive (403).
    #[error("Too costly: {message}")]
    TooCostly {
        /// Human-readable diagnostics.
        message: String,
    },

    /// A fully caller-specified error, for cases the fixed mappings do not
    /// cover.
    #[error("{message}")]
    Custom {
        /// The transport status code to respond with.
        status: StatusCode,
        /// The issue severity reported in the `OperationOutcome`.
        severity: IssueSeverity,
        /// The issue code reported in the `OperationOutcome`.
        code: IssueCode,
        /// Human-readable diagnostics.
        message: String,
    },

    /// An unanticipated internal fault (500).
    ///
    /// The message and source are logged but never sent to the client; the
    /// response carries a generic diagnostic only.
    #[error("Internal error: {message}")]
    Internal {
        /// Internal diagnostics, for logs only.
        message: String,
        /// The underlying error, if any (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl FhirError {
    /// Creates a not-found error for a resource type and optional id.
    #[must_use]
    pub fn not_found(resource_type: impl Into<String>, id: Option<&str>) -> Self {
        Self::NotFound {
            resource_type: resource_type.into(),
            id: id.map(ToString::to_string),
        }
    }

    /// Creates a 400 invalid-content error with the `invalid` issue code.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            code: IssueCode::Invalid,
            message: message.into(),
        }
    }

    /// Creates a 400 invalid-content error with a specific issue code.
    #[must_use]
    pub fn invalid_with_code(code: IssueCode, message: impl Into<String>) -> Self {
        Self::Invalid {
            code,
            message: message.into(),
        }
    }

    /// Creates a 422 unprocessable-entity error.
    #[must_use]
    pub fn unprocessable(code: IssueCode, message: impl Into<String>) -> Self {
        Self::Unprocessable {
            code,
            message: message.into(),
        }
    }

    /// Creates a 409 conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a 410 gone error.
    #[must_use]
    pub fn gone(message: impl Into<String>) -> Self {
        Self::Gone {
            message: message.into(),
        }
    }

    /// Creates a 401 unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a 403 forbidden error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a 405 method-not-allowed error.
    #[must_use]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            message: message.into(),
        }
    }

    /// Creates a 403 too-costly error.
    #[must_use]
    pub fn too_costly(message: impl Into<String>) -> Self {
        Self::TooCostly {
            message: message.into(),
        }
    }

    /// Creates a fully caller-specified error.
    #[must_use]
    pub fn custom(
        status: StatusCode,
        severity: IssueSeverity,
        code: IssueCode,
        message: impl Into<String>,
    ) -> Self {
        Self::Custom {
            status,
            severity,
            code,
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Invalid { .. } => StatusCode::BAD_REQUEST,
            Self::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Gone { .. } => StatusCode::GONE,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } | Self::TooCostly { .. } => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Custom { status, .. } => *status,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the issue severity for this error.
    #[must_use]
    pub const fn severity(&self) -> IssueSeverity {
        match self {
            Self::Custom { severity, .. } => *severity,
            _ => IssueSeverity::Error,
        }
    }

    /// Returns the issue code for this error.
    #[must_use]
    pub const fn issue_code(&self) -> IssueCode {
        match self {
            Self::NotFound { .. } => IssueCode::NotFound,
            Self::Invalid { code, .. }
            | Self::Unprocessable { code, .. }
            | Self::Custom { code, .. } => *code,
            Self::Conflict { .. } => IssueCode::Conflict,
            Self::Gone { .. } => IssueCode::Deleted,
            Self::Unauthorized { .. } => IssueCode::Unknown,
            Self::Forbidden { .. } => IssueCode::Forbidden,
            Self::MethodNotAllowed { .. } => IssueCode::NotSupported,
            Self::TooCostly { .. } => IssueCode::TooCostly,
            Self::Internal { .. } => IssueCode::Exception,
        }
    }

    /// Converts this error into its wire-visible [`OperationOutcome`].
    ///
    /// Internal faults are reported with a generic diagnostic; their message
    /// and source never appear in the document.
    #[must_use]
    pub fn operation_outcome(&self) -> OperationOutcome {
        let diagnostics = match self {
            Self::Internal { .. } => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        OperationOutcome::single(self.severity(), self.issue_code(), diagnostics)
    }
}

/// An issue within an [`OperationOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// How severe the issue is.
    pub severity: IssueSeverity,
    /// The issue type code.
    pub code: IssueCode,
    /// Additional details about the issue.
    pub details: IssueDetails,
    /// FHIRPath expressions locating the issue, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Vec<String>>,
}

/// `details` element of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    /// Human-readable description of the issue.
    pub text: String,
}

/// The standardized error document returned for any failed request.
///
/// Matches the FHIR `OperationOutcome` resource shape: a list of issues,
/// each with a severity, a closed-vocabulary code, and diagnostics text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    /// Always "OperationOutcome".
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    /// The issues in this outcome.
    pub issue: Vec<Issue>,
}

impl OperationOutcome {
    /// Creates an outcome with a single issue.
    #[must_use]
    pub fn single(severity: IssueSeverity, code: IssueCode, text: impl Into<String>) -> Self {
        Self {
            resource_type: "OperationOutcome".to_string(),
            issue: vec![Issue {
                severity,
                code,
                details: IssueDetails { text: text.into() },
                expression: None,
            }],
        }
    }
}
