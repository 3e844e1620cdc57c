//! Core types for the Galen FHIR server framework.
//!
//! This crate contains the types shared by every other Galen crate:
//!
//! - [`InteractionContext`] and [`RequestId`] — per-request state
//! - [`FhirError`] and [`OperationOutcome`] — the standardized error model
//! - [`FhirResource`], [`Id`], [`Bundle`] — the resource-model seam
//! - [`InteractionKind`] — the closed set of FHIR type/instance interactions
//! - [`Container`] — dependency injection for handlers

pub mod context;
pub mod di;
pub mod error;
pub mod interaction;
pub mod patch;
pub mod resource;

pub use context::{InteractionContext, RequestId};
pub use di::Container;
pub use error::{FhirError, FhirResult, Issue, IssueCode, IssueSeverity, OperationOutcome};
pub use interaction::InteractionKind;
pub use patch::{JsonPatch, PatchOp, PatchOperation};
pub use resource::{Bundle, BundleEntry, FhirResource, Id, IdError};
