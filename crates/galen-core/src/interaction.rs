//! The closed set of FHIR interactions Galen can route.
//!
//! Interaction kinds are fixed by the protocol. The variant order here is
//! the canonical ordering used when registrations are sequenced, so the
//! capability statement and route table are stable across runs.

use serde::{Deserialize, Serialize};

/// A FHIR type-level or instance-level interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    /// Create a new resource (`POST /{type}`).
    Create,
    /// Read a resource by id (`GET /{type}/{id}`).
    Read,
    /// Update a resource by id (`PUT /{type}/{id}`).
    Update,
    /// Patch a resource by id (`PATCH /{type}/{id}`).
    Patch,
    /// Delete a resource by id (`DELETE /{type}/{id}`).
    Delete,
    /// Search across a resource type (`GET /{type}`, `POST /{type}/_search`).
    SearchType,
}

impl InteractionKind {
    /// All interaction kinds in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Create,
        Self::Read,
        Self::Update,
        Self::Patch,
        Self::Delete,
        Self::SearchType,
    ];

    /// Returns the protocol code for this interaction, as it appears in a
    /// capability statement (e.g. "search-type").
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::SearchType => "search-type",
        }
    }
}

impl std::fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
