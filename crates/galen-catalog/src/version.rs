//! Protocol version selection.
//!
//! The active FHIR version is an explicit immutable value chosen once before
//! assembly and threaded through catalog construction. It determines the
//! `fhirVersion` reported in the capability statement.

use serde::{Deserialize, Serialize};

/// A supported FHIR publication sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FhirVersion {
    /// FHIR R4 (4.0.1).
    R4,
    /// FHIR R4B (4.3.0).
    R4B,
    /// FHIR R5 (5.0.0).
    R5,
}

impl FhirVersion {
    /// Returns the exact version string reported in capability statements.
    #[must_use]
    pub const fn version_string(&self) -> &'static str {
        match self {
            Self::R4 => "4.0.1",
            Self::R4B => "4.3.0",
            Self::R5 => "5.0.0",
        }
    }

    /// Returns the sequence name (e.g. "R4B").
    #[must_use]
    pub const fn sequence(&self) -> &'static str {
        match self {
            Self::R4 => "R4",
            Self::R4B => "R4B",
            Self::R5 => "R5",
        }
    }

    /// Parses a sequence name.
    #[must_use]
    pub fn from_sequence(sequence: &str) -> Option<Self> {
        match sequence {
            "R4" => Some(Self::R4),
            "R4B" => Some(Self::R4B),
            "R5" => Some(Self::R5),
            _ => None,
        }
    }
}

impl Default for FhirVersion {
    fn default() -> Self {
        Self::R4B
    }
}

impl std::fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.sequence())
    }
}
