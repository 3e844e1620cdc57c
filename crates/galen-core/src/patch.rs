//! JSON Patch (RFC 6902) support for the patch interaction.
//!
//! Patch request bodies are structurally validated before the handler runs:
//! the operation vocabulary is closed, paths must be valid JSON Pointers,
//! and each operation must carry exactly the fields its kind requires.

use crate::error::{FhirError, IssueCode};
use serde::{Deserialize, Serialize};

/// A JSON Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Add a value at the target location.
    Add,
    /// Remove the value at the target location.
    Remove,
    /// Replace the value at the target location.
    Replace,
    /// Move a value from one location to another.
    Move,
    /// Copy a value from one location to another.
    Copy,
    /// Test that the target location holds a specific value.
    Test,
}

/// A single JSON Patch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// The operation kind.
    pub op: PatchOp,
    /// Source location for `move` and `copy` operations.
    #[serde(default, rename = "from", skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Target location.
    pub path: String,
    /// The value for `add`, `replace`, and `test` operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// A JSON Patch document: an ordered list of operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonPatch(pub Vec<PatchOperation>);

impl JsonPatch {
    /// Returns the operations in this patch.
    #[must_use]
    pub fn operations(&self) -> &[PatchOperation] {
        &self.0
    }

    /// Validates the structural rules of RFC 6902.
    ///
    /// Checks that every `path` (and `from`, where present) is a valid JSON
    /// Pointer, that `move`/`copy` carry `from`, that `add`/`replace`/`test`
    /// carry `value`, and that no operation carries fields its kind does not
    /// allow.
    pub fn validate(&self) -> Result<(), FhirError> {
        for (index, op) in self.0.iter().enumerate() {
            if !is_json_pointer(&op.path) {
                return Err(invalid_op(index, "'path' is not a valid JSON Pointer"));
            }

            let needs_from = matches!(op.op, PatchOp::Move | PatchOp::Copy);
            match (&op.from, needs_from) {
                (None, true) => return Err(invalid_op(index, "'from' is required")),
                (Some(_), false) => return Err(invalid_op(index, "'from' is not permitted")),
                (Some(from), true) if !is_json_pointer(from) => {
                    return Err(invalid_op(index, "'from' is not a valid JSON Pointer"));
                }
                _ => {}
            }

            let needs_value = matches!(op.op, PatchOp::Add | PatchOp::Replace | PatchOp::Test);
            match (&op.value, needs_value) {
                (None, true) => return Err(invalid_op(index, "'value' is required")),
                (Some(_), false) => return Err(invalid_op(index, "'value' is not permitted")),
                _ => {}
            }
        }
        Ok(())
    }
}

fn invalid_op(index: usize, reason: &str) -> FhirError {
    FhirError::invalid_with_code(
        IssueCode::Structure,
        format!("Invalid patch operation at index {index}: {reason}"),
    )
}

/// Checks the RFC 6901 JSON Pointer grammar: one or more non-empty
/// `/`-prefixed segments.
fn is_json_pointer(pointer: &str) -> bool {
    !pointer.is_empty()
        && pointer.starts_with('/')
        && pointer.split('/').skip(1).all(|segment| !segment.is_empty())
}
