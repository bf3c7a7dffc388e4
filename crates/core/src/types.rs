//! Store exchange types
//!
//! Values passed across the [`DocumentStore`](crate::traits::DocumentStore)
//! boundary: full-document snapshots, path-scoped fragments, sub-document
//! operations and their outcomes.

use crate::cas::Cas;
use crate::json::JsonValue;

/// A full-document snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document content
    pub value: JsonValue,
    /// CAS of the snapshot
    pub cas: Cas,
}

/// A path-scoped read result
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Value found at the path
    pub value: JsonValue,
    /// CAS of the whole document at read time
    pub cas: Cas,
}

/// Sub-document mutation applied at a path
#[derive(Debug, Clone, PartialEq)]
pub enum SubdocOp {
    /// Overwrite an existing element or key
    Replace(JsonValue),
    /// Insert at an array index (shifting the tail) or add a new object key
    Insert(JsonValue),
    /// Push onto the end of the array at the path
    Append(JsonValue),
    /// Delete the element or key at the path
    Remove,
}

impl SubdocOp {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SubdocOp::Replace(_) => "replace",
            SubdocOp::Insert(_) => "insert",
            SubdocOp::Append(_) => "append",
            SubdocOp::Remove => "remove",
        }
    }
}

/// Outcome of a path-scoped mutation
///
/// Every expected result of a conditional write is a variant here, so the
/// retry loop can branch on it without treating conflicts as failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Mutation applied; the document now has this CAS
    Applied(Cas),
    /// The document's CAS no longer matches the expected one
    CasMismatch,
    /// The path does not resolve in the current document
    PathNotFound,
    /// Insert at an object key that is already present
    PathExists,
    /// The path or operation does not fit the document's shape
    PathInvalid,
}

impl MutationOutcome {
    /// New CAS if the mutation was applied
    pub fn applied(self) -> Option<Cas> {
        match self {
            MutationOutcome::Applied(cas) => Some(cas),
            _ => None,
        }
    }
}
