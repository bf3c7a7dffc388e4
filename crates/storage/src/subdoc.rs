//! Server-side sub-document evaluation
//!
//! Applies a [`SubdocOp`] at a [`JsonPath`] inside a document value. All
//! checks run before the value is touched, so a failed operation leaves the
//! document unchanged.
//!
//! # Semantics
//!
//! | Op | Array index `[i]` | Object key `k` | Root |
//! |----|-------------------|----------------|------|
//! | Replace | `i < len` | key present | invalid |
//! | Insert | `i <= len` (shifts tail) | key absent, else exists | invalid |
//! | Append | target must be an array | target must be an array | root must be an array |
//! | Remove | `i < len` | key present | invalid |

use strata_core::json::{JsonPath, PathSegment};
use strata_core::{MutationOutcome, SubdocOp};

/// Why a sub-document operation was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathFailure {
    /// Path does not resolve
    NotFound,
    /// Insert target already present
    Exists,
    /// Path or op does not match the document's shape
    Invalid,
}

impl From<PathFailure> for MutationOutcome {
    fn from(failure: PathFailure) -> Self {
        match failure {
            PathFailure::NotFound => MutationOutcome::PathNotFound,
            PathFailure::Exists => MutationOutcome::PathExists,
            PathFailure::Invalid => MutationOutcome::PathInvalid,
        }
    }
}

/// Apply `op` at `path` inside `doc`
pub fn apply(
    doc: &mut serde_json::Value,
    path: &JsonPath,
    op: SubdocOp,
) -> Result<(), PathFailure> {
    if let SubdocOp::Append(value) = op {
        let target = path.resolve_mut(doc).ok_or(PathFailure::NotFound)?;
        let arr = target.as_array_mut().ok_or(PathFailure::Invalid)?;
        arr.push(value.into_inner());
        return Ok(());
    }

    let (container_path, last) = path.split_last().ok_or(PathFailure::Invalid)?;
    let container = container_path.resolve_mut(doc).ok_or(PathFailure::NotFound)?;

    match last {
        PathSegment::Index(idx) => {
            let arr = container.as_array_mut().ok_or(PathFailure::Invalid)?;
            let idx = *idx;
            match op {
                SubdocOp::Replace(value) => {
                    let slot = arr.get_mut(idx).ok_or(PathFailure::NotFound)?;
                    *slot = value.into_inner();
                }
                SubdocOp::Insert(value) => {
                    if idx > arr.len() {
                        return Err(PathFailure::NotFound);
                    }
                    arr.insert(idx, value.into_inner());
                }
                SubdocOp::Remove => {
                    if idx >= arr.len() {
                        return Err(PathFailure::NotFound);
                    }
                    arr.remove(idx);
                }
                SubdocOp::Append(_) => return Err(PathFailure::Invalid),
            }
        }
        PathSegment::Key(key) => {
            let obj = container.as_object_mut().ok_or(PathFailure::Invalid)?;
            match op {
                SubdocOp::Replace(value) => {
                    let slot = obj.get_mut(key).ok_or(PathFailure::NotFound)?;
                    *slot = value.into_inner();
                }
                SubdocOp::Insert(value) => {
                    if obj.contains_key(key) {
                        return Err(PathFailure::Exists);
                    }
                    obj.insert(key.clone(), value.into_inner());
                }
                SubdocOp::Remove => {
                    obj.remove(key).ok_or(PathFailure::NotFound)?;
                }
                SubdocOp::Append(_) => return Err(PathFailure::Invalid),
            }
        }
    }
    Ok(())
}
