//! Path addressing for collection documents
//!
//! Maps logical collection positions onto sub-document paths. Nothing here
//! checks bounds: whether `[i]` exists is only known when the store
//! evaluates the path, and a missing index comes back as
//! [`MutationOutcome::PathNotFound`](strata_core::MutationOutcome).
//!
//! Indices are `usize`. The store's path language would read `[-1]` as
//! "last element", so negative positions are kept unrepresentable instead of
//! being checked at runtime.

use strata_core::{Error, JsonPath, Result};

/// Path of the array element at `index`, rendered `[index]`
#[inline]
pub fn element(index: usize) -> JsonPath {
    JsonPath::root().index(index)
}

/// Path of the document root, the target of tail appends
#[inline]
pub fn root() -> JsonPath {
    JsonPath::root()
}

/// Path of a map entry
///
/// The key is used verbatim as a single path segment. Empty keys have no
/// path and are rejected.
pub fn entry(key: &str) -> Result<JsonPath> {
    if key.is_empty() {
        return Err(Error::InvalidKey(
            "map keys must not be empty".to_string(),
        ));
    }
    Ok(JsonPath::root().key(key))
}
