//! Strata Collections - distributed collections on a CAS-versioned document store
//!
//! Each collection is one JSON document in a shared store. Handles hold no
//! cached contents: every call goes to the store, so any number of handles,
//! threads or processes can work on the same collection.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use strata_collections::{DocumentList, InMemoryStore};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let list = DocumentList::with_content("tasks", store, vec!["write", "test"])?;
//!
//! let prior = list.set(1, "ship")?;
//! assert_eq!(prior, "test");
//! ```
//!
//! # Architecture
//!
//! - `strata-core`: paths, CAS tokens, store trait and errors
//! - `strata-storage`: in-memory store and contention test harness
//! - `strata-primitives`: list, set, queue and map facades plus cursors

pub use strata_core::{
    Cas, Document, DocumentStore, Error, Fragment, JsonPath, JsonValue, MutationOutcome,
    PathSegment, Result, SubdocOp,
};
pub use strata_primitives::{
    ArrayCursor, CollectionsConfig, CursorState, DocumentList, DocumentMap, DocumentQueue,
    DocumentSet, ListCursor, MapCursor, RetryPolicy, CONFIG_FILE_NAME,
    MAX_OPTIMISTIC_LOCKING_ATTEMPTS,
};
pub use strata_storage::InMemoryStore;

/// Contention injection for exercising retry paths
pub mod testing {
    pub use strata_storage::testing::*;
}
