//! Testing utilities for optimistic-concurrency behavior
//!
//! - **Contention Store**: wraps a store and injects interfering writes ahead
//!   of CAS-guarded mutations, making conflict handling deterministic to test
//!
//! # Example
//!
//! ```ignore
//! use strata_storage::testing::{ContentionConfig, ContentionStore};
//!
//! let store = ContentionStore::new(InMemoryStore::new(), ContentionConfig::always());
//! // every guarded write through `store` now reports a CAS mismatch
//! ```

mod contention;

pub use contention::{ContentionConfig, ContentionStore, Interferer};
