//! Document-backed collections for Strata
//!
//! Each collection lives in one store document under a caller-chosen key:
//! - **DocumentList**: ordered, index-addressed sequence (JSON array)
//! - **DocumentSet**: membership over non-composite values (JSON array)
//! - **DocumentQueue**: FIFO (JSON array, head first)
//! - **DocumentMap**: string-keyed entries (JSON object)
//!
//! ## Design Principle: Stateless Facades
//!
//! A collection holds its key, a [`DocumentStore`](strata_core::DocumentStore)
//! client and a [`RetryPolicy`], nothing else. Content and CAS tokens are
//! read fresh for every call, so any number of handles, in one process or
//! many, can share a key.
//!
//! ## Concurrency
//!
//! Writes addressed by index or key are optimistic: read the current value
//! and its CAS, write guarded by that CAS, re-read and try again on a
//! mismatch, up to [`MAX_OPTIMISTIC_LOCKING_ATTEMPTS`] times. Cursors
//! ([`ListCursor`], [`ArrayCursor`], [`MapCursor`]) work on a snapshot and
//! never retry; a write from outside the cursor makes its next write fail
//! with `Error::ConcurrentModification`.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use strata_primitives::DocumentQueue;
//! use strata_storage::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let jobs = DocumentQueue::<String, _>::open("jobs", store.clone())?;
//! jobs.offer("resize".to_string())?;
//! assert_eq!(jobs.poll()?, Some("resize".to_string()));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cursor;
pub mod list;
pub mod map;
pub mod path;
pub mod protocol;
pub mod queue;
pub mod set;

pub use config::{CollectionsConfig, CONFIG_FILE_NAME};
pub use cursor::{ArrayCursor, CursorState, ListCursor};
pub use list::DocumentList;
pub use map::{DocumentMap, MapCursor};
pub use protocol::{RetryPolicy, MAX_OPTIMISTIC_LOCKING_ATTEMPTS};
pub use queue::DocumentQueue;
pub use set::DocumentSet;
