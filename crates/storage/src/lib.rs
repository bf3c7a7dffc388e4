//! Storage layer for Strata collections
//!
//! This crate implements the document store backends collections run on:
//! - InMemoryStore: DashMap-backed store with CAS enforcement
//! - subdoc: server-side evaluation of sub-document operations
//! - testing: contention injection for optimistic-concurrency tests
//!
//! A remote store client plugs in by implementing
//! [`strata_core::DocumentStore`]; nothing above this crate depends on the
//! in-memory backend.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod subdoc;
pub mod testing;

pub use memory::InMemoryStore;
pub use subdoc::PathFailure;
