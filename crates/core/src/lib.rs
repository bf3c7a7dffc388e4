//! Core types and traits for Strata collections
//!
//! This crate defines the foundational types used throughout the system:
//! - JsonValue, JsonPath, PathSegment: document values and sub-document addressing
//! - Cas: opaque optimistic-concurrency token
//! - Document, Fragment, SubdocOp, MutationOutcome: store exchange types
//! - DocumentStore: the store client abstraction collections are built on
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cas;
pub mod error;
pub mod json;
pub mod traits;
pub mod types;

pub use cas::Cas;
pub use error::{Error, Result};
pub use json::{value_type_name, JsonPath, JsonValue, PathSegment};
pub use traits::DocumentStore;
pub use types::{Document, Fragment, MutationOutcome, SubdocOp};
