//! Core trait for the document store abstraction
//!
//! This module defines the DocumentStore trait that collections are written
//! against. Network transport, server-side CAS enforcement and path
//! evaluation all live behind it.

use std::sync::Arc;

use crate::cas::Cas;
use crate::error::Result;
use crate::json::{JsonPath, JsonValue};
use crate::types::{Document, Fragment, MutationOutcome, SubdocOp};

/// Key/document store with sub-document access
///
/// Thread safety: All methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync). Any number of handles may
/// address the same key.
///
/// Document-level failures (missing document, backend errors) are `Err`.
/// Path-level outcomes of a mutation are reported through
/// [`MutationOutcome`] instead.
pub trait DocumentStore: Send + Sync {
    /// Read a whole document
    ///
    /// Returns None if the document doesn't exist.
    fn fetch(&self, key: &str) -> Result<Option<Document>>;

    /// Create a document
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentExists` if the key is already present.
    fn insert(&self, key: &str, value: JsonValue) -> Result<Cas>;

    /// Create or overwrite a document unconditionally
    fn upsert(&self, key: &str, value: JsonValue) -> Result<Cas>;

    /// Delete a document
    ///
    /// Returns true if deleted, false if it didn't exist.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Read the value at a path
    ///
    /// Returns None if the path does not resolve.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` if the document is absent.
    fn lookup_path(&self, key: &str, path: &JsonPath) -> Result<Option<Fragment>>;

    /// Check whether a path resolves
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` if the document is absent.
    fn exists_path(&self, key: &str, path: &JsonPath) -> Result<bool>;

    /// Apply a sub-document mutation
    ///
    /// With `expected = Some(cas)` the write only happens if the document's
    /// current CAS equals `cas`; `None` writes unconditionally.
    ///
    /// # Errors
    ///
    /// Returns `Error::DocumentNotFound` if the document is absent.
    fn mutate_path(
        &self,
        key: &str,
        path: &JsonPath,
        op: SubdocOp,
        expected: Option<Cas>,
    ) -> Result<MutationOutcome>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for Arc<S> {
    fn fetch(&self, key: &str) -> Result<Option<Document>> {
        (**self).fetch(key)
    }

    fn insert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        (**self).insert(key, value)
    }

    fn upsert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        (**self).upsert(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        (**self).remove(key)
    }

    fn lookup_path(&self, key: &str, path: &JsonPath) -> Result<Option<Fragment>> {
        (**self).lookup_path(key, path)
    }

    fn exists_path(&self, key: &str, path: &JsonPath) -> Result<bool> {
        (**self).exists_path(key, path)
    }

    fn mutate_path(
        &self,
        key: &str,
        path: &JsonPath,
        op: SubdocOp,
        expected: Option<Cas>,
    ) -> Result<MutationOutcome> {
        (**self).mutate_path(key, path, op, expected)
    }
}
