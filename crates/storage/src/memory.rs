//! In-memory document store
//!
//! DashMap-backed implementation of [`DocumentStore`].
//!
//! # Design
//!
//! - DashMap: sharded by key, lock-free reads
//! - FxHasher: fast non-crypto hash for document keys
//! - One CAS counter for the whole store, so a token is never reused
//!
//! Every mutation runs while holding the shard entry for its key, which makes
//! the CAS check and the write a single atomic step, the same guarantee a
//! remote server gives.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_core::{
    Cas, Document, DocumentStore, Error, Fragment, JsonPath, JsonValue, MutationOutcome, Result,
    SubdocOp,
};
use tracing::trace;

use crate::subdoc;

type FxBuildHasher = BuildHasherDefault<FxHasher>;

#[derive(Debug, Clone)]
struct StoredDocument {
    value: JsonValue,
    cas: Cas,
}

/// Thread-safe in-memory document store
///
/// Share it between collection handles with `Arc<InMemoryStore>`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    documents: DashMap<String, StoredDocument, FxBuildHasher>,
    cas_counter: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents held
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Issue a fresh CAS token
    #[inline]
    fn next_cas(&self) -> Cas {
        Cas::from_raw(self.cas_counter.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

impl DocumentStore for InMemoryStore {
    fn fetch(&self, key: &str) -> Result<Option<Document>> {
        Ok(self.documents.get(key).map(|doc| Document {
            value: doc.value.clone(),
            cas: doc.cas,
        }))
    }

    fn insert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        match self.documents.entry(key.to_string()) {
            Entry::Occupied(_) => Err(Error::DocumentExists(key.to_string())),
            Entry::Vacant(slot) => {
                let cas = self.next_cas();
                slot.insert(StoredDocument { value, cas });
                Ok(cas)
            }
        }
    }

    fn upsert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        let cas = self.next_cas();
        self.documents
            .insert(key.to_string(), StoredDocument { value, cas });
        Ok(cas)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.documents.remove(key).is_some())
    }

    fn lookup_path(&self, key: &str, path: &JsonPath) -> Result<Option<Fragment>> {
        let doc = self
            .documents
            .get(key)
            .ok_or_else(|| Error::DocumentNotFound(key.to_string()))?;
        Ok(path.resolve(doc.value.as_inner()).map(|value| Fragment {
            value: JsonValue::from_value(value.clone()),
            cas: doc.cas,
        }))
    }

    fn exists_path(&self, key: &str, path: &JsonPath) -> Result<bool> {
        let doc = self
            .documents
            .get(key)
            .ok_or_else(|| Error::DocumentNotFound(key.to_string()))?;
        Ok(path.resolve(doc.value.as_inner()).is_some())
    }

    fn mutate_path(
        &self,
        key: &str,
        path: &JsonPath,
        op: SubdocOp,
        expected: Option<Cas>,
    ) -> Result<MutationOutcome> {
        let mut doc = self
            .documents
            .get_mut(key)
            .ok_or_else(|| Error::DocumentNotFound(key.to_string()))?;

        if let Some(expected) = expected {
            if doc.cas != expected {
                return Ok(MutationOutcome::CasMismatch);
            }
        }

        let op_name = op.name();
        if let Err(failure) = subdoc::apply(doc.value.as_inner_mut(), path, op) {
            return Ok(failure.into());
        }

        let cas = self.next_cas();
        doc.cas = cas;
        trace!(key, path = %path, op = op_name, %cas, "applied sub-document mutation");
        Ok(MutationOutcome::Applied(cas))
    }
}
