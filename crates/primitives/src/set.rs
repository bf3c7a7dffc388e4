//! DocumentSet: unordered membership over one array document
//!
//! Elements must serialize to non-composite JSON (string, number, boolean
//! or null). Membership is JSON value equality on the stored form, so `1`,
//! `1.0` and `"1"` are three different members. Composite values are
//! rejected with `Error::UnsupportedType` before the store is contacted.
//!
//! There is no server-side membership primitive: `add` and `remove` scan a
//! fresh full read, then write at the position found, guarded by the CAS of
//! that read.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{DocumentStore, JsonValue, MutationOutcome, Result, SubdocOp};

use crate::cursor::ArrayCursor;
use crate::path;
use crate::protocol::{decode, encode_primitive, Attempt, DocumentHandle, RetryPolicy};

/// Set of `T` stored as a duplicate-free JSON array under one key
pub struct DocumentSet<T, S> {
    doc: DocumentHandle<S>,
    _element: PhantomData<fn() -> T>,
}

impl<T, S> DocumentSet<T, S>
where
    T: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    /// Open the set at `key`, creating an empty one if absent
    pub fn open(key: impl Into<String>, store: S) -> Result<Self> {
        let set = Self::handle(key.into(), store);
        set.doc.create_if_absent(JsonValue::array())?;
        Ok(set)
    }

    /// Open the set at `key` and replace its content with `items`
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn with_content(
        key: impl Into<String>,
        store: S,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self> {
        let mut values: Vec<serde_json::Value> = Vec::new();
        for item in items {
            let value = encode_primitive(&item)?.into_inner();
            if !values.contains(&value) {
                values.push(value);
            }
        }
        let set = Self::handle(key.into(), store);
        set.doc.reset(JsonValue::from_value(values.into()))?;
        Ok(set)
    }

    fn handle(key: String, store: S) -> Self {
        Self {
            doc: DocumentHandle::new(key, store),
            _element: PhantomData,
        }
    }

    /// Use `policy` for CAS retries
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.doc.set_retry_policy(policy);
        self
    }

    /// Key of the backing document
    pub fn key(&self) -> &str {
        self.doc.key()
    }

    /// Number of members
    pub fn len(&self) -> Result<usize> {
        Ok(self.doc.fetch_array()?.0.len())
    }

    /// Whether the set has no members
    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.doc.exists(&path::element(0))?)
    }

    /// Whether `element` is a member
    pub fn contains(&self, element: &T) -> Result<bool> {
        let wanted = encode_primitive(element)?.into_inner();
        let (items, _) = self.doc.fetch_array()?;
        Ok(items.contains(&wanted))
    }

    /// Add `element`, returning `false` if it was already a member
    pub fn add(&self, element: T) -> Result<bool> {
        let value = encode_primitive(&element)?;
        let root = path::root();
        self.doc.retrying("add", || {
            let (items, cas) = self.doc.fetch_array()?;
            if items.contains(value.as_inner()) {
                return Ok(Attempt::Done(false));
            }
            match self
                .doc
                .mutate(&root, SubdocOp::Append(value.clone()), Some(cas))?
            {
                MutationOutcome::Applied(_) => Ok(Attempt::Done(true)),
                MutationOutcome::CasMismatch => Ok(Attempt::Conflict),
                outcome => Err(self.doc.rejected("add", &root, outcome)),
            }
        })
    }

    /// Remove `element`, returning `false` if it was not a member
    pub fn remove(&self, element: &T) -> Result<bool> {
        let wanted = encode_primitive(element)?;
        self.doc.remove_first_match("remove", &wanted)
    }

    /// Remove every member
    pub fn clear(&self) -> Result<()> {
        self.doc.reset(JsonValue::array())?;
        Ok(())
    }

    /// All members, in storage order
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let (items, _) = self.doc.fetch_array()?;
        items
            .into_iter()
            .map(|item| decode(JsonValue::from_value(item)))
            .collect()
    }

    /// Forward-only cursor over a snapshot of the members
    pub fn iter(&self) -> Result<ArrayCursor<'_, T, S>> {
        ArrayCursor::new(&self.doc)
    }
}

impl<T, S: std::fmt::Debug> std::fmt::Debug for DocumentSet<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSet").field("doc", &self.doc).finish()
    }
}
