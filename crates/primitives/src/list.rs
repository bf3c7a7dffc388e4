//! DocumentList: ordered, index-addressed sequence in one array document
//!
//! ## Design
//!
//! `DocumentList` holds only its key, a store client and a retry policy.
//! Nothing is cached between calls, so any number of handles (in this
//! process or elsewhere) can address the same key.
//!
//! - `get`, `len`, `contains`: reads, never retried
//! - `set`, `remove`, `remove_item`: CAS-guarded read-modify-write with
//!   bounded retry
//! - `insert`, `push`: unguarded inserts; concurrent inserts at the same
//!   index land in whatever order the store applies them
//! - `clear`: one unconditional upsert of `[]`
//!
//! ## Example
//!
//! ```ignore
//! let list = DocumentList::with_content("todo", store, ["a", "b"].map(String::from))?;
//! list.push("c".to_string())?;
//! assert_eq!(list.remove(0)?, "a");
//! ```

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{DocumentStore, Error, JsonValue, MutationOutcome, Result, SubdocOp};

use crate::cursor::ListCursor;
use crate::path;
use crate::protocol::{decode, encode, DocumentHandle, RetryPolicy};

/// List of `T` stored as a JSON array under one key
pub struct DocumentList<T, S> {
    doc: DocumentHandle<S>,
    _element: PhantomData<fn() -> T>,
}

impl<T, S> DocumentList<T, S>
where
    T: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    /// Open the list at `key`, creating an empty one if absent
    ///
    /// Existing content is kept.
    pub fn open(key: impl Into<String>, store: S) -> Result<Self> {
        let list = Self::handle(key.into(), store);
        list.doc.create_if_absent(JsonValue::array())?;
        Ok(list)
    }

    /// Open the list at `key` and replace its content with `items`
    pub fn with_content(
        key: impl Into<String>,
        store: S,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self> {
        let values = items
            .into_iter()
            .map(|item| encode(&item).map(JsonValue::into_inner))
            .collect::<Result<Vec<_>>>()?;
        let list = Self::handle(key.into(), store);
        list.doc.reset(JsonValue::from_value(values.into()))?;
        Ok(list)
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

    /// Retry policy in effect
    pub fn retry_policy(&self) -> RetryPolicy {
        self.doc.retry_policy()
    }

    /// Key of the backing document
    pub fn key(&self) -> &str {
        self.doc.key()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Result<T> {
        match self.doc.lookup(&path::element(index))? {
            Some(fragment) => decode(fragment.value),
            None => Err(Error::IndexOutOfBounds { index }),
        }
    }

    /// Replace the element at `index`, returning the previous one
    pub fn set(&self, index: usize, element: T) -> Result<T> {
        let op = SubdocOp::Replace(encode(&element)?);
        match self
            .doc
            .read_modify_write("set", &path::element(index), &op)?
        {
            Some(prior) => decode(prior),
            None => Err(Error::IndexOutOfBounds { index }),
        }
    }

    /// Insert `element` at `index`, shifting later elements up
    ///
    /// `index == len` appends. The insert is not CAS-guarded.
    pub fn insert(&self, index: usize, element: T) -> Result<()> {
        let path = path::element(index);
        match self
            .doc
            .mutate(&path, SubdocOp::Insert(encode(&element)?), None)?
        {
            MutationOutcome::Applied(_) => Ok(()),
            MutationOutcome::PathNotFound => Err(Error::IndexOutOfBounds { index }),
            outcome => Err(self.doc.rejected("insert", &path, outcome)),
        }
    }

    /// Append `element` at the tail
    pub fn push(&self, element: T) -> Result<()> {
        let path = path::root();
        match self
            .doc
            .mutate(&path, SubdocOp::Append(encode(&element)?), None)?
        {
            MutationOutcome::Applied(_) => Ok(()),
            outcome => Err(self.doc.rejected("push", &path, outcome)),
        }
    }

    /// Remove and return the element at `index`
    pub fn remove(&self, index: usize) -> Result<T> {
        match self
            .doc
            .read_modify_write("remove", &path::element(index), &SubdocOp::Remove)?
        {
            Some(prior) => decode(prior),
            None => Err(Error::IndexOutOfBounds { index }),
        }
    }

    /// Remove the first element equal to `element`
    ///
    /// Returns `false` when no element matched.
    pub fn remove_item(&self, element: &T) -> Result<bool> {
        let wanted = encode(element)?;
        self.doc.remove_first_match("remove_item", &wanted)
    }

    /// Number of elements
    pub fn len(&self) -> Result<usize> {
        Ok(self.doc.fetch_array()?.0.len())
    }

    /// Whether the list has no elements
    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.doc.exists(&path::element(0))?)
    }

    /// Whether any element equals `element`
    pub fn contains(&self, element: &T) -> Result<bool> {
        Ok(self.index_of(element)?.is_some())
    }

    /// Index of the first element equal to `element`
    pub fn index_of(&self, element: &T) -> Result<Option<usize>> {
        let wanted = encode(element)?.into_inner();
        let (items, _) = self.doc.fetch_array()?;
        Ok(items.iter().position(|item| *item == wanted))
    }

    /// Remove every element
    pub fn clear(&self) -> Result<()> {
        self.doc.reset(JsonValue::array())?;
        Ok(())
    }

    /// All elements, in order
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let (items, _) = self.doc.fetch_array()?;
        items
            .into_iter()
            .map(|item| decode(JsonValue::from_value(item)))
            .collect()
    }

    /// Cursor positioned before the first element
    pub fn cursor(&self) -> Result<ListCursor<'_, T, S>> {
        ListCursor::new(&self.doc, 0)
    }

    /// Cursor positioned before `index`
    ///
    /// `index` may equal the length, leaving the cursor at the end.
    pub fn cursor_at(&self, index: usize) -> Result<ListCursor<'_, T, S>> {
        ListCursor::new(&self.doc, index)
    }
}

impl<T, S: std::fmt::Debug> std::fmt::Debug for DocumentList<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentList").field("doc", &self.doc).finish()
    }
}
