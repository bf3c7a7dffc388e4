//! DocumentQueue: FIFO over one array document
//!
//! `offer` appends at the tail without a CAS guard; appends from different
//! clients never conflict. `poll` reads the head and removes `[0]` guarded
//! by the CAS of that read, so two consumers can never both take the same
//! element.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{DocumentStore, JsonValue, MutationOutcome, Result, SubdocOp};

use crate::cursor::ArrayCursor;
use crate::path;
use crate::protocol::{decode, encode, DocumentHandle, RetryPolicy};

/// Queue of `T` stored as a JSON array under one key, head first
pub struct DocumentQueue<T, S> {
    doc: DocumentHandle<S>,
    _element: PhantomData<fn() -> T>,
}

impl<T, S> DocumentQueue<T, S>
where
    T: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    /// Open the queue at `key`, creating an empty one if absent
    pub fn open(key: impl Into<String>, store: S) -> Result<Self> {
        let queue = Self::handle(key.into(), store);
        queue.doc.create_if_absent(JsonValue::array())?;
        Ok(queue)
    }

    /// Open the queue at `key` and replace its content with `items`, head first
    pub fn with_content(
        key: impl Into<String>,
        store: S,
        items: impl IntoIterator<Item = T>,
    ) -> Result<Self> {
        let values = items
            .into_iter()
            .map(|item| encode(&item).map(JsonValue::into_inner))
            .collect::<Result<Vec<_>>>()?;
        let queue = Self::handle(key.into(), store);
        queue.doc.reset(JsonValue::from_value(values.into()))?;
        Ok(queue)
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

    /// Enqueue at the tail
    pub fn offer(&self, element: T) -> Result<()> {
        let root = path::root();
        match self
            .doc
            .mutate(&root, SubdocOp::Append(encode(&element)?), None)?
        {
            MutationOutcome::Applied(_) => Ok(()),
            outcome => Err(self.doc.rejected("offer", &root, outcome)),
        }
    }

    /// Dequeue the head, `None` when empty
    pub fn poll(&self) -> Result<Option<T>> {
        self.doc
            .read_modify_write("poll", &path::element(0), &SubdocOp::Remove)?
            .map(decode)
            .transpose()
    }

    /// Head without removing it, `None` when empty
    pub fn peek(&self) -> Result<Option<T>> {
        self.doc
            .lookup(&path::element(0))?
            .map(|fragment| decode(fragment.value))
            .transpose()
    }

    /// Number of queued elements
    pub fn len(&self) -> Result<usize> {
        Ok(self.doc.fetch_array()?.0.len())
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.doc.exists(&path::element(0))?)
    }

    /// Drop every queued element
    pub fn clear(&self) -> Result<()> {
        self.doc.reset(JsonValue::array())?;
        Ok(())
    }

    /// All queued elements, head first
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let (items, _) = self.doc.fetch_array()?;
        items
            .into_iter()
            .map(|item| decode(JsonValue::from_value(item)))
            .collect()
    }

    /// Forward-only cursor from head to tail over a snapshot
    pub fn iter(&self) -> Result<ArrayCursor<'_, T, S>> {
        ArrayCursor::new(&self.doc)
    }
}

impl<T, S: std::fmt::Debug> std::fmt::Debug for DocumentQueue<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentQueue")
            .field("doc", &self.doc)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_storage::InMemoryStore;

    fn setup() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn test_fifo_order() {
        let queue = DocumentQueue::<u32, _>::open("q", setup()).unwrap();
        for i in 0..5 {
            queue.offer(i).unwrap();
        }
        let drained: Vec<u32> = std::iter::from_fn(|| queue.poll().unwrap()).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(queue.poll().unwrap().is_none());
    }

    #[test]
    fn test_peek_does_not_consume() {
        let queue = DocumentQueue::with_content("q", setup(), vec![7, 8]).unwrap();
        assert_eq!(queue.peek().unwrap(), Some(7));
        assert_eq!(queue.peek().unwrap(), Some(7));
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn test_empty_queue() {
        let queue = DocumentQueue::<String, _>::open("q", setup()).unwrap();
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.peek().unwrap(), None);
        assert_eq!(queue.poll().unwrap(), None);
    }

    #[test]
    fn test_clear_and_to_vec() {
        let queue = DocumentQueue::with_content("q", setup(), vec![1, 2, 3]).unwrap();
        assert_eq!(queue.to_vec().unwrap(), vec![1, 2, 3]);
        queue.clear().unwrap();
        assert_eq!(queue.len().unwrap(), 0);
    }

    #[test]
    fn test_iter_in_fifo_order_with_remove() {
        let queue = DocumentQueue::with_content("q", setup(), vec![1, 2, 3]).unwrap();
        let mut it = queue.iter().unwrap();
        let mut seen = Vec::new();
        while let Some(item) = it.next() {
            let item = item.unwrap();
            if item == 2 {
                it.remove().unwrap();
            }
            seen.push(item);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(queue.to_vec().unwrap(), vec![1, 3]);
    }
}
