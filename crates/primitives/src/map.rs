//! DocumentMap: string-keyed map in one object document
//!
//! Each entry is a top-level field of the document, addressed by its key as
//! a single path segment. Values may be null. Empty keys are rejected with
//! `Error::InvalidKey`.
//!
//! `insert` and `remove` follow the same CAS-guarded, bounded-retry
//! protocol as the array collections. A key appearing or disappearing
//! between read and write is treated as a lost race and retried.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{Cas, DocumentStore, Error, JsonValue, MutationOutcome, Result, SubdocOp};

use crate::path;
use crate::protocol::{decode, encode, Attempt, DocumentHandle, RetryPolicy};

/// Map from `String` to `V` stored as a JSON object under one key
pub struct DocumentMap<V, S> {
    doc: DocumentHandle<S>,
    _value: PhantomData<fn() -> V>,
}

impl<V, S> DocumentMap<V, S>
where
    V: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    /// Open the map at `key`, creating an empty one if absent
    pub fn open(key: impl Into<String>, store: S) -> Result<Self> {
        let map = Self::handle(key.into(), store);
        map.doc.create_if_absent(JsonValue::object())?;
        Ok(map)
    }

    /// Open the map at `key` and replace its content with `entries`
    ///
    /// Later entries win over earlier ones with the same key.
    pub fn with_content<K: Into<String>>(
        key: impl Into<String>,
        store: S,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let mut object = serde_json::Map::new();
        for (k, v) in entries {
            let k = k.into();
            path::entry(&k)?;
            object.insert(k, encode(&v)?.into_inner());
        }
        let map = Self::handle(key.into(), store);
        map.doc
            .reset(JsonValue::from_value(serde_json::Value::Object(object)))?;
        Ok(map)
    }

    fn handle(key: String, store: S) -> Self {
        Self {
            doc: DocumentHandle::new(key, store),
            _value: PhantomData,
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

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Result<Option<V>> {
        self.doc
            .lookup(&path::entry(key)?)?
            .map(|fragment| decode(fragment.value))
            .transpose()
    }

    /// Whether `key` has an entry (possibly null)
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        self.doc.exists(&path::entry(key)?)
    }

    /// Store `value` under `key`, returning the value it replaced
    pub fn insert(&self, key: &str, value: V) -> Result<Option<V>> {
        let path = path::entry(key)?;
        let value = encode(&value)?;
        let prior = self.doc.retrying("insert", || {
            let (entries, cas) = self.doc.fetch_object()?;
            let prior = entries.get(key).cloned();
            let op = match prior {
                Some(_) => SubdocOp::Replace(value.clone()),
                None => SubdocOp::Insert(value.clone()),
            };
            match self.doc.mutate(&path, op, Some(cas))? {
                MutationOutcome::Applied(_) => Ok(Attempt::Done(prior)),
                MutationOutcome::CasMismatch
                | MutationOutcome::PathExists
                | MutationOutcome::PathNotFound => Ok(Attempt::Conflict),
                outcome => Err(self.doc.rejected("insert", &path, outcome)),
            }
        })?;
        prior.map(|v| decode(JsonValue::from_value(v))).transpose()
    }

    /// Remove the entry under `key`, returning its value
    pub fn remove(&self, key: &str) -> Result<Option<V>> {
        self.doc
            .read_modify_write("remove", &path::entry(key)?, &SubdocOp::Remove)?
            .map(decode)
            .transpose()
    }

    /// Number of entries
    pub fn len(&self) -> Result<usize> {
        Ok(self.doc.fetch_object()?.0.len())
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// All keys
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.doc.fetch_object()?.0.into_iter().map(|(k, _)| k).collect())
    }

    /// Remove every entry
    pub fn clear(&self) -> Result<()> {
        self.doc.reset(JsonValue::object())?;
        Ok(())
    }

    /// Cursor over a snapshot of the entries
    pub fn entries(&self) -> Result<MapCursor<'_, V, S>> {
        MapCursor::new(&self.doc)
    }
}

impl<V, S: std::fmt::Debug> std::fmt::Debug for DocumentMap<V, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentMap").field("doc", &self.doc).finish()
    }
}

// ============================================================================
// MapCursor
// ============================================================================

/// Forward-only cursor over map entries
///
/// `remove` deletes the entry last returned by `next`, guarded by the
/// cursor's CAS token.
pub struct MapCursor<'a, V, S> {
    doc: &'a DocumentHandle<S>,
    entries: std::vec::IntoIter<(String, serde_json::Value)>,
    last_key: Option<String>,
    started: bool,
    cas: Cas,
    _value: PhantomData<fn() -> V>,
}

impl<'a, V, S> MapCursor<'a, V, S>
where
    V: DeserializeOwned,
    S: DocumentStore,
{
    fn new(doc: &'a DocumentHandle<S>) -> Result<Self> {
        let (entries, cas) = doc.fetch_object()?;
        Ok(Self {
            doc,
            entries: entries.into_iter().collect::<Vec<_>>().into_iter(),
            last_key: None,
            started: false,
            cas,
            _value: PhantomData,
        })
    }

    /// CAS token the next `remove` will be guarded by
    pub fn cas(&self) -> Cas {
        self.cas
    }

    /// Remove the entry last returned by `next`
    pub fn remove(&mut self) -> Result<()> {
        if !self.started {
            return Err(Error::IllegalState(
                "cannot remove before having started iterating".to_string(),
            ));
        }
        let key = self.last_key.clone().ok_or_else(|| {
            Error::IllegalState("cannot remove twice in a row while iterating".to_string())
        })?;

        let path = path::entry(&key)?;
        match self.doc.mutate(&path, SubdocOp::Remove, Some(self.cas))? {
            MutationOutcome::Applied(cas) => {
                self.cas = cas;
                self.last_key = None;
                Ok(())
            }
            MutationOutcome::CasMismatch => Err(Error::ConcurrentModification(format!(
                "map {} changed since the cursor read it",
                self.doc.key()
            ))),
            MutationOutcome::PathNotFound => Err(Error::IllegalState(format!(
                "entry {} doesn't exist anymore",
                key
            ))),
            outcome => Err(self.doc.rejected("remove", &path, outcome)),
        }
    }
}

impl<V, S> Iterator for MapCursor<'_, V, S>
where
    V: DeserializeOwned,
    S: DocumentStore,
{
    type Item = Result<(String, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (key, value) = self.entries.next()?;
        self.started = true;
        self.last_key = Some(key.clone());
        Some(decode(JsonValue::from_value(value)).map(|v| (key, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use strata_storage::InMemoryStore;

    fn setup() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::new())
    }

    #[test]
    fn test_insert_get_remove() {
        let map = DocumentMap::<i64, _>::open("m", setup()).unwrap();
        assert_eq!(map.insert("a", 1).unwrap(), None);
        assert_eq!(map.insert("a", 2).unwrap(), Some(1));
        assert_eq!(map.get("a").unwrap(), Some(2));
        assert_eq!(map.remove("a").unwrap(), Some(2));
        assert_eq!(map.remove("a").unwrap(), None);
        assert_eq!(map.get("a").unwrap(), None);
    }

    #[test]
    fn test_null_values_are_entries() {
        let map = DocumentMap::<Option<String>, _>::open("m", setup()).unwrap();
        map.insert("k", None).unwrap();
        assert!(map.contains_key("k").unwrap());
        assert_eq!(map.get("k").unwrap(), Some(None));
        assert_eq!(map.len().unwrap(), 1);
    }

    #[test]
    fn test_empty_key_rejected() {
        let map = DocumentMap::<i64, _>::open("m", setup()).unwrap();
        assert!(matches!(map.insert("", 1), Err(Error::InvalidKey(_))));
        assert!(matches!(map.get(""), Err(Error::InvalidKey(_))));
        assert!(matches!(
            DocumentMap::with_content("m", setup(), vec![("", 1)]),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_with_content_keys_and_clear() {
        let store = setup();
        let map = DocumentMap::with_content("m", store.clone(), vec![("b", 2), ("a", 1)]).unwrap();
        let mut keys = map.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b"]);
        map.clear().unwrap();
        assert!(map.is_empty().unwrap());
        assert_eq!(store.fetch("m").unwrap().unwrap().value.into_inner(), json!({}));
    }

    #[test]
    fn test_open_on_array_document_reports_shape() {
        let store = setup();
        store.upsert("m", JsonValue::array()).unwrap();
        let map = DocumentMap::<i64, _>::open("m", store).unwrap();
        assert!(matches!(
            map.len(),
            Err(Error::UnexpectedShape {
                expected: "object",
                found: "array",
                ..
            })
        ));
    }

    #[test]
    fn test_entries_cursor_remove() {
        let map = DocumentMap::with_content("m", setup(), vec![("a", 1), ("b", 2), ("c", 3)])
            .unwrap();
        let mut cursor = map.entries().unwrap();
        assert!(matches!(cursor.remove(), Err(Error::IllegalState(_))));

        let mut visited = 0;
        while let Some(entry) = cursor.next() {
            let (_, value) = entry.unwrap();
            visited += 1;
            if value % 2 == 1 {
                cursor.remove().unwrap();
                assert!(matches!(cursor.remove(), Err(Error::IllegalState(_))));
            }
        }
        assert_eq!(visited, 3);
        assert_eq!(map.keys().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_entries_cursor_detects_outside_write() {
        let map = DocumentMap::with_content("m", setup(), vec![("a", 1)]).unwrap();
        let mut cursor = map.entries().unwrap();
        cursor.next().unwrap().unwrap();
        map.insert("z", 9).unwrap();
        assert!(matches!(
            cursor.remove(),
            Err(Error::ConcurrentModification(_))
        ));
        assert_eq!(map.get("a").unwrap(), Some(1));
    }
}
