//! Snapshot cursors over array-shaped collections
//!
//! A cursor reads the whole document once and walks that local copy.
//! Traversal never touches the store and never fails because of other
//! writers. Writes issued through a cursor are guarded by the cursor's own
//! CAS token, which each successful write replaces with the one the store
//! returned. A write made by anyone else invalidates that token, and the
//! cursor finds out on its next write.
//!
//! ## CursorState
//!
//! All bookkeeping lives in [`CursorState`], a plain value: the snapshot,
//! the position (index of the element `next` would return), the index last
//! returned by `next`/`previous`, and the CAS token. The write transitions
//! (`after_remove`, `after_set`, `after_add`) build a new state and leave
//! the old one alone, so a cursor whose write is rejected still holds
//! exactly the state it had before.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{Cas, DocumentStore, Error, JsonValue, MutationOutcome, Result, SubdocOp};

use crate::path;
use crate::protocol::{decode, encode, DocumentHandle};

// ============================================================================
// CursorState
// ============================================================================

/// Position, snapshot and CAS of a cursor
#[derive(Debug, Clone, PartialEq)]
pub struct CursorState {
    snapshot: Vec<JsonValue>,
    position: usize,
    last_visited: Option<usize>,
    cas: Cas,
}

impl CursorState {
    /// State positioned before `position` in `snapshot`
    ///
    /// `position` may equal the snapshot length (cursor at the end).
    pub fn new(snapshot: Vec<JsonValue>, position: usize, cas: Cas) -> Result<Self> {
        if position > snapshot.len() {
            return Err(Error::IndexOutOfBounds { index: position });
        }
        Ok(Self {
            snapshot,
            position,
            last_visited: None,
            cas,
        })
    }

    /// Local copy of the elements
    pub fn snapshot(&self) -> &[JsonValue] {
        &self.snapshot
    }

    /// Index of the element `next` would return
    pub fn position(&self) -> usize {
        self.position
    }

    /// Index returned by the last `next`/`previous`, if the cursor is positioned
    pub fn last_visited(&self) -> Option<usize> {
        self.last_visited
    }

    /// CAS token the next write will be guarded by
    pub fn cas(&self) -> Cas {
        self.cas
    }

    /// Whether `next` would return an element
    pub fn has_next(&self) -> bool {
        self.position < self.snapshot.len()
    }

    /// Whether `previous` would return an element
    pub fn has_previous(&self) -> bool {
        self.position > 0
    }

    /// Step forward, returning the element passed over
    pub fn next(&mut self) -> Option<&JsonValue> {
        let index = self.position;
        let value = self.snapshot.get(index)?;
        self.position += 1;
        self.last_visited = Some(index);
        Some(value)
    }

    /// Step backward, returning the element passed over
    pub fn previous(&mut self) -> Option<&JsonValue> {
        let index = self.position.checked_sub(1)?;
        let value = self.snapshot.get(index)?;
        self.position = index;
        self.last_visited = Some(index);
        Some(value)
    }

    /// Index a positional write would target
    pub fn target(&self) -> Result<usize> {
        self.last_visited.ok_or_else(|| {
            Error::IllegalState("no element visited since the last structural change".to_string())
        })
    }

    /// State after the last visited element was removed under `cas`
    ///
    /// Elements behind the cursor shift down by one, so a removal from
    /// behind moves the position back. The cursor becomes unpositioned.
    pub fn after_remove(&self, cas: Cas) -> Result<Self> {
        let index = self.target()?;
        if index >= self.snapshot.len() {
            return Err(Error::IndexOutOfBounds { index });
        }
        let mut snapshot = self.snapshot.clone();
        snapshot.remove(index);
        let position = if index < self.position {
            self.position - 1
        } else {
            self.position
        };
        Ok(Self {
            snapshot,
            position,
            last_visited: None,
            cas,
        })
    }

    /// State after the last visited element was replaced by `value` under `cas`
    pub fn after_set(&self, value: JsonValue, cas: Cas) -> Result<Self> {
        let index = self.target()?;
        let mut snapshot = self.snapshot.clone();
        let slot = snapshot
            .get_mut(index)
            .ok_or(Error::IndexOutOfBounds { index })?;
        *slot = value;
        Ok(Self {
            snapshot,
            position: self.position,
            last_visited: self.last_visited,
            cas,
        })
    }

    /// State after `value` was inserted at the position under `cas`
    ///
    /// The new element ends up behind the cursor: `next` is unaffected and
    /// `previous` returns the new element. The cursor becomes unpositioned.
    pub fn after_add(&self, value: JsonValue, cas: Cas) -> Self {
        let mut snapshot = self.snapshot.clone();
        snapshot.insert(self.position, value);
        Self {
            snapshot,
            position: self.position + 1,
            last_visited: None,
            cas,
        }
    }
}

// ============================================================================
// ListCursor
// ============================================================================

/// Bidirectional cursor over a [`DocumentList`](crate::DocumentList)
///
/// Iterating yields `Result<T>` because each element is deserialized from
/// the snapshot as it is reached.
pub struct ListCursor<'a, T, S> {
    doc: &'a DocumentHandle<S>,
    state: CursorState,
    _element: PhantomData<fn() -> T>,
}

impl<'a, T, S> ListCursor<'a, T, S>
where
    T: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    pub(crate) fn new(doc: &'a DocumentHandle<S>, position: usize) -> Result<Self> {
        let (items, cas) = doc.fetch_array()?;
        let snapshot = items.into_iter().map(JsonValue::from_value).collect();
        Ok(Self {
            doc,
            state: CursorState::new(snapshot, position, cas)?,
            _element: PhantomData,
        })
    }

    /// Current cursor state
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Whether `next` would return an element
    pub fn has_next(&self) -> bool {
        self.state.has_next()
    }

    /// Whether `previous` would return an element
    pub fn has_previous(&self) -> bool {
        self.state.has_previous()
    }

    /// Index of the element `next` would return
    pub fn next_index(&self) -> usize {
        self.state.position()
    }

    /// Index of the element `previous` would return, `None` at the start
    pub fn previous_index(&self) -> Option<usize> {
        self.state.position().checked_sub(1)
    }

    /// Step backward
    pub fn previous(&mut self) -> Option<Result<T>> {
        self.state.previous().cloned().map(decode)
    }

    /// Remove the element last returned by `next` or `previous`
    pub fn remove(&mut self) -> Result<()> {
        let index = self.state.target()?;
        let cas = self.write(index, SubdocOp::Remove, "remove")?;
        self.state = self.state.after_remove(cas)?;
        Ok(())
    }

    /// Replace the element last returned by `next` or `previous`
    pub fn set(&mut self, element: T) -> Result<()> {
        let index = self.state.target()?;
        let value = encode(&element)?;
        let cas = self.write(index, SubdocOp::Replace(value.clone()), "set")?;
        self.state = self.state.after_set(value, cas)?;
        Ok(())
    }

    /// Insert an element at the cursor position
    pub fn add(&mut self, element: T) -> Result<()> {
        let value = encode(&element)?;
        let index = self.state.position();
        let cas = self.write(index, SubdocOp::Insert(value.clone()), "add")?;
        self.state = self.state.after_add(value, cas);
        Ok(())
    }

    fn write(&self, index: usize, op: SubdocOp, operation: &'static str) -> Result<Cas> {
        let path = path::element(index);
        match self.doc.mutate(&path, op, Some(self.state.cas()))? {
            MutationOutcome::Applied(cas) => Ok(cas),
            MutationOutcome::CasMismatch => Err(Error::ConcurrentModification(format!(
                "list {} changed since the cursor read it",
                self.doc.key()
            ))),
            MutationOutcome::PathNotFound => Err(Error::ConcurrentModification(format!(
                "element doesn't exist anymore at index {}",
                index
            ))),
            outcome => Err(self.doc.rejected(operation, &path, outcome)),
        }
    }
}

impl<T, S> Iterator for ListCursor<'_, T, S>
where
    T: Serialize + DeserializeOwned,
    S: DocumentStore,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.state.next().cloned().map(decode)
    }
}

// ============================================================================
// ArrayCursor
// ============================================================================

/// Forward-only cursor over a set or queue
///
/// Supports removing the element last returned by `next`, once per step.
pub struct ArrayCursor<'a, T, S> {
    doc: &'a DocumentHandle<S>,
    state: CursorState,
    started: bool,
    _element: PhantomData<fn() -> T>,
}

impl<'a, T, S> ArrayCursor<'a, T, S>
where
    T: DeserializeOwned,
    S: DocumentStore,
{
    pub(crate) fn new(doc: &'a DocumentHandle<S>) -> Result<Self> {
        let (items, cas) = doc.fetch_array()?;
        let snapshot = items.into_iter().map(JsonValue::from_value).collect();
        Ok(Self {
            doc,
            state: CursorState::new(snapshot, 0, cas)?,
            started: false,
            _element: PhantomData,
        })
    }

    /// Current cursor state
    pub fn state(&self) -> &CursorState {
        &self.state
    }

    /// Remove the element last returned by `next`
    pub fn remove(&mut self) -> Result<()> {
        if !self.started {
            return Err(Error::IllegalState(
                "cannot remove before having started iterating".to_string(),
            ));
        }
        let index = self.state.last_visited().ok_or_else(|| {
            Error::IllegalState("cannot remove twice in a row while iterating".to_string())
        })?;

        let path = path::element(index);
        let cas = match self.doc.mutate(&path, SubdocOp::Remove, Some(self.state.cas()))? {
            MutationOutcome::Applied(cas) => cas,
            MutationOutcome::CasMismatch => {
                return Err(Error::ConcurrentModification(format!(
                    "{} changed since the cursor read it",
                    self.doc.key()
                )))
            }
            MutationOutcome::PathNotFound => {
                return Err(Error::IllegalState(format!(
                    "invalid remove index {}",
                    path
                )))
            }
            outcome => return Err(self.doc.rejected("remove", &path, outcome)),
        };
        self.state = self.state.after_remove(cas)?;
        Ok(())
    }
}

impl<T, S> Iterator for ArrayCursor<'_, T, S>
where
    T: DeserializeOwned,
    S: DocumentStore,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.state.next().cloned()?;
        self.started = true;
        Some(decode(value))
    }
}
