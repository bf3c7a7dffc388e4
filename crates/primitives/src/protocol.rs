//! CAS-guarded read-modify-write against a single backing document
//!
//! Every index- or key-addressed write of every collection goes through
//! [`DocumentHandle`]:
//!
//! 1. look up the current value and CAS at a path (or fetch the document)
//! 2. compute the write
//! 3. issue `mutate_path` guarded by that CAS
//! 4. on `Applied`, done; on `CasMismatch`, go back to 1
//!
//! The loop is bounded by a [`RetryPolicy`]. Running out of attempts is a
//! [`Error::ConflictStorm`], never a silent no-op. A path that is missing at
//! mutation time is not a conflict and is never retried.
//!
//! Retries are immediate. The store never takes a lock, so contention only
//! costs extra round trips.

use serde::de::DeserializeOwned;
use serde::Serialize;
use strata_core::{
    Cas, DocumentStore, Error, Fragment, JsonPath, JsonValue, MutationOutcome, Result, SubdocOp,
};
use tracing::{debug, warn};

/// Default bound on CAS-guarded attempts for one operation
pub const MAX_OPTIMISTIC_LOCKING_ATTEMPTS: usize = 10;

// ============================================================================
// Retry Policy
// ============================================================================

/// Bound on optimistic retries for single-shot collection operations
///
/// # Example
/// ```ignore
/// let list = DocumentList::<String, _>::open("todo", store)?
///     .with_retry_policy(RetryPolicy::default().with_max_attempts(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_OPTIMISTIC_LOCKING_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Create a RetryPolicy with the default bound
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that gives up after the first conflict
    pub fn no_retry() -> Self {
        Self { max_attempts: 1 }
    }

    /// Set the maximum number of attempts (at least one is always made)
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Maximum number of attempts, including the first
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `attempt` until it finishes or the budget is spent
    ///
    /// `attempt` must re-read whatever it depends on each time it is called;
    /// it is invoked again after every [`Attempt::Conflict`]. Errors stop the
    /// loop immediately.
    pub(crate) fn run<T>(
        &self,
        key: &str,
        operation: &'static str,
        mut attempt: impl FnMut() -> Result<Attempt<T>>,
    ) -> Result<T> {
        for n in 1..=self.max_attempts {
            match attempt()? {
                Attempt::Done(value) => return Ok(value),
                Attempt::Conflict => {
                    debug!(key, operation, attempt = n, "CAS conflict, retrying");
                }
            }
        }
        warn!(
            key,
            operation,
            attempts = self.max_attempts,
            "retry budget exhausted under contention"
        );
        Err(Error::ConflictStorm {
            operation,
            attempts: self.max_attempts,
        })
    }
}

/// Result of one pass through a read-modify-write cycle
#[derive(Debug)]
pub(crate) enum Attempt<T> {
    /// The operation finished (applied, or decided nothing needed writing)
    Done(T),
    /// The guarded write lost a race; read again
    Conflict,
}

// ============================================================================
// Document Handle
// ============================================================================

/// A collection's backing document: its key, store client and retry bound
///
/// Holds no cached content or CAS. Every call reads what it needs and CAS
/// tokens are passed explicitly.
#[derive(Debug, Clone)]
pub(crate) struct DocumentHandle<S> {
    key: String,
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> DocumentHandle<S> {
    pub(crate) fn new(key: String, store: S) -> Self {
        Self {
            key,
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub(crate) fn set_retry_policy(&mut self, policy: RetryPolicy) {
        self.retry = policy;
    }

    /// Create the document with `initial` unless it already exists
    ///
    /// Losing the creation race to another client is expected; whatever
    /// content won is kept.
    pub(crate) fn create_if_absent(&self, initial: JsonValue) -> Result<()> {
        match self.store.insert(&self.key, initial) {
            Ok(_) => Ok(()),
            Err(Error::DocumentExists(_)) => {
                debug!(key = %self.key, "document already exists, reusing its content");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Overwrite the document unconditionally
    pub(crate) fn reset(&self, value: JsonValue) -> Result<Cas> {
        self.store.upsert(&self.key, value)
    }

    /// Full-document read of an array-shaped collection
    pub(crate) fn fetch_array(&self) -> Result<(Vec<serde_json::Value>, Cas)> {
        let doc = self
            .store
            .fetch(&self.key)?
            .ok_or_else(|| Error::DocumentNotFound(self.key.clone()))?;
        match doc.value.into_inner() {
            serde_json::Value::Array(items) => Ok((items, doc.cas)),
            other => Err(self.shape_error("array", &other)),
        }
    }

    /// Full-document read of an object-shaped collection
    pub(crate) fn fetch_object(
        &self,
    ) -> Result<(serde_json::Map<String, serde_json::Value>, Cas)> {
        let doc = self
            .store
            .fetch(&self.key)?
            .ok_or_else(|| Error::DocumentNotFound(self.key.clone()))?;
        match doc.value.into_inner() {
            serde_json::Value::Object(entries) => Ok((entries, doc.cas)),
            other => Err(self.shape_error("object", &other)),
        }
    }

    pub(crate) fn lookup(&self, path: &JsonPath) -> Result<Option<Fragment>> {
        self.store.lookup_path(&self.key, path)
    }

    pub(crate) fn exists(&self, path: &JsonPath) -> Result<bool> {
        self.store.exists_path(&self.key, path)
    }

    /// Single mutation, guarded when `expected` is given
    pub(crate) fn mutate(
        &self,
        path: &JsonPath,
        op: SubdocOp,
        expected: Option<Cas>,
    ) -> Result<MutationOutcome> {
        self.store.mutate_path(&self.key, path, op, expected)
    }

    /// Bounded retry loop over this document
    pub(crate) fn retrying<T>(
        &self,
        operation: &'static str,
        attempt: impl FnMut() -> Result<Attempt<T>>,
    ) -> Result<T> {
        self.retry.run(&self.key, operation, attempt)
    }

    /// Guarded write at `path` computed from the value currently there
    ///
    /// Returns the value that was replaced or removed, or `None` when `path`
    /// does not exist (either at lookup or at mutation time).
    pub(crate) fn read_modify_write(
        &self,
        operation: &'static str,
        path: &JsonPath,
        op: &SubdocOp,
    ) -> Result<Option<JsonValue>> {
        self.retrying(operation, || {
            let current = match self.lookup(path)? {
                Some(fragment) => fragment,
                None => return Ok(Attempt::Done(None)),
            };
            match self.mutate(path, op.clone(), Some(current.cas))? {
                MutationOutcome::Applied(_) => Ok(Attempt::Done(Some(current.value))),
                MutationOutcome::CasMismatch => Ok(Attempt::Conflict),
                MutationOutcome::PathNotFound => Ok(Attempt::Done(None)),
                outcome => Err(self.rejected(operation, path, outcome)),
            }
        })
    }

    /// Remove the first array element equal to `wanted`
    ///
    /// Scans a fresh full read on every attempt, since the match may move or
    /// vanish between attempts. Returns `false` when nothing matched.
    pub(crate) fn remove_first_match(
        &self,
        operation: &'static str,
        wanted: &serde_json::Value,
    ) -> Result<bool> {
        self.retrying(operation, || {
            let (items, cas) = self.fetch_array()?;
            let index = match items.iter().position(|item| item == wanted) {
                Some(index) => index,
                None => return Ok(Attempt::Done(false)),
            };
            let path = JsonPath::root().index(index);
            match self.mutate(&path, SubdocOp::Remove, Some(cas))? {
                MutationOutcome::Applied(_) => Ok(Attempt::Done(true)),
                MutationOutcome::CasMismatch => Ok(Attempt::Conflict),
                outcome => Err(self.rejected(operation, &path, outcome)),
            }
        })
    }

    /// Error for an outcome the caller has no recovery for
    pub(crate) fn rejected(
        &self,
        operation: &'static str,
        path: &JsonPath,
        outcome: MutationOutcome,
    ) -> Error {
        match outcome {
            MutationOutcome::CasMismatch => Error::ConcurrentModification(format!(
                "{} on {} lost a race at '{}'",
                operation, self.key, path
            )),
            other => Error::InvalidPath(format!(
                "{} on {} rejected at '{}': {:?}",
                operation, self.key, path, other
            )),
        }
    }

    fn shape_error(&self, expected: &'static str, found: &serde_json::Value) -> Error {
        Error::UnexpectedShape {
            key: self.key.clone(),
            expected,
            found: strata_core::value_type_name(found),
        }
    }
}

// ============================================================================
// Element Codec
// ============================================================================

/// Serialize a collection element into its stored JSON form
pub(crate) fn encode<T: Serialize>(element: &T) -> Result<JsonValue> {
    serde_json::to_value(element)
        .map(JsonValue::from_value)
        .map_err(|e| Error::UnsupportedType(e.to_string()))
}

/// Serialize a set element, refusing objects and arrays
pub(crate) fn encode_primitive<T: Serialize>(element: &T) -> Result<JsonValue> {
    let value = encode(element)?;
    if value.is_composite() {
        return Err(Error::UnsupportedType(format!(
            "only non-composite values can be stored in a set, got {}",
            value.type_name()
        )));
    }
    Ok(value)
}

/// Deserialize a stored JSON value into a collection element
pub(crate) fn decode<T: DeserializeOwned>(value: JsonValue) -> Result<T> {
    Ok(serde_json::from_value(value.into_inner())?)
}
