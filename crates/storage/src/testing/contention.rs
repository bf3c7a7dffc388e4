//! Contention injection for optimistic-concurrency testing
//!
//! [`ContentionStore`] wraps any [`DocumentStore`] and, just before a
//! CAS-guarded `mutate_path` reaches the inner store, performs a write of
//! its own to the same document. The guarded write then sees a CAS
//! mismatch exactly as it would if another client had won the race.
//!
//! Unguarded mutations and reads pass straight through.
//!
//! # Example
//!
//! ```ignore
//! use strata_storage::testing::{ContentionConfig, ContentionStore};
//!
//! // First two guarded writes lose their race, the third goes through
//! let store = ContentionStore::new(InMemoryStore::new(), ContentionConfig::times(2));
//! ```

use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_core::{
    Cas, Document, DocumentStore, Fragment, JsonPath, JsonValue, MutationOutcome, Result,
    SubdocOp,
};
use tracing::debug;

/// Interfering write performed on behalf of a simulated concurrent client
pub type Interferer<S> = Box<dyn Fn(&S, &str) -> Result<()> + Send + Sync>;

/// Configuration for contention injection
#[derive(Debug, Clone)]
pub struct ContentionConfig {
    /// Probability of interfering with each guarded write (0.0 - 1.0)
    pub probability: f64,
    /// Maximum number of interferences (None = unlimited)
    pub max_interferences: Option<usize>,
}

impl Default for ContentionConfig {
    fn default() -> Self {
        ContentionConfig {
            probability: 1.0,
            max_interferences: None,
        }
    }
}

impl ContentionConfig {
    /// Interfere with every guarded write
    pub fn always() -> Self {
        Self::default()
    }

    /// Interfere with the next `n` guarded writes, then stop
    pub fn times(n: usize) -> Self {
        ContentionConfig {
            max_interferences: Some(n),
            ..Default::default()
        }
    }

    /// Never interfere (baseline)
    pub fn never() -> Self {
        ContentionConfig {
            probability: 0.0,
            ..Default::default()
        }
    }

    /// Set interference probability
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = probability.clamp(0.0, 1.0);
        self
    }
}

/// Store wrapper that loses races on purpose
pub struct ContentionStore<S: DocumentStore> {
    inner: S,
    config: ContentionConfig,
    remaining: Mutex<Option<usize>>,
    injected: AtomicUsize,
    interferer: Option<Interferer<S>>,
}

impl<S: DocumentStore> ContentionStore<S> {
    /// Wrap `inner`; interfering writes re-store the current content
    pub fn new(inner: S, config: ContentionConfig) -> Self {
        let remaining = Mutex::new(config.max_interferences);
        ContentionStore {
            inner,
            config,
            remaining,
            injected: AtomicUsize::new(0),
            interferer: None,
        }
    }

    /// Use a custom interfering write instead of re-storing the content
    ///
    /// An error from the interferer is returned from the guarded
    /// `mutate_path` call, which then never reaches the inner store.
    pub fn with_interferer(
        mut self,
        interferer: impl Fn(&S, &str) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.interferer = Some(Box::new(interferer));
        self
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of interfering writes performed so far
    pub fn interference_count(&self) -> usize {
        self.injected.load(Ordering::Acquire)
    }

    fn should_interfere(&self) -> bool {
        let mut remaining = self.remaining.lock();
        if *remaining == Some(0) {
            return false;
        }
        if !rand::thread_rng().gen_bool(self.config.probability.clamp(0.0, 1.0)) {
            return false;
        }
        if let Some(n) = remaining.as_mut() {
            *n -= 1;
        }
        true
    }

    fn interfere(&self, key: &str) -> Result<()> {
        match &self.interferer {
            Some(interferer) => interferer(&self.inner, key)?,
            None => {
                if let Some(doc) = self.inner.fetch(key)? {
                    self.inner.upsert(key, doc.value)?;
                }
            }
        }
        let count = self.injected.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(key, count, "injected concurrent write");
        Ok(())
    }
}

impl<S: DocumentStore> DocumentStore for ContentionStore<S> {
    fn fetch(&self, key: &str) -> Result<Option<Document>> {
        self.inner.fetch(key)
    }

    fn insert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        self.inner.insert(key, value)
    }

    fn upsert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        self.inner.upsert(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.inner.remove(key)
    }

    fn lookup_path(&self, key: &str, path: &JsonPath) -> Result<Option<Fragment>> {
        self.inner.lookup_path(key, path)
    }

    fn exists_path(&self, key: &str, path: &JsonPath) -> Result<bool> {
        self.inner.exists_path(key, path)
    }

    fn mutate_path(
        &self,
        key: &str,
        path: &JsonPath,
        op: SubdocOp,
        expected: Option<Cas>,
    ) -> Result<MutationOutcome> {
        if expected.is_some() && self.should_interfere() {
            self.interfere(key)?;
        }
        self.inner.mutate_path(key, path, op, expected)
    }
}
