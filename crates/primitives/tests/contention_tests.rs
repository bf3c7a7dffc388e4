//! Optimistic concurrency tests
//!
//! Tests:
//! - Lost races are retried and the final value is coherent
//! - Sustained contention ends in a conflict storm after the configured bound
//! - Set preconditions are checked before any store call
//! - Real threads sharing one store never lose or duplicate an element

use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use strata_core::{
    Cas, Document, DocumentStore, Error, Fragment, JsonPath, JsonValue, MutationOutcome, Result,
    SubdocOp,
};
use strata_primitives::{
    CollectionsConfig, DocumentList, DocumentMap, DocumentQueue, DocumentSet, RetryPolicy,
};
use strata_storage::testing::{ContentionConfig, ContentionStore};
use strata_storage::InMemoryStore;

fn contended(config: ContentionConfig) -> ContentionStore<InMemoryStore> {
    ContentionStore::new(InMemoryStore::new(), config)
}

/// Store wrapper that counts every call reaching it
#[derive(Default)]
struct CountingStore {
    inner: InMemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl DocumentStore for CountingStore {
    fn fetch(&self, key: &str) -> Result<Option<Document>> {
        self.tick();
        self.inner.fetch(key)
    }

    fn insert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        self.tick();
        self.inner.insert(key, value)
    }

    fn upsert(&self, key: &str, value: JsonValue) -> Result<Cas> {
        self.tick();
        self.inner.upsert(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.tick();
        self.inner.remove(key)
    }

    fn lookup_path(&self, key: &str, path: &JsonPath) -> Result<Option<Fragment>> {
        self.tick();
        self.inner.lookup_path(key, path)
    }

    fn exists_path(&self, key: &str, path: &JsonPath) -> Result<bool> {
        self.tick();
        self.inner.exists_path(key, path)
    }

    fn mutate_path(
        &self,
        key: &str,
        path: &JsonPath,
        op: SubdocOp,
        expected: Option<Cas>,
    ) -> Result<MutationOutcome> {
        self.tick();
        self.inner.mutate_path(key, path, op, expected)
    }
}

// ============================================================================
// Retry Under Contention
// ============================================================================

/// Another writer changes the target between our read and our write: we
/// retry, report their value as the prior one, and our value ends up stored.
#[test]
fn test_set_retries_and_returns_winning_prior_value() {
    let store = contended(ContentionConfig::times(1)).with_interferer(|inner, key| {
        inner.mutate_path(
            key,
            &JsonPath::root().index(1),
            SubdocOp::Replace("theirs".into()),
            None,
        )?;
        Ok(())
    });
    let store = Arc::new(store);
    let list = DocumentList::with_content(
        "race",
        store.clone(),
        vec!["a".to_string(), "b".to_string()],
    )
    .unwrap();

    let prior = list.set(1, "mine".to_string()).unwrap();
    assert_eq!(prior, "theirs", "prior value must be the one we overwrote");
    assert_eq!(list.to_vec().unwrap(), vec!["a", "mine"]);
    assert_eq!(store.interference_count(), 1);
}

#[test]
fn test_remove_retries_until_budget_allows() {
    let store = Arc::new(contended(ContentionConfig::times(9)));
    let list = DocumentList::with_content("l", store.clone(), vec![1, 2, 3]).unwrap();

    assert_eq!(list.remove(0).unwrap(), 1);
    assert_eq!(store.interference_count(), 9);
    assert_eq!(list.to_vec().unwrap(), vec![2, 3]);
}

#[test]
fn test_conflict_storm_after_default_bound() {
    let store = Arc::new(contended(ContentionConfig::always()));
    let list = DocumentList::with_content("l", store.clone(), vec![1, 2, 3]).unwrap();

    let err = list.set(0, 100).unwrap_err();
    assert!(matches!(
        err,
        Error::ConflictStorm {
            operation: "set",
            attempts: 10
        }
    ));
    assert!(err.is_conflict());
    assert_eq!(store.interference_count(), 10);
    assert_eq!(list.to_vec().unwrap(), vec![1, 2, 3], "nothing was written");
}

#[test]
fn test_conflict_storm_honours_configured_limit() {
    let config = CollectionsConfig::from_toml_str("cas_retry_limit = 3").unwrap();
    let store = Arc::new(contended(ContentionConfig::always()));

    let set = DocumentSet::<i64, _>::open("s", store.clone())
        .unwrap()
        .with_retry_policy(config.retry_policy());
    let err = set.add(1).unwrap_err();
    assert!(matches!(
        err,
        Error::ConflictStorm {
            operation: "add",
            attempts: 3
        }
    ));
    assert_eq!(store.interference_count(), 3);
    assert!(set.is_empty().unwrap());
}

#[test]
fn test_no_retry_policy_fails_on_first_conflict() {
    let store = Arc::new(contended(ContentionConfig::times(1)));
    let queue = DocumentQueue::with_content("q", store.clone(), vec![1])
        .unwrap()
        .with_retry_policy(RetryPolicy::no_retry());

    assert!(matches!(
        queue.poll(),
        Err(Error::ConflictStorm { attempts: 1, .. })
    ));
    assert_eq!(queue.poll().unwrap(), Some(1));
}

#[test]
fn test_set_add_sees_concurrent_insert_of_same_value() {
    let store = contended(ContentionConfig::times(1)).with_interferer(|inner, key| {
        inner.mutate_path(key, &JsonPath::root(), SubdocOp::Append(7.into()), None)?;
        Ok(())
    });
    let set = DocumentSet::<i64, _>::open("s", Arc::new(store)).unwrap();

    assert!(!set.add(7).unwrap(), "the other writer added it first");
    assert_eq!(set.to_vec().unwrap(), vec![7]);
}

#[test]
fn test_map_insert_retries_when_key_appears() {
    let store = contended(ContentionConfig::times(1)).with_interferer(|inner, key| {
        inner.mutate_path(
            key,
            &JsonPath::root().key("k"),
            SubdocOp::Insert(json!("theirs").into()),
            None,
        )?;
        Ok(())
    });
    let map = DocumentMap::<String, _>::open("m", Arc::new(store)).unwrap();

    let prior = map.insert("k", "mine".to_string()).unwrap();
    assert_eq!(prior.as_deref(), Some("theirs"));
    assert_eq!(map.get("k").unwrap().as_deref(), Some("mine"));
}

#[test]
fn test_store_failure_ends_retry_loop_immediately() {
    let store = contended(ContentionConfig::always())
        .with_interferer(|_, _| Err(Error::Store("connection reset".to_string())));
    let store = Arc::new(store);
    let list = DocumentList::with_content("l", store.clone(), vec![1, 2]).unwrap();
    let set = DocumentSet::<i64, _>::open("s", store.clone()).unwrap();

    let err = list.set(0, 9).unwrap_err();
    assert!(matches!(err, Error::Store(ref msg) if msg == "connection reset"));
    assert!(!err.is_conflict());
    assert!(matches!(set.add(1), Err(Error::Store(_))));

    assert_eq!(store.interference_count(), 0);
    assert_eq!(list.to_vec().unwrap(), vec![1, 2]);
    assert!(set.is_empty().unwrap());
}

// ============================================================================
// Preconditions
// ============================================================================

#[test]
fn test_set_rejects_composites_before_any_store_call() {
    let store = Arc::new(CountingStore::default());
    let set = DocumentSet::<serde_json::Value, _>::open("s", store.clone()).unwrap();
    let baseline = store.calls();

    assert!(matches!(
        set.add(json!([1, 2])),
        Err(Error::UnsupportedType(_))
    ));
    assert!(matches!(
        set.add(json!({"a": 1})),
        Err(Error::UnsupportedType(_))
    ));
    assert!(matches!(
        set.remove(&json!([1])),
        Err(Error::UnsupportedType(_))
    ));
    assert!(matches!(
        set.contains(&json!({})),
        Err(Error::UnsupportedType(_))
    ));
    assert_eq!(store.calls(), baseline, "no round trip for rejected values");

    assert!(set.add(json!(1)).unwrap());
    assert!(store.calls() > baseline);
}

#[test]
fn test_map_rejects_empty_key_before_any_store_call() {
    let store = Arc::new(CountingStore::default());
    let map = DocumentMap::<i64, _>::open("m", store.clone()).unwrap();
    let baseline = store.calls();

    assert!(matches!(map.insert("", 1), Err(Error::InvalidKey(_))));
    assert!(matches!(map.remove(""), Err(Error::InvalidKey(_))));
    assert_eq!(store.calls(), baseline);
}

// ============================================================================
// Threads
// ============================================================================

#[test]
fn test_concurrent_polls_take_each_element_once() {
    let store = Arc::new(InMemoryStore::new());
    let total = 200;
    DocumentQueue::with_content("jobs", store.clone(), 0..total).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let queue = DocumentQueue::<i32, _>::open("jobs", store).unwrap();
                let mut taken = Vec::new();
                loop {
                    match queue.poll() {
                        Ok(Some(item)) => taken.push(item),
                        Ok(None) => break,
                        Err(e) if e.is_conflict() => continue,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
                taken
            })
        })
        .collect();

    let mut all: Vec<i32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..total).collect::<Vec<_>>());
}

#[test]
fn test_concurrent_set_adds_have_one_winner_per_value() {
    let store = Arc::new(InMemoryStore::new());
    DocumentSet::<u32, _>::open("members", store.clone()).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let set = DocumentSet::<u32, _>::open("members", store).unwrap();
                let mut won = Vec::new();
                for value in 0..50 {
                    loop {
                        match set.add(value) {
                            Ok(true) => {
                                won.push(value);
                                break;
                            }
                            Ok(false) => break,
                            Err(e) if e.is_conflict() => continue,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
                won
            })
        })
        .collect();

    let won: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let distinct: HashSet<u32> = won.iter().copied().collect();
    assert_eq!(won.len(), 50, "every value is added exactly once");
    assert_eq!(distinct.len(), 50);

    let set = DocumentSet::<u32, _>::open("members", store).unwrap();
    assert_eq!(set.len().unwrap(), 50);
}

#[test]
fn test_concurrent_list_sets_leave_one_coherent_value() {
    let store = Arc::new(InMemoryStore::new());
    DocumentList::with_content("slot", store.clone(), vec![0u64]).unwrap();

    let handles: Vec<_> = (1..=4u64)
        .map(|writer| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let list = DocumentList::<u64, _>::open("slot", store).unwrap();
                let mut priors = Vec::new();
                for round in 0..25u64 {
                    let value = writer * 1000 + round;
                    loop {
                        match list.set(0, value) {
                            Ok(prior) => {
                                priors.push(prior);
                                break;
                            }
                            Err(e) if e.is_conflict() => continue,
                            Err(e) => panic!("unexpected error: {}", e),
                        }
                    }
                }
                priors
            })
        })
        .collect();

    let priors: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let list = DocumentList::<u64, _>::open("slot", store).unwrap();
    let last = list.get(0).unwrap();

    // every successful set overwrote exactly one value: the initial 0 plus
    // every written value except the final one, each seen once
    let mut seen = priors;
    seen.push(last);
    seen.sort_unstable();
    let mut expected: Vec<u64> = (1..=4u64)
        .flat_map(|w| (0..25u64).map(move |r| w * 1000 + r))
        .collect();
    expected.push(0);
    expected.sort_unstable();
    assert_eq!(seen, expected);
    assert_eq!(list.len().unwrap(), 1);
}
