//! In-memory document store for fast, deterministic testing.
//!
//! Every stored document carries a version number. Transactions remember the
//! version of each document they read; commit rejects the whole write set if
//! any of those versions moved, which mirrors optimistic concurrency in real
//! document databases.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap on poisoned locks
#![allow(clippy::missing_panics_doc)]

use crate::mocks::SequentialIdGenerator;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use yatra_core::document::{Document, DocumentId, Fields};
use yatra_core::document_store::{
    DocumentStore, SnapshotStream, StoreError, StoreFuture, Transaction,
};
use yatra_core::environment::IdGenerator;

#[derive(Clone, Debug)]
struct Versioned {
    version: u64,
    data: Fields,
}

type Collections = HashMap<String, BTreeMap<DocumentId, Versioned>>;

#[derive(Default)]
struct State {
    collections: Collections,
    clock: u64,
    commit_failures: VecDeque<StoreError>,
    update_failures: HashMap<(String, DocumentId), StoreError>,
    watchers: HashMap<String, watch::Sender<Vec<Document>>>,
}

impl State {
    fn bump(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn version_of(&self, collection: &str, id: &DocumentId) -> Option<u64> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| doc.version)
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, doc)| Document::new(id.clone(), doc.data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn notify(&self, collection: &str) {
        if let Some(sender) = self.watchers.get(collection) {
            sender.send_replace(self.snapshot(collection));
        }
    }
}

/// Versioned in-memory [`DocumentStore`].
///
/// Cloning yields another handle to the same data.
///
/// # Example
///
/// ```
/// use yatra_testing::InMemoryDocumentStore;
/// use yatra_core::document::{Collection, Fields};
/// use yatra_core::document_store::DocumentStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryDocumentStore::new();
/// let id = store.create(Collection::REGISTRATIONS, Fields::new()).await?;
/// assert!(store.get(Collection::REGISTRATIONS, &id).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    state: Arc<Mutex<State>>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryDocumentStore {
    /// Create an empty store with sequential `doc-NNNN` ids
    #[must_use]
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(SequentialIdGenerator::default()))
    }

    /// Create an empty store that assigns ids with `ids`
    #[must_use]
    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            ids,
        }
    }

    /// Make the next `count` transaction commits fail with `error`.
    ///
    /// Failed commits apply nothing.
    pub fn fail_next_commits(&self, count: usize, error: StoreError) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.commit_failures.push_back(error.clone());
        }
    }

    /// Make every non-transactional `update` of one document fail.
    pub fn fail_updates_for(&self, collection: &str, id: &DocumentId, error: StoreError) {
        self.state
            .lock()
            .unwrap()
            .update_failures
            .insert((collection.to_string(), id.clone()), error);
    }

    /// Insert or replace a document synchronously (test seeding).
    pub fn seed(&self, collection: &str, id: impl Into<DocumentId>, data: Fields) {
        let mut state = self.state.lock().unwrap();
        let version = state.bump();
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), Versioned { version, data });
        state.notify(collection);
    }

    /// Number of documents in a collection
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Synchronous read of one document body (test assertions)
    #[must_use]
    pub fn peek(&self, collection: &str, id: &DocumentId) -> Option<Fields> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| doc.data.clone())
    }

    /// Synchronous snapshot of a collection, ordered by id
    #[must_use]
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.state.lock().unwrap().snapshot(collection)
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryDocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("InMemoryDocumentStore")
            .field("collections", &state.collections.keys().collect::<Vec<_>>())
            .field("clock", &state.clock)
            .finish_non_exhaustive()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn get(&self, collection: &str, id: &DocumentId) -> StoreFuture<'_, Option<Document>> {
        let found = self
            .peek(collection, id)
            .map(|data| Document::new(id.clone(), data));
        Box::pin(async move { Ok(found) })
    }

    fn list(&self, collection: &str) -> StoreFuture<'_, Vec<Document>> {
        let docs = self.documents(collection);
        Box::pin(async move { Ok(docs) })
    }

    fn create(&self, collection: &str, data: Fields) -> StoreFuture<'_, DocumentId> {
        let id = DocumentId::new(self.ids.next_id());
        self.seed(collection, id.clone(), data);
        Box::pin(async move { Ok(id) })
    }

    fn set(&self, collection: &str, id: &DocumentId, data: Fields) -> StoreFuture<'_, ()> {
        self.seed(collection, id.clone(), data);
        Box::pin(async move { Ok(()) })
    }

    fn update(&self, collection: &str, id: &DocumentId, fields: Fields) -> StoreFuture<'_, ()> {
        let result = {
            let mut state = self.state.lock().unwrap();
            let key = (collection.to_string(), id.clone());
            if let Some(error) = state.update_failures.get(&key) {
                Err(error.clone())
            } else {
                let version = state.bump();
                match state
                    .collections
                    .get_mut(collection)
                    .and_then(|docs| docs.get_mut(id))
                {
                    Some(doc) => {
                        doc.data.extend(fields);
                        doc.version = version;
                        state.notify(collection);
                        Ok(())
                    },
                    None => Err(StoreError::not_found(collection, id)),
                }
            }
        };
        Box::pin(async move { result })
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> StoreFuture<'_, ()> {
        {
            let mut state = self.state.lock().unwrap();
            let removed = state
                .collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
                .is_some();
            if removed {
                state.bump();
                state.notify(collection);
            }
        }
        Box::pin(async move { Ok(()) })
    }

    fn subscribe(&self, collection: &str) -> SnapshotStream {
        let mut receiver = {
            let mut state = self.state.lock().unwrap();
            let initial = state.snapshot(collection);
            state
                .watchers
                .entry(collection.to_string())
                .or_insert_with(|| watch::channel(initial).0)
                .subscribe()
        };

        Box::pin(async_stream::stream! {
            let current = receiver.borrow_and_update().clone();
            yield current;
            while receiver.changed().await.is_ok() {
                let snapshot = receiver.borrow_and_update().clone();
                yield snapshot;
            }
        })
    }

    fn begin(&self) -> StoreFuture<'_, Box<dyn Transaction>> {
        let txn: Box<dyn Transaction> = Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            reads: HashMap::new(),
            writes: Vec::new(),
        });
        Box::pin(async move { Ok(txn) })
    }
}

enum Write {
    Set(String, DocumentId, Fields),
    Update(String, DocumentId, Fields),
    Delete(String, DocumentId),
}

struct InMemoryTransaction {
    state: Arc<Mutex<State>>,
    reads: HashMap<(String, DocumentId), Option<u64>>,
    writes: Vec<Write>,
}

impl Transaction for InMemoryTransaction {
    fn get<'a>(
        &'a mut self,
        collection: &str,
        id: &DocumentId,
    ) -> StoreFuture<'a, Option<Document>> {
        let (version, found) = {
            let state = self.state.lock().unwrap();
            let found = state
                .collections
                .get(collection)
                .and_then(|docs| docs.get(id))
                .map(|doc| Document::new(id.clone(), doc.data.clone()));
            (state.version_of(collection, id), found)
        };
        self.reads
            .entry((collection.to_string(), id.clone()))
            .or_insert(version);
        Box::pin(async move { Ok(found) })
    }

    fn set(&mut self, collection: &str, id: &DocumentId, data: Fields) {
        self.writes
            .push(Write::Set(collection.to_string(), id.clone(), data));
    }

    fn update(&mut self, collection: &str, id: &DocumentId, fields: Fields) {
        self.writes
            .push(Write::Update(collection.to_string(), id.clone(), fields));
    }

    fn delete(&mut self, collection: &str, id: &DocumentId) {
        self.writes
            .push(Write::Delete(collection.to_string(), id.clone()));
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        let result = self.apply();
        Box::pin(async move { result })
    }
}

impl InMemoryTransaction {
    fn apply(self) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();

        if let Some(error) = state.commit_failures.pop_front() {
            return Err(error);
        }

        for ((collection, id), read_version) in &self.reads {
            if state.version_of(collection, id) != *read_version {
                return Err(StoreError::Conflict {
                    collection: collection.clone(),
                    id: id.clone(),
                });
            }
        }

        let mut working = state.collections.clone();
        let mut touched = HashSet::new();
        for write in self.writes {
            state.clock += 1;
            let version = state.clock;
            match write {
                Write::Set(collection, id, data) => {
                    working
                        .entry(collection.clone())
                        .or_default()
                        .insert(id, Versioned { version, data });
                    touched.insert(collection);
                },
                Write::Update(collection, id, fields) => {
                    let doc = working
                        .get_mut(&collection)
                        .and_then(|docs| docs.get_mut(&id))
                        .ok_or_else(|| StoreError::not_found(&collection, &id))?;
                    doc.data.extend(fields);
                    doc.version = version;
                    touched.insert(collection);
                },
                Write::Delete(collection, id) => {
                    if let Some(docs) = working.get_mut(&collection) {
                        docs.remove(&id);
                    }
                    touched.insert(collection);
                },
            }
        }

        state.collections = working;
        for collection in &touched {
            state.notify(collection);
        }
        Ok(())
    }
}
