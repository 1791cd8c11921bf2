//! Document store trait and related types.
//!
//! This module defines the only interface the domain uses to reach a tenant's
//! database: plain document CRUD, live result-set subscriptions, and
//! read-modify-write transactions with optimistic concurrency control.
//!
//! # Implementations
//!
//! - `InMemoryDocumentStore` (in `yatra-testing` crate): fast, deterministic testing
//! - Remote clients are out of scope; they only need to implement these traits.
//!
//! # Example
//!
//! ```no_run
//! use yatra_core::document::{Collection, DocumentId};
//! use yatra_core::document_store::{DocumentStore, StoreError};
//!
//! async fn archive<S: DocumentStore>(store: &S, id: DocumentId) -> Result<(), StoreError> {
//!     let mut txn = store.begin().await?;
//!     if let Some(doc) = txn.get(Collection::REGISTRATIONS, &id).await? {
//!         txn.set(Collection::CANCELLATIONS, &id, doc.data);
//!         txn.delete(Collection::REGISTRATIONS, &id);
//!     }
//!     txn.commit().await
//! }
//! ```

use crate::document::{Document, DocumentId, Fields};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Stream of full result-set snapshots for one collection.
///
/// Every item is the complete, current content of the collection. Dropping
/// the stream unsubscribes.
pub type SnapshotStream = Pin<Box<dyn Stream<Item = Vec<Document>> + Send>>;

/// Errors that can occur during document store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("Document not found: {collection}/{id}")]
    NotFound {
        /// Collection that was addressed
        collection: String,
        /// Missing document id
        id: DocumentId,
    },

    /// Optimistic concurrency conflict: a document read inside the
    /// transaction was modified before commit.
    #[error("Write conflict on {collection}/{id}")]
    Conflict {
        /// Collection of the conflicting document
        collection: String,
        /// Conflicting document id
        id: DocumentId,
    },

    /// Backend temporarily unreachable (network, quota, timeout).
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Any other backend failure.
    #[error("Store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether retrying the whole operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Unavailable(_))
    }

    /// Shorthand for [`StoreError::NotFound`]
    #[must_use]
    pub fn not_found(collection: &str, id: &DocumentId) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.clone(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Document store abstraction for one tenant database.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to be shared as
/// `Arc<dyn DocumentStore>` across tasks.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of
/// `async fn` so processors can hold the store as a trait object.
pub trait DocumentStore: Send + Sync {
    /// Read one document. Returns `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn get(&self, collection: &str, id: &DocumentId) -> StoreFuture<'_, Option<Document>>;

    /// Read every document of a collection (unordered).
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn list(&self, collection: &str) -> StoreFuture<'_, Vec<Document>>;

    /// Create a document under a store-assigned id and return that id.
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn create(&self, collection: &str, data: Fields) -> StoreFuture<'_, DocumentId>;

    /// Create or fully replace a document.
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn set(&self, collection: &str, id: &DocumentId, data: Fields) -> StoreFuture<'_, ()>;

    /// Merge top-level fields into an existing document.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the document does not exist
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn update(&self, collection: &str, id: &DocumentId, fields: Fields) -> StoreFuture<'_, ()>;

    /// Delete a document. Deleting a missing document is not an error.
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn delete(&self, collection: &str, id: &DocumentId) -> StoreFuture<'_, ()>;

    /// Subscribe to full snapshots of a collection.
    ///
    /// The first item is the current content; a new item follows every
    /// committed change.
    fn subscribe(&self, collection: &str) -> SnapshotStream;

    /// Open a read-modify-write transaction.
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn begin(&self) -> StoreFuture<'_, Box<dyn Transaction>>;
}

/// A read-modify-write unit.
///
/// Reads go to the backend and record the version they observed. Writes are
/// buffered and applied together by [`Transaction::commit`]. Commit fails with
/// [`StoreError::Conflict`] if any document read here changed in the meantime;
/// the caller is expected to rerun the whole body (see
/// `yatra_runtime::transaction::run_transaction`).
pub trait Transaction: Send {
    /// Read a document and remember its version for conflict detection.
    ///
    /// # Errors
    ///
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn get<'a>(&'a mut self, collection: &str, id: &DocumentId) -> StoreFuture<'a, Option<Document>>;

    /// Buffer a create-or-replace write
    fn set(&mut self, collection: &str, id: &DocumentId, data: Fields);

    /// Buffer a field merge; the document must exist at commit time
    fn update(&mut self, collection: &str, id: &DocumentId, fields: Fields);

    /// Buffer a delete
    fn delete(&mut self, collection: &str, id: &DocumentId);

    /// Apply all buffered writes atomically.
    ///
    /// # Errors
    ///
    /// - `Conflict`: a document read in this transaction was modified
    /// - `NotFound`: a buffered update targets a missing document
    /// - `Unavailable` / `Backend`: the backend could not be reached
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_error_display() {
        let error = StoreError::Conflict {
            collection: "registrations".into(),
            id: DocumentId::new("reg-1"),
        };
        assert_eq!(error.to_string(), "Write conflict on registrations/reg-1");
        assert!(error.is_retryable());
    }

    #[test]
    fn not_found_is_not_retryable() {
        let error = StoreError::not_found("cancellations", &DocumentId::new("c-9"));
        assert!(error.to_string().contains("cancellations/c-9"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn unavailable_is_retryable() {
        assert!(StoreError::Unavailable("timeout".into()).is_retryable());
        assert!(!StoreError::Backend("quota".into()).is_retryable());
    }
}
