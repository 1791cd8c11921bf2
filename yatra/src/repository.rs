//! Typed reads and live views over a tenant store.

use crate::error::{Result, YatraError};
use crate::types::{CancellationRecord, RefundStatus, RegistrationRecord};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Reverse;
use std::pin::Pin;
use std::sync::Arc;
use yatra_core::document::{Collection, Document, DocumentId, Fields, encode};
use yatra_core::document_store::{DocumentStore, StoreError};

/// Encode a record as document fields.
pub(crate) fn fields_of<T: Serialize>(value: &T) -> Result<Fields> {
    encode(value).map_err(|err| YatraError::Store(StoreError::from(err)))
}

/// Encode any value as JSON.
pub(crate) fn value_of<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| YatraError::Store(StoreError::from(err)))
}

/// Decode a registration document.
pub(crate) fn decode_registration(doc: &Document) -> Result<RegistrationRecord> {
    doc.decode()
        .map_err(|err| YatraError::decode(Collection::REGISTRATIONS, &doc.id, &err))
}

/// Decode a cancellation document.
pub(crate) fn decode_cancellation(doc: &Document) -> Result<CancellationRecord> {
    doc.decode()
        .map_err(|err| YatraError::decode(Collection::CANCELLATIONS, &doc.id, &err))
}

/// Live view of a collection: one fully decoded, sorted list per change.
pub type RecordStream<T> = Pin<Box<dyn Stream<Item = Vec<T>> + Send>>;

/// Decode every document, skipping (and logging) the unreadable ones.
fn decode_all<T>(documents: &[Document], decode: fn(&Document) -> Result<T>) -> Vec<T> {
    documents
        .iter()
        .filter_map(|doc| match decode(doc) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(document_id = %doc.id, error = %err, "Skipping unreadable document");
                None
            },
        })
        .collect()
}

/// Newest submission first; records without a timestamp last.
pub fn sort_registrations(records: &mut [RegistrationRecord]) {
    records.sort_by_key(|r| Reverse(r.submitted_at));
}

/// Newest cancellation first.
pub fn sort_cancellations(records: &mut [CancellationRecord]) {
    records.sort_by_key(|r| Reverse(r.cancelled_at));
}

/// Typed access to the `registrations` and `cancellations` collections.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    /// Wrap a tenant store
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// One registration, if it exists
    ///
    /// # Errors
    ///
    /// Store failures and undecodable documents.
    pub async fn registration(&self, id: &DocumentId) -> Result<Option<RegistrationRecord>> {
        self.store
            .get(Collection::REGISTRATIONS, id)
            .await?
            .as_ref()
            .map(decode_registration)
            .transpose()
    }

    /// One cancellation record, if it exists
    ///
    /// # Errors
    ///
    /// Store failures and undecodable documents.
    pub async fn cancellation(&self, id: &DocumentId) -> Result<Option<CancellationRecord>> {
        self.store
            .get(Collection::CANCELLATIONS, id)
            .await?
            .as_ref()
            .map(decode_cancellation)
            .transpose()
    }

    /// All registrations, newest first
    ///
    /// # Errors
    ///
    /// Store failures. Unreadable documents are skipped.
    pub async fn registrations(&self) -> Result<Vec<RegistrationRecord>> {
        let documents = self.store.list(Collection::REGISTRATIONS).await?;
        let mut records = decode_all(&documents, decode_registration);
        sort_registrations(&mut records);
        Ok(records)
    }

    /// All registrations, failing on the first unreadable one
    ///
    /// Room allotment reads through here: a skipped document could hide an
    /// occupied room.
    ///
    /// # Errors
    ///
    /// Store failures and undecodable documents.
    pub async fn registrations_complete(&self) -> Result<Vec<RegistrationRecord>> {
        let documents = self.store.list(Collection::REGISTRATIONS).await?;
        let mut records = documents
            .iter()
            .map(decode_registration)
            .collect::<Result<Vec<_>>>()?;
        sort_registrations(&mut records);
        Ok(records)
    }

    /// All cancellation records, newest first
    ///
    /// # Errors
    ///
    /// Store failures. Unreadable documents are skipped.
    pub async fn cancellations(&self) -> Result<Vec<CancellationRecord>> {
        let documents = self.store.list(Collection::CANCELLATIONS).await?;
        let mut records = decode_all(&documents, decode_cancellation);
        sort_cancellations(&mut records);
        Ok(records)
    }

    /// Live registrations list; every item replaces the previous one
    #[must_use]
    pub fn watch_registrations(&self) -> RecordStream<RegistrationRecord> {
        Box::pin(self.store.subscribe(Collection::REGISTRATIONS).map(|documents| {
            let mut records = decode_all(&documents, decode_registration);
            sort_registrations(&mut records);
            records
        }))
    }

    /// Live cancellations list; every item replaces the previous one
    #[must_use]
    pub fn watch_cancellations(&self) -> RecordStream<CancellationRecord> {
        Box::pin(self.store.subscribe(Collection::CANCELLATIONS).map(|documents| {
            let mut records = decode_all(&documents, decode_cancellation);
            sort_cancellations(&mut records);
            records
        }))
    }

    /// Update refund progress of a cancellation record
    ///
    /// # Errors
    ///
    /// [`YatraError::NotFound`] if the record is gone, or the store error.
    pub async fn update_refund(
        &self,
        cancellation_id: &DocumentId,
        status: RefundStatus,
        refund_utr: Option<&str>,
    ) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("refundStatus".into(), serde_json::to_value(status).unwrap_or(Value::Null));
        fields.insert(
            "refundUtr".into(),
            Value::String(refund_utr.unwrap_or_default().trim().to_string()),
        );
        self.store
            .update(Collection::CANCELLATIONS, cancellation_id, fields)
            .await?;
        tracing::info!(cancellation_id = %cancellation_id, ?status, "Refund status updated");
        Ok(())
    }

    /// Permanently delete a registration (no cancellation record is written)
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn delete_registration(&self, id: &DocumentId) -> Result<()> {
        self.store.delete(Collection::REGISTRATIONS, id).await?;
        tracing::info!(registration_id = %id, "Registration deleted");
        Ok(())
    }

    /// Permanently delete a cancellation record
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn delete_cancellation(&self, id: &DocumentId) -> Result<()> {
        self.store.delete(Collection::CANCELLATIONS, id).await?;
        tracing::info!(cancellation_id = %id, "Cancellation record deleted");
        Ok(())
    }
}
