//! Error types for the admin engine.

use thiserror::Error;
use yatra_core::document::DocumentId;
use yatra_core::document_store::StoreError;
use yatra_runtime::RetryableError;

/// Errors surfaced by every processor in this crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum YatraError {
    /// Input rejected before any write was attempted.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A target room already holds travellers of another package.
    #[error(
        "Room {room} already holds package '{existing_package}', cannot add '{incoming_package}'"
    )]
    Conflict {
        /// Room that would be mixed
        room: String,
        /// Package of the room's current occupants
        existing_package: String,
        /// Package of the travellers being added
        incoming_package: String,
    },

    /// Addressed record does not exist (for example, deleted concurrently).
    #[error("{collection}/{id} not found")]
    NotFound {
        /// Collection that was addressed
        collection: String,
        /// Missing document id
        id: DocumentId,
    },

    /// Store failure that survived the retry policy.
    #[error("Store failure: {0}")]
    Store(StoreError),

    /// A stored document could not be read as the expected record.
    #[error("Could not decode {collection}/{id}: {reason}")]
    Decode {
        /// Collection of the document
        collection: String,
        /// Document id
        id: DocumentId,
        /// Decoder message
        reason: String,
    },

    /// Some per-registration updates of a room batch failed.
    ///
    /// Updates listed in `applied` are committed and stay committed.
    #[error("Room batch incomplete: {} applied, {} failed", applied.len(), failed.len())]
    BatchIncomplete {
        /// Registrations whose update committed
        applied: Vec<DocumentId>,
        /// Registrations whose update failed, with the store error
        failed: Vec<(DocumentId, StoreError)>,
    },
}

impl YatraError {
    /// Shorthand for [`YatraError::Validation`]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`YatraError::NotFound`]
    pub fn not_found(collection: &str, id: &DocumentId) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.clone(),
        }
    }

    /// Wrap a decoder error with the document it came from
    pub fn decode(collection: &str, id: &DocumentId, err: &serde_json::Error) -> Self {
        Self::Decode {
            collection: collection.to_string(),
            id: id.clone(),
            reason: err.to_string(),
        }
    }
}

impl From<StoreError> for YatraError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection, id } => Self::NotFound { collection, id },
            other => Self::Store(other),
        }
    }
}

impl RetryableError for YatraError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, YatraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_maps_to_domain_not_found() {
        let err: YatraError = StoreError::not_found("registrations", &"r1".into()).into();
        assert_eq!(err, YatraError::not_found("registrations", &"r1".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn conflicts_stay_retryable() {
        let err: YatraError = StoreError::Conflict {
            collection: "registrations".into(),
            id: "r1".into(),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn room_conflict_names_both_packages() {
        let err = YatraError::Conflict {
            room: "RM-03".into(),
            existing_package: "Deluxe".into(),
            incoming_package: "Standard".into(),
        };
        let message = err.to_string();
        assert!(message.contains("RM-03"));
        assert!(message.contains("Deluxe"));
        assert!(message.contains("Standard"));
    }
}
