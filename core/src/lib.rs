//! # Yatra Core
//!
//! Storage-agnostic abstractions shared by every crate in the workspace.
//!
//! The domain crate never talks to a concrete database. It receives an
//! already-resolved [`document_store::DocumentStore`] handle for the selected
//! tenant and works through that trait only.
//!
//! ## Core Concepts
//!
//! - **Document**: a JSON object stored under an id inside a named collection
//! - **Document Store**: create/read/update/delete/subscribe against collections
//! - **Transaction**: read-modify-write unit with optimistic concurrency
//! - **Environment**: injected clock and id generator
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Dependency Injection via Environment
//! - Snapshots replace cached state wholesale (no incremental merging)
//!
//! ## Example
//!
//! ```ignore
//! use yatra_core::document_store::{DocumentStore, StoreError};
//! use yatra_core::document::{Collection, DocumentId};
//!
//! async fn load<S: DocumentStore>(store: &S) -> Result<(), StoreError> {
//!     let doc = store
//!         .get(Collection::REGISTRATIONS, &DocumentId::new("reg-1"))
//!         .await?;
//!     Ok(())
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};

pub mod document;
pub mod document_store;

/// Environment module - Dependency injection traits
///
/// All sources of non-determinism (time, generated ids) are abstracted behind
/// traits and injected at the composition root.
pub mod environment {
    use chrono::{DateTime, NaiveDate, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(time);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;

        /// Get the current calendar date (UTC)
        fn today(&self) -> NaiveDate {
            self.now().date_naive()
        }
    }

    /// System clock reading the wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Generates ids for documents created with an automatic id.
    pub trait IdGenerator: Send + Sync {
        /// Produce a fresh, unique document id
        fn next_id(&self) -> String;
    }

    /// Random v4 UUID ids.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidGenerator;

    impl IdGenerator for UuidGenerator {
        fn next_id(&self) -> String {
            uuid::Uuid::new_v4().simple().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, IdGenerator, SystemClock, UuidGenerator};

    #[test]
    fn system_clock_today_matches_now() {
        let clock = SystemClock;
        let now = clock.now();
        let today = clock.today();
        // Midnight rollover between the two calls is the only way these differ
        assert!(today == now.date_naive() || today == now.date_naive().succ_opt().unwrap_or(today));
    }

    #[test]
    fn uuid_generator_is_unique() {
        let ids = UuidGenerator;
        assert_ne!(ids.next_id(), ids.next_id());
    }
}
