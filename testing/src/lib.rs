//! # Yatra Testing
//!
//! Testing utilities for the Yatra admin workspace.
//!
//! This crate provides:
//! - [`InMemoryDocumentStore`]: versioned in-memory document store with
//!   optimistic transactions, live snapshots and failure injection
//! - [`FixedClock`]: deterministic time
//! - [`SequentialIdGenerator`]: predictable document ids
//!
//! ## Example
//!
//! ```ignore
//! use yatra_testing::{InMemoryDocumentStore, test_clock};
//!
//! #[tokio::test]
//! async fn cancels_one_member() {
//!     let store = InMemoryDocumentStore::new();
//!     let clock = test_clock();
//!     // seed registrations, run a processor, assert on the store...
//! }
//! ```

use chrono::{DateTime, Utc};
use yatra_core::environment::{Clock, IdGenerator};

mod store_mocks;

pub use store_mocks::InMemoryDocumentStore;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, IdGenerator, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use yatra_testing::mocks::FixedClock;
    /// use yatra_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// Fixed clock at midday UTC of the given `YYYY-MM-DD` date.
        ///
        /// # Panics
        ///
        /// Panics if `date` is not a valid ISO date. Test-only helper.
        #[must_use]
        #[allow(clippy::expect_used)]
        pub fn on_date(date: &str) -> Self {
            let time = DateTime::parse_from_rfc3339(&format!("{date}T12:00:00Z"))
                .expect("test date should be YYYY-MM-DD")
                .with_timezone(&Utc);
            Self::new(time)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Sequential id generator: `<prefix>-0001`, `<prefix>-0002`, ...
    #[derive(Debug)]
    pub struct SequentialIdGenerator {
        prefix: String,
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator with the given prefix, starting at 1
        #[must_use]
        pub fn new(prefix: impl Into<String>) -> Self {
            Self {
                prefix: prefix.into(),
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialIdGenerator {
        fn default() -> Self {
            Self::new("doc")
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> String {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            format!("{}-{n:04}", self.prefix)
        }
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, SequentialIdGenerator, test_clock};
