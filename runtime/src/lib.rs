//! # Yatra Runtime
//!
//! The imperative shell around the domain's pure decision functions.
//!
//! ## Core Components
//!
//! - **Retry**: backoff schedule for rerunning transactions
//! - **Transaction runner**: begin → body → commit, rerun on optimistic conflicts
//! - **Metrics**: Prometheus metric descriptions and recorder installation
//!
//! ## Example
//!
//! ```ignore
//! use yatra_runtime::transaction::{run_transaction, TransactionBody};
//! use yatra_runtime::retry::RetryPolicy;
//!
//! let output = run_transaction(store.as_ref(), &RetryPolicy::default(), &body).await?;
//! ```

/// Backoff schedule for transaction reruns
pub mod retry;

/// Optimistic read-modify-write transaction runner
pub mod transaction;

/// Prometheus metrics for observability
pub mod metrics;

pub use retry::RetryPolicy;
pub use transaction::{RetryableError, TransactionBody, run_transaction};
