//! Optimistic read-modify-write transactions.
//!
//! A [`TransactionBody`] describes one unit of work against a
//! [`Transaction`]. [`run_transaction`] opens a transaction, runs the body,
//! commits, and reruns everything from scratch when the store reports a
//! retryable failure (typically a write conflict).
//!
//! The body may therefore execute several times. It takes `&self`, so it
//! cannot accumulate state between attempts; everything it learns must come
//! from the transaction's own reads.

use crate::retry::{RetryPolicy, retry_transient};
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use yatra_core::document_store::{DocumentStore, StoreError, Transaction};

/// Boxed future returned by [`TransactionBody::run`].
pub type BodyFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Errors that know whether rerunning the transaction could help.
pub trait RetryableError {
    /// `true` if the whole transaction should be rerun
    fn is_retryable(&self) -> bool;
}

impl RetryableError for StoreError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// One unit of transactional work.
///
/// # Example
///
/// ```ignore
/// struct Touch { id: DocumentId }
///
/// impl TransactionBody for Touch {
///     type Output = bool;
///     type Error = StoreError;
///
///     fn name(&self) -> &'static str { "touch" }
///
///     fn run<'a>(&'a self, txn: &'a mut dyn Transaction) -> BodyFuture<'a, bool, StoreError> {
///         Box::pin(async move {
///             let exists = txn.get("registrations", &self.id).await?.is_some();
///             Ok(exists)
///         })
///     }
/// }
/// ```
pub trait TransactionBody: Sync {
    /// Value produced by a committed run
    type Output: Send;

    /// Error type; store failures convert into it
    type Error: From<StoreError> + RetryableError + Display + Send;

    /// Short label used in logs and metrics
    fn name(&self) -> &'static str;

    /// Execute the body against an open transaction.
    ///
    /// Must only act through `txn`: it may be invoked again after a conflict.
    fn run<'a>(
        &'a self,
        txn: &'a mut dyn Transaction,
    ) -> BodyFuture<'a, Self::Output, Self::Error>;
}

/// Run `body` inside a transaction, retrying on retryable errors.
///
/// # Errors
///
/// Returns the body's error, or the store error from `begin`/`commit`, once
/// it is non-retryable or `policy.max_retries` is exhausted. No buffered
/// write of a failed attempt is ever applied.
pub async fn run_transaction<B>(
    store: &dyn DocumentStore,
    policy: &RetryPolicy,
    body: &B,
) -> Result<B::Output, B::Error>
where
    B: TransactionBody,
{
    let started = Instant::now();
    let mut attempts: u64 = 0;

    let result = retry_transient(
        policy,
        || {
            attempts += 1;
            attempt(store, body)
        },
        RetryableError::is_retryable,
    )
    .await;

    let outcome = if result.is_ok() { "committed" } else { "failed" };
    metrics::histogram!("yatra_transaction_duration_seconds", "body" => body.name())
        .record(started.elapsed().as_secs_f64());
    metrics::counter!("yatra_transactions_total", "body" => body.name(), "outcome" => outcome)
        .increment(1);
    if attempts > 1 {
        metrics::counter!("yatra_transaction_retries_total", "body" => body.name())
            .increment(attempts - 1);
    }

    match &result {
        Ok(_) => tracing::debug!(body = body.name(), attempts, "Transaction committed"),
        Err(err) => tracing::error!(body = body.name(), attempts, error = %err, "Transaction failed"),
    }

    result
}

async fn attempt<B>(store: &dyn DocumentStore, body: &B) -> Result<B::Output, B::Error>
where
    B: TransactionBody,
{
    let mut txn = store.begin().await?;
    let output = body.run(txn.as_mut()).await?;
    txn.commit().await?;
    Ok(output)
}
