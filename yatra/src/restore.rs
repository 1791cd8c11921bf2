//! Undo of a cancellation.
//!
//! Depending on what survives, the cancelled travellers are merged back into
//! the live registration, the registration is re-created from the snapshot
//! stored on the cancellation record, or (for legacy records with no
//! snapshot) a minimal registration is rebuilt and flagged for follow-up.
//! The cancellation record is deleted in the same transaction.

use crate::context::YatraContext;
use crate::error::{Result, YatraError};
use crate::repository::{decode_cancellation, decode_registration, fields_of, value_of};
use crate::types::{
    CancellationRecord, Money, PaymentDetails, PaymentShape, PaymentType, RegistrationRecord,
    payment_status,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use yatra_core::document::{Collection, DocumentId, Fields};
use yatra_core::document_store::Transaction;
use yatra_runtime::transaction::{BodyFuture, TransactionBody, run_transaction};

/// What an undo did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Registration still existed; cancelled members were appended
    Merged {
        /// Registration written
        registration_id: DocumentId,
        /// Members appended
        restored_members: usize,
    },
    /// Registration re-created from the stored snapshot
    Restored {
        /// Registration written
        registration_id: DocumentId,
    },
    /// No snapshot existed; a minimal registration was rebuilt
    Reconstructed {
        /// Registration written
        registration_id: DocumentId,
        /// What was lost and must be re-entered by an admin
        warning: String,
    },
}

impl RestoreOutcome {
    /// Registration that was written
    #[must_use]
    pub const fn registration_id(&self) -> &DocumentId {
        match self {
            Self::Merged { registration_id, .. }
            | Self::Restored { registration_id }
            | Self::Reconstructed { registration_id, .. } => registration_id,
        }
    }

    /// Metric/log label
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Merged { .. } => "merged",
            Self::Restored { .. } => "snapshot",
            Self::Reconstructed { .. } => "reconstructed",
        }
    }
}

fn restore_note(now: DateTime<Utc>) -> String {
    format!(
        "[System] Restored from cancellation on {}",
        now.format("%Y-%m-%d")
    )
}

/// Re-create a registration from its snapshot.
#[must_use]
pub fn restore_from_snapshot(
    mut snapshot: RegistrationRecord,
    registration_id: &DocumentId,
    now: DateTime<Utc>,
) -> RegistrationRecord {
    snapshot.id = registration_id.clone();
    snapshot.restored_at = Some(now);
    snapshot.append_remark(&restore_note(now));
    snapshot
}

/// Best-effort total for a registration rebuilt without a snapshot.
///
/// Sum of the cancelled members' package prices; failing that the refund
/// grossed up by the applied percentage; failing that the refund itself.
#[must_use]
pub fn reconstructed_total(record: &CancellationRecord) -> Money {
    let from_prices: Money = record.cancelled_members.iter().map(|m| m.price()).sum();
    if !from_prices.is_zero() {
        return from_prices;
    }
    let refund = record.refund_amount;
    match record.refund_percentage_applied {
        Some(pct) if pct > 0 && !refund.is_zero() => {
            Money::new(refund.rupees().saturating_mul(100) / u64::from(pct))
        },
        _ => refund,
    }
}

/// Rebuild a minimal registration from a cancellation record that carries
/// no snapshot. Returns the registration and the data-loss warning.
#[must_use]
pub fn reconstruct_registration(
    record: &CancellationRecord,
    now: DateTime<Utc>,
) -> (RegistrationRecord, String) {
    let warning = format!(
        "{}. CAUTION: Original details (Address, Payment History) were lost and must be re-entered.",
        restore_note(now)
    );
    let total = reconstructed_total(record);

    let mut extra = Fields::new();
    extra.insert("totalAmount".into(), Value::from(total.rupees()));
    extra.insert(
        "paymentStatus".into(),
        Value::String(payment_status::PENDING_VERIFICATION.into()),
    );

    let registration = RegistrationRecord {
        id: record.original_registration_id.clone(),
        name: record.name.clone(),
        phone: record.phone.clone(),
        members: record.cancelled_members.clone(),
        payment: PaymentShape::Nested(PaymentDetails {
            payment_type: PaymentType::Full,
            amount_paid: Money::ZERO,
            total_amount: total,
            payment_status: payment_status::PENDING_VERIFICATION.into(),
            ..PaymentDetails::default()
        }),
        remarks: Some(warning.clone()),
        submitted_at: Some(now),
        restored_at: Some(now),
        extra,
        ..RegistrationRecord::default()
    };
    (registration, warning)
}

struct UndoCancellation<'r> {
    cancellation_id: &'r DocumentId,
    now: DateTime<Utc>,
}

impl TransactionBody for UndoCancellation<'_> {
    type Output = RestoreOutcome;
    type Error = YatraError;

    fn name(&self) -> &'static str {
        "undo_cancellation"
    }

    fn run<'a>(&'a self, txn: &'a mut dyn Transaction) -> BodyFuture<'a, RestoreOutcome, YatraError> {
        Box::pin(async move {
            let doc = txn
                .get(Collection::CANCELLATIONS, self.cancellation_id)
                .await?
                .ok_or_else(|| YatraError::not_found(Collection::CANCELLATIONS, self.cancellation_id))?;
            let record = decode_cancellation(&doc)?;
            let registration_id = record.original_registration_id.clone();
            if registration_id.as_str().is_empty() {
                return Err(YatraError::validation(format!(
                    "cancellation {} does not name its registration",
                    self.cancellation_id
                )));
            }

            let outcome = match txn.get(Collection::REGISTRATIONS, &registration_id).await? {
                Some(current) => {
                    let mut members = decode_registration(&current)?.members;
                    let restored_members = record.cancelled_members.len();
                    members.extend(record.cancelled_members.iter().cloned());

                    let mut fields = Fields::new();
                    fields.insert("members".into(), value_of(&members)?);
                    fields.insert("updatedAt".into(), Value::String(self.now.to_rfc3339()));
                    txn.update(Collection::REGISTRATIONS, &registration_id, fields);
                    RestoreOutcome::Merged { registration_id, restored_members }
                },
                None => match record.original_data.clone() {
                    Some(snapshot) => {
                        let registration = restore_from_snapshot(*snapshot, &registration_id, self.now);
                        txn.set(Collection::REGISTRATIONS, &registration_id, fields_of(&registration)?);
                        RestoreOutcome::Restored { registration_id }
                    },
                    None => {
                        let (registration, warning) = reconstruct_registration(&record, self.now);
                        txn.set(Collection::REGISTRATIONS, &registration_id, fields_of(&registration)?);
                        RestoreOutcome::Reconstructed { registration_id, warning }
                    },
                },
            };

            txn.delete(Collection::CANCELLATIONS, self.cancellation_id);
            Ok(outcome)
        })
    }
}

/// Runs undo operations for one tenant.
pub struct RestoreProcessor<'c> {
    ctx: &'c YatraContext,
}

impl<'c> RestoreProcessor<'c> {
    /// Processor bound to `ctx`
    #[must_use]
    pub const fn new(ctx: &'c YatraContext) -> Self {
        Self { ctx }
    }

    /// Undo the cancellation `cancellation_id`.
    ///
    /// # Errors
    ///
    /// - [`YatraError::NotFound`] if the cancellation record is gone
    ///   (already undone, or deleted)
    /// - [`YatraError::Store`] once retries are exhausted
    pub async fn undo(&self, cancellation_id: &DocumentId) -> Result<RestoreOutcome> {
        let body = UndoCancellation {
            cancellation_id,
            now: self.ctx.clock.now(),
        };
        let outcome = run_transaction(self.ctx.store.as_ref(), &self.ctx.retry, &body).await?;

        metrics::counter!("yatra_restores_total", "path" => outcome.path()).increment(1);
        match &outcome {
            RestoreOutcome::Reconstructed { registration_id, warning } => {
                tracing::warn!(
                    %cancellation_id,
                    %registration_id,
                    warning = %warning,
                    "Registration rebuilt without a snapshot"
                );
            },
            other => {
                tracing::info!(
                    %cancellation_id,
                    registration_id = %other.registration_id(),
                    path = other.path(),
                    "Cancellation undone"
                );
            },
        }
        Ok(outcome)
    }
}
