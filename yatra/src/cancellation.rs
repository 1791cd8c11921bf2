//! Full and partial cancellation of registrations.
//!
//! A cancellation removes some or all travellers from a registration and
//! writes an audit record carrying the refund owed and a snapshot of the
//! registration as it was. Both writes happen in one optimistic transaction
//! so no reader ever sees the registration changed without its record.

use crate::context::YatraContext;
use crate::error::{Result, YatraError};
use crate::policy::RefundQuote;
use crate::repository::{decode_registration, fields_of, value_of};
use crate::types::{CancellationRecord, Member, RefundStatus, RegistrationRecord};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeSet;
use yatra_core::document::{Collection, DocumentId, Fields};
use yatra_core::document_store::Transaction;
use yatra_runtime::transaction::{BodyFuture, TransactionBody, run_transaction};

/// A member picked for cancellation: position plus the name it had when
/// the selection was made.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemberRef {
    /// Index into the registration's member list
    pub index: usize,
    /// Expected member name at that index
    pub name: String,
}

/// Input of a cancellation.
#[derive(Clone, Debug, PartialEq)]
pub struct CancellationRequest {
    /// Registration to cancel from
    pub registration_id: DocumentId,
    /// Members to remove
    pub members: Vec<MemberRef>,
    /// Refund computed for this selection
    pub quote: RefundQuote,
    /// Optional admin remark for the record
    pub remarks: Option<String>,
}

impl CancellationRequest {
    /// Build a request from member names, resolved against `registration`.
    ///
    /// # Errors
    ///
    /// [`YatraError::Validation`] if a name is unknown or shared by more than
    /// one member of the registration.
    pub fn by_names<I, S>(registration: &RegistrationRecord, names: I, quote: RefundQuote) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let wanted: BTreeSet<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        let mut members = Vec::with_capacity(wanted.len());
        for name in wanted {
            let mut positions = registration
                .members
                .iter()
                .enumerate()
                .filter(|(_, m)| m.name == name)
                .map(|(i, _)| i);
            let index = positions.next().ok_or_else(|| {
                YatraError::validation(format!("'{name}' is not a member of this registration"))
            })?;
            if positions.next().is_some() {
                return Err(YatraError::validation(format!(
                    "'{name}' names more than one member of this registration"
                )));
            }
            members.push(MemberRef { index, name });
        }

        Ok(Self {
            registration_id: registration.id.clone(),
            members,
            quote,
            remarks: None,
        })
    }

    /// Attach an admin remark
    #[must_use]
    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into());
        self
    }
}

/// Whether the registration survives the cancellation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancellationKind {
    /// Every member left; the registration was deleted
    Full,
    /// Some members remain
    Partial,
}

impl CancellationKind {
    /// Metric/log label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Partial => "partial",
        }
    }
}

/// How the member list splits.
#[derive(Clone, Debug, PartialEq)]
pub struct CancellationPlan {
    /// Members that stay, in their original order
    pub kept: Vec<Member>,
    /// Members that leave, in their original order
    pub cancelled: Vec<Member>,
}

impl CancellationPlan {
    /// Full when nobody stays
    #[must_use]
    pub fn kind(&self) -> CancellationKind {
        if self.kept.is_empty() {
            CancellationKind::Full
        } else {
            CancellationKind::Partial
        }
    }
}

/// Split `members` according to `selection`.
///
/// # Errors
///
/// [`YatraError::Validation`] for an empty or repeated selection, or when a
/// selected index no longer holds the expected member (the registration
/// changed since the selection was made).
pub fn plan_cancellation(members: &[Member], selection: &[MemberRef]) -> Result<CancellationPlan> {
    if selection.is_empty() {
        return Err(YatraError::validation("select at least one member to cancel"));
    }

    let mut picked = BTreeSet::new();
    for member in selection {
        if !picked.insert(member.index) {
            return Err(YatraError::validation(format!(
                "member '{}' selected twice",
                member.name
            )));
        }
        match members.get(member.index) {
            Some(current) if current.name == member.name => {},
            _ => {
                return Err(YatraError::validation(format!(
                    "member '{}' is no longer at position {}; reload and try again",
                    member.name, member.index
                )));
            },
        }
    }

    let (cancelled, kept): (Vec<_>, Vec<_>) = members
        .iter()
        .enumerate()
        .partition(|(i, _)| picked.contains(i));

    Ok(CancellationPlan {
        kept: kept.into_iter().map(|(_, m)| m.clone()).collect(),
        cancelled: cancelled.into_iter().map(|(_, m)| m.clone()).collect(),
    })
}

/// Result of a committed cancellation.
#[derive(Clone, Debug, PartialEq)]
pub struct CancellationReceipt {
    /// New cancellation record
    pub cancellation_id: DocumentId,
    /// Registration cancelled from
    pub registration_id: DocumentId,
    /// Full or partial
    pub kind: CancellationKind,
    /// Names of the members removed
    pub cancelled: Vec<String>,
    /// Members still on the registration
    pub remaining: usize,
    /// Refund recorded
    pub refund: RefundQuote,
}

struct CancelMembers<'r> {
    request: &'r CancellationRequest,
    cancellation_id: &'r DocumentId,
    yatra_id: &'r str,
    now: DateTime<Utc>,
}

impl TransactionBody for CancelMembers<'_> {
    type Output = CancellationReceipt;
    type Error = YatraError;

    fn name(&self) -> &'static str {
        "cancel_members"
    }

    fn run<'a>(
        &'a self,
        txn: &'a mut dyn Transaction,
    ) -> BodyFuture<'a, CancellationReceipt, YatraError> {
        Box::pin(async move {
            let registration_id = &self.request.registration_id;
            let doc = txn
                .get(Collection::REGISTRATIONS, registration_id)
                .await?
                .ok_or_else(|| YatraError::not_found(Collection::REGISTRATIONS, registration_id))?;
            let registration = decode_registration(&doc)?;
            let plan = plan_cancellation(&registration.members, &self.request.members)?;
            let kind = plan.kind();

            match kind {
                CancellationKind::Full => txn.delete(Collection::REGISTRATIONS, registration_id),
                CancellationKind::Partial => {
                    let mut fields = Fields::new();
                    fields.insert("members".into(), value_of(&plan.kept)?);
                    fields.insert("updatedAt".into(), Value::String(self.now.to_rfc3339()));
                    txn.update(Collection::REGISTRATIONS, registration_id, fields);
                },
            }

            let record = CancellationRecord {
                id: self.cancellation_id.clone(),
                original_registration_id: registration_id.clone(),
                name: registration.name.clone(),
                phone: registration.phone.clone(),
                cancelled_members: plan.cancelled.clone(),
                refund_amount: self.request.quote.amount,
                refund_percentage_applied: Some(self.request.quote.percentage),
                refund_status: RefundStatus::Pending,
                refund_utr: None,
                cancelled_at: Some(self.now),
                remarks: self.request.remarks.clone(),
                yatra_id: Some(self.yatra_id.to_string()),
                original_data: Some(Box::new(registration)),
                extra: Fields::new(),
            };
            txn.set(Collection::CANCELLATIONS, self.cancellation_id, fields_of(&record)?);

            Ok(CancellationReceipt {
                cancellation_id: self.cancellation_id.clone(),
                registration_id: registration_id.clone(),
                kind,
                cancelled: plan.cancelled.iter().map(|m| m.name.clone()).collect(),
                remaining: plan.kept.len(),
                refund: self.request.quote,
            })
        })
    }
}

/// Runs cancellations for one tenant.
pub struct CancellationProcessor<'c> {
    ctx: &'c YatraContext,
}

impl<'c> CancellationProcessor<'c> {
    /// Processor bound to `ctx`
    #[must_use]
    pub const fn new(ctx: &'c YatraContext) -> Self {
        Self { ctx }
    }

    /// Refund owed today for cancelling `cancelling` members of `registration`
    #[must_use]
    pub fn quote(&self, registration: &RegistrationRecord, cancelling: usize) -> RefundQuote {
        RefundQuote::for_registration(
            registration,
            cancelling,
            &self.ctx.tenant.policy,
            self.ctx.today(),
        )
    }

    /// Cancel the selected members.
    ///
    /// Deletes the registration when nobody stays, otherwise rewrites its
    /// member list. Either way a cancellation record is created in the same
    /// transaction.
    ///
    /// # Errors
    ///
    /// - [`YatraError::NotFound`] if the registration is gone
    /// - [`YatraError::Validation`] for a bad or stale selection
    /// - [`YatraError::Store`] once retries are exhausted
    pub async fn cancel(&self, request: &CancellationRequest) -> Result<CancellationReceipt> {
        // Allocated once so every retry writes the same record.
        let cancellation_id = DocumentId::new(self.ctx.ids.next_id());
        let body = CancelMembers {
            request,
            cancellation_id: &cancellation_id,
            yatra_id: &self.ctx.tenant.id,
            now: self.ctx.clock.now(),
        };

        let receipt = run_transaction(self.ctx.store.as_ref(), &self.ctx.retry, &body).await?;

        metrics::counter!("yatra_cancellations_total", "kind" => receipt.kind.as_str()).increment(1);
        tracing::info!(
            registration_id = %receipt.registration_id,
            cancellation_id = %receipt.cancellation_id,
            kind = receipt.kind.as_str(),
            cancelled = receipt.cancelled.len(),
            remaining = receipt.remaining,
            refund = %receipt.refund.amount,
            refund_percentage = receipt.refund.percentage,
            "Members cancelled"
        );
        Ok(receipt)
    }
}
