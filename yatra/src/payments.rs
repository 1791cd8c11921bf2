//! Payment tracking: collector board, alerts and payment edits.
//!
//! Every registration contributes one [`PaymentItem`] per installment, or a
//! single item for the whole payment when there is no schedule. Items are
//! attributed to a collector (a person or "cash") or left unassigned.

use crate::context::YatraContext;
use crate::error::{Result, YatraError};
use crate::repository::{decode_registration, fields_of};
use crate::types::{
    InstallmentStatus, Money, PaymentDetails, PaymentShape, RegistrationRecord, payment_status,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use yatra_core::document::{Collection, DocumentId};
use yatra_core::document_store::Transaction;
use yatra_runtime::transaction::{BodyFuture, TransactionBody, run_transaction};

/// Collector name used for cash payments.
pub const CASH_COLLECTOR: &str = "cash";

/// Which part of a registration's payment an item stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PaymentTarget {
    /// The whole payment (no installment schedule)
    Full,
    /// One installment, by position
    Installment(usize),
}

/// One trackable payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentItem {
    /// Owning registration
    pub registration_id: DocumentId,
    /// Part of the payment
    pub target: PaymentTarget,
    /// Display label
    pub label: String,
    /// Amount of the installment, or of the whole payment
    pub amount: Money,
    /// Status string as stored
    pub status: String,
    /// Collector, `None` when unassigned
    pub collector: Option<String>,
    /// Installment due date
    pub due_date: Option<NaiveDate>,
}

impl PaymentItem {
    /// Paid or verified
    #[must_use]
    pub fn is_settled(&self) -> bool {
        is_settled_status(&self.status)
    }

    /// Unsettled installment whose due date is before `as_of`
    #[must_use]
    pub fn is_overdue(&self, as_of: NaiveDate) -> bool {
        matches!(self.target, PaymentTarget::Installment(_))
            && !self.is_settled()
            && self.due_date.is_some_and(|due| due < as_of)
    }

    /// Needs an admin: an unsettled first or full payment, or an overdue
    /// installment
    #[must_use]
    pub fn needs_attention(&self, as_of: NaiveDate) -> bool {
        match self.target {
            PaymentTarget::Full | PaymentTarget::Installment(0) => !self.is_settled(),
            PaymentTarget::Installment(_) => self.is_overdue(as_of),
        }
    }
}

fn is_settled_status(status: &str) -> bool {
    status == payment_status::VERIFIED || status == "paid"
}

fn installment_status_str(status: InstallmentStatus) -> &'static str {
    match status {
        InstallmentStatus::Pending => payment_status::PENDING,
        InstallmentStatus::Paid => "paid",
        InstallmentStatus::VerificationPending => payment_status::VERIFICATION_PENDING,
        InstallmentStatus::Verified => payment_status::VERIFIED,
        InstallmentStatus::Rejected => "rejected",
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(&needle.to_lowercase()))
}

/// Collector named in the remarks, first match in `collectors` order.
fn collector_from_remarks(registration: &RegistrationRecord, collectors: &[String]) -> Option<String> {
    collectors
        .iter()
        .find(|name| contains_ignore_case(registration.remarks.as_deref(), name))
        .cloned()
}

/// Collector explicitly stored for the whole payment.
fn stored_full_collector(registration: &RegistrationRecord) -> Option<String> {
    let stored = match &registration.payment {
        PaymentShape::Nested(details) => details.assigned_to.clone(),
        PaymentShape::Flat(_) => registration
            .extra
            .get("assignedTo")
            .and_then(Value::as_str)
            .map(str::to_string),
    };
    stored.filter(|s| !s.is_empty())
}

/// Break a registration's payment into trackable items.
///
/// Collector attribution, in order: the stored assignee; "cash" when the
/// reference mentions cash; a collector named in the remarks. Only the
/// first installment falls back to the reference and remarks.
#[must_use]
pub fn payment_items(registration: &RegistrationRecord, collectors: &[String]) -> Vec<PaymentItem> {
    let payment = &registration.payment;
    let installments = payment.installments();

    if installments.is_empty() {
        let collector = stored_full_collector(registration)
            .or_else(|| payment.is_cash().then(|| CASH_COLLECTOR.to_string()))
            .or_else(|| collector_from_remarks(registration, collectors));
        let amount = if payment.amount_paid().is_zero() {
            payment.total_amount()
        } else {
            payment.amount_paid()
        };
        return vec![PaymentItem {
            registration_id: registration.id.clone(),
            target: PaymentTarget::Full,
            label: registration.name.clone(),
            amount,
            status: payment.status().to_string(),
            collector,
            due_date: None,
        }];
    }

    installments
        .iter()
        .enumerate()
        .map(|(index, installment)| {
            let reference = installment.utr_number.as_deref().or_else(|| payment.utr());
            let collector = installment
                .assigned_to
                .clone()
                .filter(|s| !s.is_empty())
                .or_else(|| {
                    (index == 0 && contains_ignore_case(reference, CASH_COLLECTOR))
                        .then(|| CASH_COLLECTOR.to_string())
                })
                .or_else(|| {
                    (index == 0)
                        .then(|| collector_from_remarks(registration, collectors))
                        .flatten()
                });
            PaymentItem {
                registration_id: registration.id.clone(),
                target: PaymentTarget::Installment(index),
                label: format!("{} (Inst. {})", registration.name, index + 1),
                amount: installment.amount,
                status: installment_status_str(installment.status).to_string(),
                collector,
                due_date: installment.due_date,
            }
        })
        .collect()
}

/// Items of many registrations, grouped by collector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentBoard {
    items: Vec<PaymentItem>,
}

impl PaymentBoard {
    /// Board over `registrations`
    #[must_use]
    pub fn from_registrations(registrations: &[RegistrationRecord], collectors: &[String]) -> Self {
        Self {
            items: registrations
                .iter()
                .flat_map(|r| payment_items(r, collectors))
                .collect(),
        }
    }

    /// Every item, registration order
    #[must_use]
    pub fn items(&self) -> &[PaymentItem] {
        &self.items
    }

    /// Items per collector; the `None` key holds the unassigned ones
    #[must_use]
    pub fn columns(&self) -> BTreeMap<Option<&str>, Vec<&PaymentItem>> {
        let mut columns: BTreeMap<Option<&str>, Vec<&PaymentItem>> = BTreeMap::new();
        for item in &self.items {
            columns.entry(item.collector.as_deref()).or_default().push(item);
        }
        columns
    }

    /// Items needing an admin as of `as_of`
    #[must_use]
    pub fn alerts(&self, as_of: NaiveDate) -> Vec<&PaymentItem> {
        self.items.iter().filter(|i| i.needs_attention(as_of)).collect()
    }

    /// Overdue installments as of `as_of`
    #[must_use]
    pub fn overdue(&self, as_of: NaiveDate) -> Vec<&PaymentItem> {
        self.items.iter().filter(|i| i.is_overdue(as_of)).collect()
    }
}

/// Overdue installments across `registrations` as of `as_of`.
#[must_use]
pub fn overdue_installments(registrations: &[RegistrationRecord], as_of: NaiveDate) -> Vec<PaymentItem> {
    registrations
        .iter()
        .flat_map(|r| payment_items(r, &[]))
        .filter(|item| item.is_overdue(as_of))
        .collect()
}

/// Set `amountPaid` to the sum of settled installments.
pub fn recompute_amount_paid(details: &mut PaymentDetails) {
    details.amount_paid = details
        .installments
        .iter()
        .filter(|i| i.status.is_settled())
        .map(|i| i.amount)
        .sum();
}

fn nested_mut<'r>(registration: &'r mut RegistrationRecord) -> Result<&'r mut PaymentDetails> {
    let id = registration.id.clone();
    match &mut registration.payment {
        PaymentShape::Nested(details) => Ok(details),
        PaymentShape::Flat(_) => Err(YatraError::validation(format!(
            "registration {id} has no installment schedule"
        ))),
    }
}

fn installment_mut(
    registration: &mut RegistrationRecord,
    index: usize,
) -> Result<&mut PaymentDetails> {
    let id = registration.id.clone();
    let details = nested_mut(registration)?;
    if index >= details.installments.len() {
        return Err(YatraError::validation(format!(
            "registration {id} has no installment {}",
            index + 1
        )));
    }
    Ok(details)
}

/// Set the payment status, keeping a nested block's root mirror in step.
fn write_payment_status(registration: &mut RegistrationRecord, status: &str) {
    registration.payment.set_status(status);
    if matches!(registration.payment, PaymentShape::Nested(_)) {
        registration
            .extra
            .insert("paymentStatus".into(), Value::String(status.to_string()));
    }
}

/// A change to one registration's payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentEdit {
    /// Set an installment's status; `amountPaid` follows
    InstallmentStatus {
        /// Installment position
        index: usize,
        /// New status
        status: InstallmentStatus,
    },
    /// Set the whole-payment status
    PaymentStatus(String),
    /// Hand an item to a collector (`None` unassigns)
    Assign {
        /// Item
        target: PaymentTarget,
        /// Collector
        collector: Option<String>,
    },
    /// Mark the whole payment verified
    Verify,
}

impl PaymentEdit {
    const fn name(&self) -> &'static str {
        match self {
            Self::InstallmentStatus { .. } => "installment_status",
            Self::PaymentStatus(_) => "payment_status",
            Self::Assign { .. } => "assign_collector",
            Self::Verify => "verify_payment",
        }
    }

    /// Apply the edit to a decoded registration.
    ///
    /// Assigning to a collector settles the item (`paid` for an installment,
    /// `verified` for a whole payment). Unassigning keeps its status.
    ///
    /// # Errors
    ///
    /// [`YatraError::Validation`] for an installment edit on a registration
    /// without that installment, or a blank status.
    pub fn apply(&self, registration: &mut RegistrationRecord) -> Result<()> {
        match self {
            Self::InstallmentStatus { index, status } => {
                let details = installment_mut(registration, *index)?;
                details.installments[*index].status = *status;
                recompute_amount_paid(details);
            },
            Self::PaymentStatus(status) => {
                let status = status.trim();
                if status.is_empty() {
                    return Err(YatraError::validation("payment status must not be blank"));
                }
                write_payment_status(registration, status);
            },
            Self::Assign {
                target: PaymentTarget::Installment(index),
                collector,
            } => {
                let details = installment_mut(registration, *index)?;
                let installment = &mut details.installments[*index];
                installment.assigned_to.clone_from(collector);
                if collector.is_some() {
                    installment.status = InstallmentStatus::Paid;
                }
                recompute_amount_paid(details);
            },
            Self::Assign {
                target: PaymentTarget::Full,
                collector,
            } => {
                match &mut registration.payment {
                    PaymentShape::Nested(details) => details.assigned_to.clone_from(collector),
                    PaymentShape::Flat(_) => {
                        let value = collector.clone().map_or(Value::Null, Value::String);
                        registration.extra.insert("assignedTo".into(), value);
                    },
                }
                if collector.is_some() {
                    write_payment_status(registration, payment_status::VERIFIED);
                }
            },
            Self::Verify => write_payment_status(registration, payment_status::VERIFIED),
        }
        Ok(())
    }
}

struct EditPayment<'r> {
    registration_id: &'r DocumentId,
    edit: &'r PaymentEdit,
    now: DateTime<Utc>,
}

impl TransactionBody for EditPayment<'_> {
    type Output = RegistrationRecord;
    type Error = YatraError;

    fn name(&self) -> &'static str {
        self.edit.name()
    }

    fn run<'a>(&'a self, txn: &'a mut dyn Transaction) -> BodyFuture<'a, RegistrationRecord, YatraError> {
        Box::pin(async move {
            let doc = txn
                .get(Collection::REGISTRATIONS, self.registration_id)
                .await?
                .ok_or_else(|| YatraError::not_found(Collection::REGISTRATIONS, self.registration_id))?;
            let mut registration = decode_registration(&doc)?;
            self.edit.apply(&mut registration)?;
            registration.updated_at = Some(self.now);
            txn.set(Collection::REGISTRATIONS, self.registration_id, fields_of(&registration)?);
            Ok(registration)
        })
    }
}

/// Payment tracking operations for one tenant.
pub struct PaymentTracker<'c> {
    ctx: &'c YatraContext,
    collectors: Vec<String>,
}

impl<'c> PaymentTracker<'c> {
    /// Tracker bound to `ctx`, attributing remarks to `collectors`
    #[must_use]
    pub fn new(ctx: &'c YatraContext, collectors: Vec<String>) -> Self {
        Self { ctx, collectors }
    }

    /// Current collector board
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn board(&self) -> Result<PaymentBoard> {
        let registrations = self.ctx.repository().registrations().await?;
        Ok(PaymentBoard::from_registrations(&registrations, &self.collectors))
    }

    /// Apply `edit` to a registration in a transaction.
    ///
    /// # Errors
    ///
    /// [`YatraError::NotFound`] if the registration is gone, the edit's
    /// validation errors, or the store error after retries.
    pub async fn edit(&self, registration_id: &DocumentId, edit: &PaymentEdit) -> Result<RegistrationRecord> {
        let body = EditPayment {
            registration_id,
            edit,
            now: self.ctx.clock.now(),
        };
        let registration = run_transaction(self.ctx.store.as_ref(), &self.ctx.retry, &body).await?;
        metrics::counter!("yatra_payment_edits_total", "edit" => edit.name()).increment(1);
        tracing::info!(
            %registration_id,
            edit = edit.name(),
            amount_paid = %registration.payment.amount_paid(),
            status = registration.payment.status(),
            "Payment updated"
        );
        Ok(registration)
    }

    /// Set an installment's status
    ///
    /// # Errors
    ///
    /// See [`Self::edit`].
    pub async fn set_installment_status(
        &self,
        registration_id: &DocumentId,
        index: usize,
        status: InstallmentStatus,
    ) -> Result<RegistrationRecord> {
        self.edit(registration_id, &PaymentEdit::InstallmentStatus { index, status })
            .await
    }

    /// Hand an item to a collector, or unassign it with `None`
    ///
    /// # Errors
    ///
    /// See [`Self::edit`].
    pub async fn assign_collector(
        &self,
        registration_id: &DocumentId,
        target: PaymentTarget,
        collector: Option<&str>,
    ) -> Result<RegistrationRecord> {
        let edit = PaymentEdit::Assign {
            target,
            collector: collector.map(str::to_string),
        };
        self.edit(registration_id, &edit).await
    }

    /// Mark a registration's payment verified
    ///
    /// # Errors
    ///
    /// See [`Self::edit`].
    pub async fn verify_payment(&self, registration_id: &DocumentId) -> Result<RegistrationRecord> {
        self.edit(registration_id, &PaymentEdit::Verify).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{FlatPayment, Installment, PaymentType};

    fn collectors() -> Vec<String> {
        vec!["chaitanya".into(), "narayana".into()]
    }

    fn installment(amount: u64, due: &str, status: InstallmentStatus) -> Installment {
        Installment {
            amount: Money::new(amount),
            due_date: NaiveDate::parse_from_str(due, "%Y-%m-%d").ok(),
            status,
            ..Installment::default()
        }
    }

    fn scheduled(remarks: Option<&str>, utr: Option<&str>) -> RegistrationRecord {
        RegistrationRecord {
            id: "r1".into(),
            name: "Ravi".into(),
            remarks: remarks.map(str::to_string),
            payment: PaymentShape::Nested(PaymentDetails {
                payment_type: PaymentType::Installment,
                total_amount: Money::new(30_000),
                utr_number: utr.map(str::to_string),
                installments: vec![
                    installment(10_000, "2025-01-10", InstallmentStatus::Paid),
                    installment(10_000, "2025-02-10", InstallmentStatus::Pending),
                    installment(10_000, "2025-03-10", InstallmentStatus::Pending),
                ],
                ..PaymentDetails::default()
            }),
            ..RegistrationRecord::default()
        }
    }

    fn flat(status: &str, utr: Option<&str>, remarks: Option<&str>) -> RegistrationRecord {
        RegistrationRecord {
            id: "r2".into(),
            name: "Sita".into(),
            remarks: remarks.map(str::to_string),
            payment: PaymentShape::Flat(FlatPayment {
                total_amount: Money::new(9000),
                payment_status: status.into(),
                utr: utr.map(str::to_string),
            }),
            ..RegistrationRecord::default()
        }
    }

    #[test]
    fn only_first_installment_reads_reference_and_remarks() {
        let items = payment_items(&scheduled(Some("Paid to Chaitanya"), None), &collectors());
        let who: Vec<_> = items.iter().map(|i| i.collector.as_deref()).collect();
        assert_eq!(who, vec![Some("chaitanya"), None, None]);
        assert_eq!(items[1].label, "Ravi (Inst. 2)");

        let items = payment_items(&scheduled(Some("chaitanya"), Some("CASH receipt 12")), &collectors());
        assert_eq!(items[0].collector.as_deref(), Some(CASH_COLLECTOR));
        assert_eq!(items[1].collector, None);
    }

    #[test]
    fn full_payment_attribution_order() {
        let item = &payment_items(&flat("pending", Some("cash"), Some("narayana")), &collectors())[0];
        assert_eq!(item.collector.as_deref(), Some(CASH_COLLECTOR));
        assert_eq!(item.amount, Money::new(9000));

        let item = &payment_items(&flat("pending", Some("UTR998"), Some("via Narayana")), &collectors())[0];
        assert_eq!(item.collector.as_deref(), Some("narayana"));

        let item = &payment_items(&flat("pending", None, None), &collectors())[0];
        assert_eq!(item.collector, None);
    }

    #[test]
    fn alerts_and_overdue() {
        let as_of = NaiveDate::from_ymd_opt(2025, 2, 15).unwrap();
        let board = PaymentBoard::from_registrations(
            &[scheduled(None, None), flat(payment_status::VERIFIED, None, None), flat("pending", None, None)],
            &collectors(),
        );
        let alerts: Vec<_> = board.alerts(as_of).iter().map(|i| (i.registration_id.as_str(), i.target)).collect();
        assert_eq!(alerts, vec![("r1", PaymentTarget::Installment(1)), ("r2", PaymentTarget::Full)]);
        assert_eq!(board.overdue(as_of).len(), 1);
        assert_eq!(overdue_installments(&[scheduled(None, None)], as_of).len(), 1);

        let columns = board.columns();
        assert_eq!(columns[&None].len(), 5);
    }

    #[test]
    fn installment_status_recomputes_amount_paid() {
        let mut reg = scheduled(None, None);
        PaymentEdit::InstallmentStatus { index: 1, status: InstallmentStatus::Verified }
            .apply(&mut reg)
            .unwrap();
        assert_eq!(reg.payment.amount_paid(), Money::new(20_000));

        PaymentEdit::InstallmentStatus { index: 0, status: InstallmentStatus::VerificationPending }
            .apply(&mut reg)
            .unwrap();
        assert_eq!(reg.payment.amount_paid(), Money::new(10_000));
    }

    #[test]
    fn assigning_installment_marks_it_paid() {
        let mut reg = scheduled(None, None);
        PaymentEdit::Assign { target: PaymentTarget::Installment(2), collector: Some("narayana".into()) }
            .apply(&mut reg)
            .unwrap();
        let inst = &reg.payment.installments()[2];
        assert_eq!(inst.status, InstallmentStatus::Paid);
        assert_eq!(inst.assigned_to.as_deref(), Some("narayana"));
        assert_eq!(reg.payment.amount_paid(), Money::new(20_000));

        PaymentEdit::Assign { target: PaymentTarget::Installment(2), collector: None }
            .apply(&mut reg)
            .unwrap();
        let inst = &reg.payment.installments()[2];
        assert_eq!(inst.assigned_to, None);
        assert_eq!(inst.status, InstallmentStatus::Paid);
    }

    #[test]
    fn assigning_full_payment_verifies_it() {
        let mut reg = flat("pending", None, None);
        PaymentEdit::Assign { target: PaymentTarget::Full, collector: Some("cash".into()) }
            .apply(&mut reg)
            .unwrap();
        assert_eq!(reg.payment.status(), payment_status::VERIFIED);
        assert_eq!(payment_items(&reg, &[])[0].collector.as_deref(), Some("cash"));
    }

    #[test]
    fn installment_edits_need_a_schedule() {
        let mut reg = flat("pending", None, None);
        let edit = PaymentEdit::InstallmentStatus { index: 0, status: InstallmentStatus::Paid };
        assert!(matches!(edit.apply(&mut reg), Err(YatraError::Validation(_))));

        let mut reg = scheduled(None, None);
        let edit = PaymentEdit::InstallmentStatus { index: 7, status: InstallmentStatus::Paid };
        assert!(matches!(edit.apply(&mut reg), Err(YatraError::Validation(_))));
    }

    #[test]
    fn verify_updates_nested_root_mirror() {
        let mut reg = scheduled(None, None);
        PaymentEdit::Verify.apply(&mut reg).unwrap();
        assert_eq!(reg.payment.status(), payment_status::VERIFIED);
        assert_eq!(reg.extra["paymentStatus"], Value::String("verified".into()));
    }
}
