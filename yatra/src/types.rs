//! Domain types for the Yatra admin engine.
//!
//! Records mirror the stored documents field for field (camelCase on the
//! wire). Fields this crate does not model are kept in a flattened `extra`
//! map so that a read-modify-write never drops tenant-specific data.

use crate::serde_helpers;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;
use yatra_core::document::{DocumentId, Fields};

/// Package label used when a member has none.
pub const UNKNOWN_PACKAGE: &str = "Unknown";

// ============================================================================
// Money
// ============================================================================

/// Whole-rupee amount.
///
/// Reads integers, floats (floored) and numeric strings; anything else is
/// zero. Always written back as an integer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero rupees
    pub const ZERO: Self = Self(0);

    /// Creates an amount in rupees
    #[must_use]
    pub const fn new(rupees: u64) -> Self {
        Self(rupees)
    }

    /// Amount in rupees
    #[must_use]
    pub const fn rupees(self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_float(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value.floor() as u64)
        } else {
            Self::ZERO
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_u64()
                .map_or_else(|| n.as_f64().map_or(Self::ZERO, Self::from_float), Self),
            Value::String(text) => text
                .trim()
                .parse::<f64>()
                .map_or(Self::ZERO, Self::from_float),
            _ => Self::ZERO,
        }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

// ============================================================================
// Members
// ============================================================================

/// A member's age as it was entered: a number, a string, or absent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Age {
    /// Numeric age
    Number(Number),
    /// Free-text age (usually digits typed into a text box)
    Text(String),
    /// Missing or of an unexpected type; kept verbatim
    Other(Value),
}

impl Age {
    /// Whole years, if the age reads as a non-negative number
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn years(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f.floor() as u64)
            }),
            Self::Text(text) => {
                let text = text.trim();
                text.parse::<u64>().ok().or_else(|| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f.floor() as u64)
                })
            },
            Self::Other(_) => None,
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, Self::Other(Value::Null))
    }
}

impl Default for Age {
    fn default() -> Self {
        Self::Other(Value::Null)
    }
}

impl From<u64> for Age {
    fn from(years: u64) -> Self {
        Self::Number(years.into())
    }
}

/// One traveller within a registration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    /// Traveller name; the cancellation key within a registration
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    pub name: String,
    /// Age as entered
    #[serde(default, skip_serializing_if = "Age::is_missing")]
    pub age: Age,
    /// Gender as entered
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    pub gender: String,
    /// Package label
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    /// Package price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_price: Option<Money>,
    /// Assigned room; empty means unassigned
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    /// Opted into a two-person room
    #[serde(
        default,
        deserialize_with = "serde_helpers::loose_bool",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub is_two_sharing: bool,
    /// Tenant-specific fields
    #[serde(flatten)]
    pub extra: Fields,
}

impl Member {
    /// Member with a name and nothing else
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Package label, or [`UNKNOWN_PACKAGE`]
    #[must_use]
    pub fn package(&self) -> &str {
        self.package_name
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or(UNKNOWN_PACKAGE)
    }

    /// Assigned room, treating an empty string as unassigned
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        self.room_number.as_deref().filter(|r| !r.is_empty())
    }

    /// Price of this member's package, zero if unpriced
    #[must_use]
    pub fn price(&self) -> Money {
        self.package_price.unwrap_or_default()
    }
}

/// Identifies one traveller: registration id plus position in `members`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberKey {
    /// Owning registration
    pub registration_id: DocumentId,
    /// Index into the registration's member list
    pub index: usize,
}

impl MemberKey {
    /// Creates a key
    #[must_use]
    pub fn new(registration_id: impl Into<DocumentId>, index: usize) -> Self {
        Self {
            registration_id: registration_id.into(),
            index,
        }
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.registration_id, self.index)
    }
}

impl FromStr for MemberKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, index) = s
            .rsplit_once('#')
            .ok_or_else(|| format!("member key '{s}' has no '#'"))?;
        let index = index
            .parse()
            .map_err(|_| format!("member key '{s}' has a bad index"))?;
        if id.is_empty() {
            return Err(format!("member key '{s}' has no registration id"));
        }
        Ok(Self::new(id, index))
    }
}

// ============================================================================
// Payments
// ============================================================================

/// Known payment status values.
pub mod payment_status {
    /// Payment confirmed by an admin
    pub const VERIFIED: &str = "verified";
    /// Flat-shape status awaiting admin verification
    pub const PENDING_VERIFICATION: &str = "pending_verification";
    /// Nested-shape status awaiting admin verification
    pub const VERIFICATION_PENDING: &str = "verification_pending";
    /// Nothing received yet
    pub const PENDING: &str = "pending";
}

/// How the traveller chose to pay (nested shape only).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// One payment
    #[default]
    Full,
    /// Scheduled installments
    Installment,
}

/// Status of one installment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    /// Not yet paid
    #[default]
    Pending,
    /// Paid
    Paid,
    /// Proof uploaded, awaiting an admin
    VerificationPending,
    /// Confirmed by an admin
    Verified,
    /// Proof refused by an admin
    Rejected,
}

impl InstallmentStatus {
    /// Counts toward `amountPaid`
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Paid | Self::Verified)
    }
}

/// One scheduled installment.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installment {
    /// Label ("Advance", "Second installment", ...)
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    pub name: String,
    /// Amount due
    #[serde(default)]
    pub amount: Money,
    /// Due date
    #[serde(default, with = "serde_helpers::date", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<chrono::NaiveDate>,
    /// Status
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub status: InstallmentStatus,
    /// Collector the installment was handed to
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Installment-level UTR, if entered
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub utr_number: Option<String>,
    /// Tenant-specific fields
    #[serde(flatten)]
    pub extra: Fields,
}

/// Nested payment block used by installment-style tenants.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Full or installment
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub payment_type: PaymentType,
    /// Amount actually received
    #[serde(default)]
    pub amount_paid: Money,
    /// Amount owed
    #[serde(default)]
    pub total_amount: Money,
    /// Bank reference, or "cash ..." for cash payments
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub utr_number: Option<String>,
    /// Uploaded proof
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_proof_url: Option<String>,
    /// See [`payment_status`]
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    pub payment_status: String,
    /// Installment schedule
    #[serde(
        default,
        deserialize_with = "serde_helpers::null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub installments: Vec<Installment>,
    /// Collector a full payment was handed to
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    /// Tenant-specific fields
    #[serde(flatten)]
    pub extra: Fields,
}

/// Root-level payment fields used by single-payment tenants.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlatPayment {
    /// Amount paid, assumed to be the full amount
    pub total_amount: Money,
    /// See [`payment_status`]
    pub payment_status: String,
    /// Bank reference, or "cash ..."
    pub utr: Option<String>,
}

/// The payment representation a registration uses.
///
/// Resolved once when the document is decoded; callers never check both.
#[derive(Clone, Debug, PartialEq)]
pub enum PaymentShape {
    /// `totalAmount` / `paymentStatus` / `utr` at the root
    Flat(FlatPayment),
    /// `paymentDetails { ... }`
    Nested(PaymentDetails),
}

impl Default for PaymentShape {
    fn default() -> Self {
        Self::Flat(FlatPayment::default())
    }
}

impl PaymentShape {
    /// Amount received: nested `amountPaid`, flat `totalAmount`
    #[must_use]
    pub const fn amount_paid(&self) -> Money {
        match self {
            Self::Flat(flat) => flat.total_amount,
            Self::Nested(details) => details.amount_paid,
        }
    }

    /// Amount owed
    #[must_use]
    pub const fn total_amount(&self) -> Money {
        match self {
            Self::Flat(flat) => flat.total_amount,
            Self::Nested(details) => details.total_amount,
        }
    }

    /// Payment reference
    #[must_use]
    pub fn utr(&self) -> Option<&str> {
        match self {
            Self::Flat(flat) => flat.utr.as_deref(),
            Self::Nested(details) => details.utr_number.as_deref(),
        }
    }

    /// Payment status string
    #[must_use]
    pub fn status(&self) -> &str {
        match self {
            Self::Flat(flat) => &flat.payment_status,
            Self::Nested(details) => &details.payment_status,
        }
    }

    /// Replace the payment status
    pub fn set_status(&mut self, status: impl Into<String>) {
        match self {
            Self::Flat(flat) => flat.payment_status = status.into(),
            Self::Nested(details) => details.payment_status = status.into(),
        }
    }

    /// Paid in cash: the reference mentions "cash" in any case
    #[must_use]
    pub fn is_cash(&self) -> bool {
        self.utr()
            .is_some_and(|utr| utr.to_lowercase().contains("cash"))
    }

    /// Awaiting admin verification
    #[must_use]
    pub fn is_pending_verification(&self) -> bool {
        matches!(
            self.status(),
            payment_status::PENDING_VERIFICATION | payment_status::VERIFICATION_PENDING
        )
    }

    /// Installment schedule (empty for the flat shape)
    #[must_use]
    pub fn installments(&self) -> &[Installment] {
        match self {
            Self::Flat(_) => &[],
            Self::Nested(details) => &details.installments,
        }
    }
}

// ============================================================================
// Registrations
// ============================================================================

/// One booking: a primary contact plus the travellers it covers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegistrationDocument", into = "RegistrationDocument")]
pub struct RegistrationRecord {
    /// Document id
    pub id: DocumentId,
    /// Family grouping key; the registration id when absent
    pub family_id: Option<String>,
    /// Primary contact name
    pub name: String,
    /// Primary contact phone
    pub phone: String,
    /// Contact email
    pub email: Option<String>,
    /// `WhatsApp` number
    pub whatsapp: Option<String>,
    /// Postal address
    pub address: Option<String>,
    /// Travellers, in entry order
    pub members: Vec<Member>,
    /// Payment block
    pub payment: PaymentShape,
    /// Free-text admin remarks
    pub remarks: Option<String>,
    /// When the form was submitted
    pub submitted_at: Option<DateTime<Utc>>,
    /// Last partial cancellation or restore
    pub updated_at: Option<DateTime<Utc>>,
    /// When the record was brought back by an undo
    pub restored_at: Option<DateTime<Utc>>,
    /// Tenant-specific fields
    pub extra: Fields,
}

impl RegistrationRecord {
    /// Grouping key for family rooms
    #[must_use]
    pub fn family_key(&self) -> &str {
        self.family_id
            .as_deref()
            .filter(|f| !f.is_empty())
            .unwrap_or_else(|| self.id.as_str())
    }

    /// Append a line to the remarks, starting a new line if any exist
    pub fn append_remark(&mut self, line: &str) {
        match &mut self.remarks {
            Some(remarks) if !remarks.is_empty() => {
                remarks.push('\n');
                remarks.push_str(line);
            },
            _ => self.remarks = Some(line.to_string()),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationDocument {
    #[serde(default)]
    id: DocumentId,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    family_id: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    name: String,
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    phone: String,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    whatsapp: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    address: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_amount: Option<Money>,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    payment_status: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    utr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payment_details: Option<PaymentDetails>,
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    remarks: Option<String>,
    #[serde(default, with = "serde_helpers::timestamp", skip_serializing_if = "Option::is_none")]
    submitted_at: Option<DateTime<Utc>>,
    #[serde(default, with = "serde_helpers::timestamp", skip_serializing_if = "Option::is_none")]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "serde_helpers::timestamp", skip_serializing_if = "Option::is_none")]
    restored_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Fields,
}

impl From<RegistrationDocument> for RegistrationRecord {
    fn from(doc: RegistrationDocument) -> Self {
        let mut extra = doc.extra;
        let payment = if let Some(details) = doc.payment_details {
            // Root mirrors of a nested block are carried opaquely.
            if let Some(total) = doc.total_amount {
                extra.insert("totalAmount".into(), Value::from(total.rupees()));
            }
            if let Some(status) = doc.payment_status {
                extra.insert("paymentStatus".into(), Value::String(status));
            }
            if let Some(utr) = doc.utr {
                extra.insert("utr".into(), Value::String(utr));
            }
            PaymentShape::Nested(details)
        } else {
            PaymentShape::Flat(FlatPayment {
                total_amount: doc.total_amount.unwrap_or_default(),
                payment_status: doc.payment_status.unwrap_or_default(),
                utr: doc.utr,
            })
        };

        Self {
            id: doc.id,
            family_id: doc.family_id,
            name: doc.name,
            phone: doc.phone,
            email: doc.email,
            whatsapp: doc.whatsapp,
            address: doc.address,
            members: doc.members,
            payment,
            remarks: doc.remarks,
            submitted_at: doc.submitted_at,
            updated_at: doc.updated_at,
            restored_at: doc.restored_at,
            extra,
        }
    }
}

impl From<RegistrationRecord> for RegistrationDocument {
    fn from(record: RegistrationRecord) -> Self {
        let (total_amount, payment_status, utr, payment_details) = match record.payment {
            PaymentShape::Flat(flat) => {
                (Some(flat.total_amount), Some(flat.payment_status), flat.utr, None)
            },
            PaymentShape::Nested(details) => (None, None, None, Some(details)),
        };

        Self {
            id: record.id,
            family_id: record.family_id,
            name: record.name,
            phone: record.phone,
            email: record.email,
            whatsapp: record.whatsapp,
            address: record.address,
            members: record.members,
            total_amount,
            payment_status,
            utr,
            payment_details,
            remarks: record.remarks,
            submitted_at: record.submitted_at,
            updated_at: record.updated_at,
            restored_at: record.restored_at,
            extra: record.extra,
        }
    }
}

// ============================================================================
// Cancellations
// ============================================================================

/// Refund progress of a cancellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    /// Refund not yet started
    #[default]
    Pending,
    /// Refund initiated, not yet confirmed
    Processing,
    /// Refund paid out
    Completed,
    /// Refund refused
    Rejected,
}

/// Audit record of one cancellation event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRecord {
    /// Document id
    #[serde(default)]
    pub id: DocumentId,
    /// Registration the members were removed from
    #[serde(default)]
    pub original_registration_id: DocumentId,
    /// Primary contact name at cancellation time
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    pub name: String,
    /// Primary contact phone at cancellation time
    #[serde(default, deserialize_with = "serde_helpers::loose_string")]
    pub phone: String,
    /// Members removed by this event
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub cancelled_members: Vec<Member>,
    /// Refund owed
    #[serde(default)]
    pub refund_amount: Money,
    /// Policy percentage that produced `refund_amount`
    #[serde(
        default,
        deserialize_with = "serde_helpers::loose_percentage",
        skip_serializing_if = "Option::is_none"
    )]
    pub refund_percentage_applied: Option<u8>,
    /// Refund progress
    #[serde(default, deserialize_with = "serde_helpers::null_as_default")]
    pub refund_status: RefundStatus,
    /// Refund bank reference
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub refund_utr: Option<String>,
    /// When the cancellation happened
    #[serde(default, with = "serde_helpers::timestamp", skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Free-text remarks
    #[serde(default, deserialize_with = "serde_helpers::loose_opt_string", skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Tenant the registration belonged to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yatra_id: Option<String>,
    /// Registration as it was just before the cancellation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_data: Option<Box<RegistrationRecord>>,
    /// Fields written by other tools
    #[serde(flatten)]
    pub extra: Fields,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use yatra_core::document::{Document, encode};

    fn registration(body: Value) -> RegistrationRecord {
        let Value::Object(data) = body else { unreachable!() };
        Document::new("r1".into(), data).decode().unwrap()
    }

    #[test]
    fn money_reads_loose_numbers() {
        let m: Vec<Money> = serde_json::from_value(json!([1500, 99.9, "2000", "", null, -5])).unwrap();
        assert_eq!(m, vec![Money::new(1500), Money::new(99), Money::new(2000), Money::ZERO, Money::ZERO, Money::ZERO]);
    }

    #[test]
    fn age_keeps_its_entered_form() {
        let m: Member = serde_json::from_value(json!({ "name": "A", "age": "34", "gender": "F" })).unwrap();
        assert_eq!(m.age.years(), Some(34));
        assert_eq!(serde_json::to_value(&m).unwrap()["age"], json!("34"));

        let m: Member = serde_json::from_value(json!({ "name": "B", "age": "n/a" })).unwrap();
        assert_eq!(m.age.years(), None);

        let m: Member = serde_json::from_value(json!({ "name": "C" })).unwrap();
        assert!(serde_json::to_value(&m).unwrap().get("age").is_none());
    }

    #[test]
    fn member_defaults() {
        let m: Member = serde_json::from_value(json!({ "name": "A", "roomNumber": "" })).unwrap();
        assert_eq!(m.package(), UNKNOWN_PACKAGE);
        assert_eq!(m.room(), None);
        assert!(!m.is_two_sharing);
    }

    #[test]
    fn member_preserves_unknown_fields() {
        let m: Member = serde_json::from_value(json!({ "name": "A", "aadhaar": "1234" })).unwrap();
        assert_eq!(serde_json::to_value(&m).unwrap()["aadhaar"], json!("1234"));
    }

    #[test]
    fn member_key_round_trips_through_text() {
        let key: MemberKey = "reg_1#2".parse().unwrap();
        assert_eq!(key, MemberKey::new("reg_1", 2));
        assert_eq!(key.to_string(), "reg_1#2");
        assert!("nohash".parse::<MemberKey>().is_err());
        assert!("#3".parse::<MemberKey>().is_err());
    }

    #[test]
    fn flat_shape_is_resolved_from_root_fields() {
        let reg = registration(json!({
            "name": "Ravi", "phone": "99", "members": [],
            "totalAmount": 12000, "paymentStatus": "pending_verification", "utr": "CASH-01"
        }));
        assert!(matches!(reg.payment, PaymentShape::Flat(_)));
        assert_eq!(reg.payment.amount_paid(), Money::new(12000));
        assert!(reg.payment.is_cash());
        assert!(reg.payment.is_pending_verification());
    }

    #[test]
    fn nested_shape_wins_and_keeps_root_mirrors() {
        let reg = registration(json!({
            "name": "Ravi", "phone": "99", "members": [],
            "paymentStatus": "pending_verification",
            "paymentDetails": {
                "paymentType": "installment", "amountPaid": 5000, "totalAmount": 15000,
                "paymentStatus": "verification_pending",
                "installments": [{ "name": "Advance", "amount": 5000, "dueDate": "", "status": "paid" }]
            }
        }));
        assert_eq!(reg.payment.amount_paid(), Money::new(5000));
        assert_eq!(reg.payment.total_amount(), Money::new(15000));
        assert_eq!(reg.payment.installments()[0].due_date, None);

        let fields = encode(&reg).unwrap();
        assert_eq!(fields["paymentStatus"], json!("pending_verification"));
        assert_eq!(fields["paymentDetails"]["amountPaid"], json!(5000));
        assert!(!fields.contains_key("id"));
    }

    #[test]
    fn family_key_falls_back_to_id() {
        let mut reg = registration(json!({ "name": "Ravi", "members": [] }));
        assert_eq!(reg.family_key(), "r1");
        reg.family_id = Some("fam-9".into());
        assert_eq!(reg.family_key(), "fam-9");
    }

    #[test]
    fn append_remark_adds_lines() {
        let mut reg = RegistrationRecord::default();
        reg.append_remark("first");
        reg.append_remark("second");
        assert_eq!(reg.remarks.as_deref(), Some("first\nsecond"));
    }

    #[test]
    fn cancellation_record_reads_legacy_documents() {
        let Value::Object(data) = json!({
            "originalRegistrationId": "r1", "name": "Ravi", "phone": "99",
            "cancelledMembers": [{ "name": "Asha" }], "refundAmount": 4500,
            "refundStatus": "completed", "cancelledAt": { "seconds": 1_735_689_600, "nanoseconds": 0 }
        }) else { unreachable!() };
        let record: CancellationRecord = Document::new("c1".into(), data).decode().unwrap();
        assert_eq!(record.id.as_str(), "c1");
        assert_eq!(record.refund_status, RefundStatus::Completed);
        assert_eq!(record.refund_percentage_applied, None);
        assert!(record.original_data.is_none());
        assert!(record.cancelled_at.is_some());
    }

    #[test]
    fn cleared_fields_do_not_drop_the_registration() {
        let reg = registration(json!({
            "name": null, "phone": null, "email": null, "remarks": null,
            "members": [
                { "name": "Asha", "gender": null, "packageName": "Standard", "roomNumber": "RM-01", "isTwoSharing": null },
                { "name": null, "gender": "F", "roomNumber": null, "isTwoSharing": "true" }
            ],
            "paymentDetails": {
                "paymentType": null, "amountPaid": 3000, "totalAmount": 6000, "paymentStatus": null,
                "installments": [
                    { "name": "Advance", "amount": 3000, "status": "rejected" },
                    { "name": null, "amount": 3000, "status": null }
                ]
            }
        }));
        assert_eq!(reg.name, "");
        assert_eq!(reg.phone, "");
        assert_eq!(reg.remarks, None);
        assert_eq!(reg.members[0].gender, "");
        assert_eq!(reg.members[0].room(), Some("RM-01"));
        assert!(!reg.members[0].is_two_sharing);
        assert_eq!(reg.members[1].name, "");
        assert!(reg.members[1].is_two_sharing);

        let installments = reg.payment.installments();
        assert_eq!(installments[0].status, InstallmentStatus::Rejected);
        assert!(!installments[0].status.is_settled());
        assert_eq!(installments[1].status, InstallmentStatus::Pending);
    }

    #[test]
    fn refund_progress_reads_every_stage() {
        for (text, status) in [
            ("pending", RefundStatus::Pending),
            ("processing", RefundStatus::Processing),
            ("completed", RefundStatus::Completed),
            ("rejected", RefundStatus::Rejected),
        ] {
            let Value::Object(data) = json!({
                "name": null, "phone": 9_876_543_210_u64, "cancelledMembers": null,
                "refundAmount": 0, "refundStatus": text, "refundPercentageApplied": "50"
            }) else { unreachable!() };
            let record: CancellationRecord = Document::new("c1".into(), data).decode().unwrap();
            assert_eq!(record.refund_status, status);
            assert_eq!(record.phone, "9876543210");
            assert!(record.cancelled_members.is_empty());
            assert_eq!(record.refund_percentage_applied, Some(50));
            assert_eq!(serde_json::to_value(status).unwrap(), json!(text));
        }
    }
}
