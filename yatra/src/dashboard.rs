//! Dashboard figures aggregated over a tenant's registrations.

use crate::types::{Money, RegistrationRecord, payment_status};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Families of this many travellers or more share one bucket.
pub const LARGEST_FAMILY_BUCKET: usize = 6;

/// Age range of a traveller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum AgeBucket {
    /// 0 to 5
    #[serde(rename = "0-5")]
    Toddler,
    /// 6 to 12
    #[serde(rename = "6-12")]
    Child,
    /// 13 to 18
    #[serde(rename = "13-18")]
    Teen,
    /// 19 to 30
    #[serde(rename = "19-30")]
    YoungAdult,
    /// 31 to 50
    #[serde(rename = "31-50")]
    Adult,
    /// 51 to 60
    #[serde(rename = "51-60")]
    Senior,
    /// 61 to 70
    #[serde(rename = "61-70")]
    Elder,
    /// 71 and over
    #[serde(rename = "71+")]
    Eldest,
}

impl AgeBucket {
    /// Every bucket, youngest first
    pub const ALL: [Self; 8] = [
        Self::Toddler,
        Self::Child,
        Self::Teen,
        Self::YoungAdult,
        Self::Adult,
        Self::Senior,
        Self::Elder,
        Self::Eldest,
    ];

    /// Bucket of an age in whole years
    #[must_use]
    pub const fn of(years: u64) -> Self {
        match years {
            0..=5 => Self::Toddler,
            6..=12 => Self::Child,
            13..=18 => Self::Teen,
            19..=30 => Self::YoungAdult,
            31..=50 => Self::Adult,
            51..=60 => Self::Senior,
            61..=70 => Self::Elder,
            _ => Self::Eldest,
        }
    }

    /// Range label ("19-30")
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Toddler => "0-5",
            Self::Child => "6-12",
            Self::Teen => "13-18",
            Self::YoungAdult => "19-30",
            Self::Adult => "31-50",
            Self::Senior => "51-60",
            Self::Elder => "61-70",
            Self::Eldest => "71+",
        }
    }
}

/// Summary figures for the dashboard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Money received
    pub total_revenue: Money,
    /// Received by bank transfer
    pub online_revenue: Money,
    /// Received in cash
    pub cash_revenue: Money,
    /// Travellers across all registrations
    pub total_travellers: usize,
    /// Registrations
    pub total_records: usize,
    /// Registrations awaiting payment verification
    pub pending_records: usize,
    /// Registrations of exactly one traveller
    pub single_travellers: usize,
    /// Registrations of more than one traveller
    pub family_groups: usize,
    /// Registrations per traveller count, capped at [`LARGEST_FAMILY_BUCKET`]
    pub family_sizes: BTreeMap<usize, usize>,
    /// Travellers per age range; non-numeric ages are not counted
    pub age_groups: BTreeMap<AgeBucket, usize>,
}

/// Payment reference, preferring the root `utr` a nested document may carry.
fn reference(registration: &RegistrationRecord) -> Option<&str> {
    registration
        .extra
        .get("utr")
        .and_then(Value::as_str)
        .or_else(|| registration.payment.utr())
}

fn is_pending(registration: &RegistrationRecord) -> bool {
    registration.payment.is_pending_verification()
        || registration.extra.get("paymentStatus").and_then(Value::as_str)
            == Some(payment_status::PENDING_VERIFICATION)
}

impl DashboardStats {
    /// Aggregate `registrations`.
    ///
    /// Revenue is `amountPaid` for nested payments and `totalAmount` for
    /// flat ones. A payment is cash when its reference mentions "cash".
    #[must_use]
    pub fn from_registrations(registrations: &[RegistrationRecord]) -> Self {
        let mut stats = Self {
            total_records: registrations.len(),
            age_groups: AgeBucket::ALL.iter().map(|b| (*b, 0)).collect(),
            ..Self::default()
        };

        for registration in registrations {
            let revenue = registration.payment.amount_paid();
            stats.total_revenue = stats.total_revenue + revenue;
            let is_cash = reference(registration).is_some_and(|utr| utr.to_lowercase().contains("cash"));
            if is_cash {
                stats.cash_revenue = stats.cash_revenue + revenue;
            } else {
                stats.online_revenue = stats.online_revenue + revenue;
            }

            if is_pending(registration) {
                stats.pending_records += 1;
            }

            let count = registration.members.len();
            stats.total_travellers += count;
            match count {
                0 => {},
                1 => stats.single_travellers += 1,
                _ => stats.family_groups += 1,
            }
            *stats
                .family_sizes
                .entry(count.min(LARGEST_FAMILY_BUCKET))
                .or_default() += 1;

            for years in registration.members.iter().filter_map(|m| m.age.years()) {
                *stats.age_groups.entry(AgeBucket::of(years)).or_default() += 1;
            }
        }

        stats
    }
}

impl fmt::Display for DashboardStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Revenue {} (online {}, cash {})",
            self.total_revenue, self.online_revenue, self.cash_revenue
        )?;
        writeln!(
            f,
            "{} travellers in {} registrations, {} pending verification",
            self.total_travellers, self.total_records, self.pending_records
        )?;
        writeln!(
            f,
            "{} single travellers, {} family groups",
            self.single_travellers, self.family_groups
        )?;
        let sizes: Vec<String> = self
            .family_sizes
            .iter()
            .map(|(size, n)| {
                if *size >= LARGEST_FAMILY_BUCKET {
                    format!("{size}+: {n}")
                } else {
                    format!("{size}: {n}")
                }
            })
            .collect();
        writeln!(f, "Family sizes: {}", sizes.join(", "))?;
        let ages: Vec<String> = self
            .age_groups
            .iter()
            .map(|(bucket, n)| format!("{}: {n}", bucket.label()))
            .collect();
        write!(f, "Ages: {}", ages.join(", "))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use yatra_core::document::Document;

    fn registration(id: &str, body: Value) -> RegistrationRecord {
        let Value::Object(data) = body else { unreachable!() };
        Document::new(id.into(), data).decode().unwrap()
    }

    fn travellers(ages: &[Value]) -> Value {
        Value::Array(
            ages.iter()
                .enumerate()
                .map(|(i, age)| json!({ "name": format!("T{i}"), "age": age }))
                .collect(),
        )
    }

    #[test]
    fn aggregates_both_payment_shapes() {
        let stats = DashboardStats::from_registrations(&[
            registration(
                "flat",
                json!({
                    "members": travellers(&[json!(34)]),
                    "totalAmount": 9000,
                    "utr": "CASH-paid",
                    "paymentStatus": "pending_verification"
                }),
            ),
            registration(
                "nested",
                json!({
                    "members": travellers(&[json!("4"), json!(40), json!("71"), json!(""), json!("n/a"), json!(12), json!(13)]),
                    "paymentDetails": {
                        "paymentType": "installment",
                        "amountPaid": 10000,
                        "totalAmount": 30000,
                        "paymentStatus": "verification_pending"
                    }
                }),
            ),
            registration("empty", json!({ "members": [] })),
        ]);

        assert_eq!(stats.total_revenue, Money::new(19_000));
        assert_eq!(stats.cash_revenue, Money::new(9000));
        assert_eq!(stats.online_revenue, Money::new(10_000));
        assert_eq!(stats.total_records, 3);
        assert_eq!(stats.pending_records, 2);
        assert_eq!(stats.total_travellers, 8);
        assert_eq!(stats.single_travellers, 1);
        assert_eq!(stats.family_groups, 1);
        assert_eq!(stats.family_sizes, BTreeMap::from([(0, 1), (1, 1), (6, 1)]));

        let ages: Vec<usize> = AgeBucket::ALL.iter().map(|b| stats.age_groups[b]).collect();
        assert_eq!(ages, vec![1, 1, 1, 0, 2, 0, 0, 1]);
    }

    #[test]
    fn root_utr_of_nested_document_counts_as_cash() {
        let stats = DashboardStats::from_registrations(&[registration(
            "r1",
            json!({
                "utr": "cash at desk",
                "paymentDetails": { "amountPaid": 5000, "utrNumber": "UTR1" }
            }),
        )]);
        assert_eq!(stats.cash_revenue, Money::new(5000));
    }

    #[test]
    fn age_bucket_edges() {
        assert_eq!(AgeBucket::of(5), AgeBucket::Toddler);
        assert_eq!(AgeBucket::of(6), AgeBucket::Child);
        assert_eq!(AgeBucket::of(70), AgeBucket::Elder);
        assert_eq!(AgeBucket::of(71), AgeBucket::Eldest);
        assert_eq!(serde_json::to_value(AgeBucket::Eldest).unwrap(), json!("71+"));
    }

    #[test]
    fn summary_mentions_totals() {
        let text = DashboardStats::default().to_string();
        assert!(text.starts_with("Revenue ₹0"));
    }
}
