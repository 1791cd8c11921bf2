//! Date-tiered refund policy.
//!
//! A policy is a list of `(date, percentage)` rules. On a given day the
//! applicable percentage is the one of the earliest rule whose date has not
//! passed yet; after the last rule date no refund is due.

use crate::error::{Result, YatraError};
use crate::serde_helpers::{parse_date, parse_percentage};
use crate::types::{Money, RegistrationRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One tier: cancellations on or before `date` get `refund` percent back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicyRule {
    /// Last day (inclusive) this tier applies
    pub date: NaiveDate,
    /// Refund percentage, 0 to 100
    pub refund: u8,
}

impl RefundPolicyRule {
    /// Creates a rule
    #[must_use]
    pub const fn new(date: NaiveDate, refund: u8) -> Self {
        Self { date, refund }
    }
}

/// Stored rule list read row by row.
///
/// Rows without a parseable date or with a percentage outside `0..=100` are
/// dropped with a warning instead of failing the whole document. Anything
/// other than an array reads as no rules.
///
/// # Errors
///
/// Only fails if the input is not valid JSON.
pub fn lenient_rules<'de, D>(deserializer: D) -> std::result::Result<Vec<RefundPolicyRule>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(Value::Array(rows)) = Option::<Value>::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let rule = row_to_rule(row);
            if rule.is_none() {
                tracing::warn!(index, row = %row, "Dropping unreadable refund rule");
            }
            rule
        })
        .collect())
}

fn row_to_rule(row: &Value) -> Option<RefundPolicyRule> {
    let date = row.get("date")?.as_str().and_then(parse_date)?;
    let refund = parse_percentage(row.get("refund")?)?;
    Some(RefundPolicyRule::new(date, refund))
}

/// Validated policy with rules kept in ascending date order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RefundPolicy {
    rules: Vec<RefundPolicyRule>,
}

impl RefundPolicy {
    /// Sort and validate a rule set.
    ///
    /// # Errors
    ///
    /// Returns [`YatraError::Validation`] if a percentage exceeds 100 or two
    /// rules share a date.
    pub fn new(mut rules: Vec<RefundPolicyRule>) -> Result<Self> {
        if let Some(rule) = rules.iter().find(|r| r.refund > 100) {
            return Err(YatraError::validation(format!(
                "refund percentage {} on {} exceeds 100",
                rule.refund, rule.date
            )));
        }
        rules.sort_by_key(|r| r.date);
        if let Some(pair) = rules.windows(2).find(|w| w[0].date == w[1].date) {
            return Err(YatraError::validation(format!(
                "more than one refund rule for {}",
                pair[0].date
            )));
        }
        Ok(Self { rules })
    }

    /// Rules in ascending date order
    #[must_use]
    pub fn rules(&self) -> &[RefundPolicyRule] {
        &self.rules
    }

    /// Percentage applicable on `as_of`
    #[must_use]
    pub fn percentage_on(&self, as_of: NaiveDate) -> u8 {
        applicable_percentage(&self.rules, as_of)
    }
}

/// Percentage applicable on `as_of` for an arbitrary, unsorted rule list.
///
/// Rules are sorted by date on every call, so the stored order never
/// matters. No rules, or only past rules, yield 0.
#[must_use]
pub fn applicable_percentage(rules: &[RefundPolicyRule], as_of: NaiveDate) -> u8 {
    let mut sorted = rules.to_vec();
    sorted.sort_by_key(|r| r.date);
    sorted
        .iter()
        .find(|r| r.date >= as_of)
        .map_or(0, |r| r.refund.min(100))
}

/// Refund for cancelling `cancelling` of `total_members` travellers.
///
/// `floor(amount_paid / total_members * cancelling * percentage / 100)`,
/// evaluated in integers so that no rounding happens before the floor. A
/// member count of 0 counts as 1.
#[must_use]
pub fn refund_amount(
    amount_paid: Money,
    total_members: usize,
    cancelling: usize,
    percentage: u8,
) -> Money {
    let members = u128::try_from(total_members.max(1)).unwrap_or(u128::MAX);
    let cancelling = u128::try_from(cancelling).unwrap_or(u128::MAX);
    let numerator = u128::from(amount_paid.rupees())
        .saturating_mul(cancelling)
        .saturating_mul(u128::from(percentage.min(100)));
    let amount = numerator / members.saturating_mul(100);
    Money::new(u64::try_from(amount).unwrap_or(u64::MAX))
}

/// Refund owed for a prospective cancellation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundQuote {
    /// Percentage applied
    pub percentage: u8,
    /// Amount owed
    pub amount: Money,
}

impl RefundQuote {
    /// Quote cancelling `cancelling` members of `registration` on `as_of`
    #[must_use]
    pub fn for_registration(
        registration: &RegistrationRecord,
        cancelling: usize,
        rules: &[RefundPolicyRule],
        as_of: NaiveDate,
    ) -> Self {
        let percentage = applicable_percentage(rules, as_of);
        Self {
            percentage,
            amount: refund_amount(
                registration.payment.amount_paid(),
                registration.members.len(),
                cancelling,
                percentage,
            ),
        }
    }
}
