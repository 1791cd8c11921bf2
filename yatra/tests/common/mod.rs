//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use yatra::policy::RefundPolicyRule;
use yatra::tenant::YatraDefinition;
use yatra::{RegistrationRecord, YatraContext};
use yatra_core::document::{Collection, Document, Fields};
use yatra_runtime::RetryPolicy;
use yatra_testing::{FixedClock, InMemoryDocumentStore, SequentialIdGenerator};

/// Date every fixture context believes is today.
pub const TODAY: &str = "2025-07-15";

pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn date(text: &str) -> NaiveDate {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").expect("fixture date")
}

/// 100% until June 30th, 50% until September 30th, nothing after.
pub fn standard_policy() -> Vec<RefundPolicyRule> {
    vec![
        RefundPolicyRule::new(date("2025-06-30"), 100),
        RefundPolicyRule::new(date("2025-09-30"), 50),
    ]
}

pub fn quick_retry(max_retries: usize) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(2))
        .build()
}

pub fn context(store: &Arc<InMemoryDocumentStore>) -> YatraContext {
    let tenant = YatraDefinition {
        id: "hampi".into(),
        name: "Hampi Yatra".into(),
        policy: standard_policy(),
        ..YatraDefinition::default()
    };
    YatraContext::new(tenant, store.clone())
        .with_clock(Arc::new(FixedClock::on_date(TODAY)))
        .with_ids(Arc::new(SequentialIdGenerator::new("cxl")))
        .with_retry(quick_retry(3))
}

pub fn traveller(name: &str, package: &str) -> Value {
    json!({ "name": name, "age": 30, "gender": "F", "packageName": package })
}

/// Flat-payment registration whose members are `names`.
pub fn seed_family(store: &InMemoryDocumentStore, id: &str, names: &[&str], paid: u64) {
    let members: Vec<Value> = names.iter().map(|n| traveller(n, "Standard")).collect();
    store.seed(
        Collection::REGISTRATIONS,
        id,
        fields(json!({
            "name": names.first().copied().unwrap_or("Nobody"),
            "phone": "9000000000",
            "address": "12 Temple Road",
            "members": members,
            "totalAmount": paid,
            "paymentStatus": "verified",
            "utr": "UTR1234",
            "submittedAt": "2025-03-01T10:00:00Z"
        })),
    );
}

pub fn registration(store: &InMemoryDocumentStore, id: &str) -> Option<RegistrationRecord> {
    store
        .peek(Collection::REGISTRATIONS, &id.into())
        .map(|data| Document::new(id.into(), data).decode().expect("registration decodes"))
}

pub fn member_names(record: &RegistrationRecord) -> Vec<String> {
    let mut names: Vec<String> = record.members.iter().map(|m| m.name.clone()).collect();
    names.sort();
    names
}
