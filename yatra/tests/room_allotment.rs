//! Room allotment against the in-memory document store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

mod common;

use common::{context, fields, registration, traveller};
use serde_json::{Value, json};
use std::sync::Arc;
use yatra::rooms::RoomAllotmentService;
use yatra::{MemberKey, YatraError};
use yatra_core::document::{Collection, DocumentId};
use yatra_core::document_store::StoreError;
use yatra_testing::InMemoryDocumentStore;

fn seed_members(store: &InMemoryDocumentStore, id: &str, family: &str, members: Vec<Value>) {
    store.seed(
        Collection::REGISTRATIONS,
        id,
        fields(json!({ "name": id, "familyId": family, "members": members })),
    );
}

fn two_sharing(name: &str, package: &str) -> Value {
    json!({ "name": name, "packageName": package, "isTwoSharing": true })
}

fn seated(name: &str, package: &str, room: &str) -> Value {
    json!({ "name": name, "packageName": package, "roomNumber": room })
}

fn rooms_of(store: &InMemoryDocumentStore, id: &str) -> Vec<Option<String>> {
    registration(store, id)
        .unwrap()
        .members
        .iter()
        .map(|m| m.room().map(str::to_string))
        .collect()
}

fn keys(id: &str, n: usize) -> Vec<MemberKey> {
    (0..n).map(|i| MemberKey::new(id, i)).collect()
}

#[tokio::test]
async fn six_travellers_of_one_package_fill_two_rooms() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(&store, "r0", "r0", vec![seated("Old", "Deluxe", "RM-07")]);
    seed_members(
        &store,
        "r1",
        "r1",
        (0..6).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect(),
    );
    let ctx = context(&store);

    let plan = RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 6), None)
        .await
        .unwrap();

    assert_eq!(plan.rooms.len(), 2);
    let expected: Vec<Option<String>> = ["RM-08", "RM-08", "RM-08", "RM-09", "RM-09", "RM-09"]
        .iter()
        .map(|r| Some((*r).to_string()))
        .collect();
    assert_eq!(rooms_of(&store, "r1"), expected);
    assert_eq!(rooms_of(&store, "r0"), vec![Some("RM-07".to_string())]);
}

#[tokio::test]
async fn mixed_packages_change_nothing() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let mut members: Vec<Value> = (0..3).map(|i| traveller(&format!("D{i}"), "Deluxe")).collect();
    members.extend((0..3).map(|i| traveller(&format!("S{i}"), "Standard")));
    seed_members(&store, "r1", "r1", members);
    let before = store.peek(Collection::REGISTRATIONS, &"r1".into());
    let ctx = context(&store);

    let err = RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 6), None)
        .await
        .unwrap_err();

    assert!(matches!(err, YatraError::Validation(_)));
    assert_eq!(store.peek(Collection::REGISTRATIONS, &"r1".into()), before);
}

#[tokio::test]
async fn selection_not_a_multiple_of_three_changes_nothing() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(&store, "r1", "r1", (0..4).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect());
    let ctx = context(&store);

    let err = RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 4), None)
        .await
        .unwrap_err();

    assert!(matches!(err, YatraError::Validation(_)));
    assert_eq!(rooms_of(&store, "r1"), vec![None; 4]);
}

#[tokio::test]
async fn occupied_room_of_other_package_is_a_conflict() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(&store, "r0", "r0", vec![seated("Old", "Standard", "Lotus")]);
    seed_members(&store, "r1", "r1", (0..3).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect());
    let ctx = context(&store);

    let err = RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 3), Some("Lotus"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        YatraError::Conflict {
            room: "Lotus".into(),
            existing_package: "Standard".into(),
            incoming_package: "Deluxe".into(),
        }
    );
    assert_eq!(rooms_of(&store, "r1"), vec![None; 3]);
}

#[tokio::test]
async fn base_name_numbers_consecutive_rooms() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(&store, "r1", "r1", (0..6).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect());
    let ctx = context(&store);

    RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 6), Some("A-07"))
        .await
        .unwrap();

    let rooms = rooms_of(&store, "r1");
    assert_eq!(rooms[0].as_deref(), Some("A-07"));
    assert_eq!(rooms[5].as_deref(), Some("A-08"));
}

#[tokio::test]
async fn two_sharing_keeps_families_apart() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(
        &store,
        "r1",
        "iyer",
        vec![two_sharing("A", "Deluxe"), two_sharing("B", "Deluxe"), two_sharing("C", "Deluxe")],
    );
    seed_members(&store, "r2", "rao", vec![two_sharing("D", "Deluxe"), traveller("E", "Deluxe")]);
    seed_members(&store, "r3", "sen", vec![seated("F", "Deluxe", "2SH-03")]);
    let ctx = context(&store);

    let plan = RoomAllotmentService::new(&ctx).auto_assign_two_sharing().await.unwrap();

    assert_eq!(plan.rooms.len(), 3);
    assert_eq!(
        rooms_of(&store, "r1"),
        vec![Some("2SH-04".to_string()), Some("2SH-04".to_string()), Some("2SH-05".to_string())]
    );
    assert_eq!(rooms_of(&store, "r2"), vec![Some("2SH-06".to_string()), None]);

    let again = RoomAllotmentService::new(&ctx).auto_assign_two_sharing().await.unwrap();
    assert!(again.is_empty());
}

#[tokio::test]
async fn failed_update_reports_incomplete_batch() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(&store, "r1", "r1", vec![traveller("A", "Deluxe"), traveller("B", "Deluxe")]);
    seed_members(&store, "r2", "r2", vec![traveller("C", "Deluxe")]);
    let outage = StoreError::Unavailable("replica offline".into());
    store.fail_updates_for(Collection::REGISTRATIONS, &"r2".into(), outage.clone());
    let ctx = context(&store);

    let selection = vec![MemberKey::new("r1", 0), MemberKey::new("r1", 1), MemberKey::new("r2", 0)];
    let err = RoomAllotmentService::new(&ctx)
        .assign_standard(&selection, None)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        YatraError::BatchIncomplete {
            applied: vec![DocumentId::new("r1")],
            failed: vec![(DocumentId::new("r2"), outage)],
        }
    );
    assert_eq!(rooms_of(&store, "r1"), vec![Some("RM-01".to_string()), Some("RM-01".to_string())]);
    assert_eq!(rooms_of(&store, "r2"), vec![None]);
}

#[tokio::test]
async fn removal_clears_only_that_traveller() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(
        &store,
        "r1",
        "r1",
        vec![seated("A", "Deluxe", "RM-01"), seated("B", "Deluxe", "RM-01")],
    );
    let ctx = context(&store);
    let service = RoomAllotmentService::new(&ctx);

    service.remove_from_room(&MemberKey::new("r1", 0)).await.unwrap();
    assert_eq!(rooms_of(&store, "r1"), vec![None, Some("RM-01".to_string())]);

    let err = service.remove_from_room(&MemberKey::new("r1", 0)).await.unwrap_err();
    assert!(matches!(err, YatraError::Validation(_)));
}

#[tokio::test]
async fn board_reflects_committed_rooms() {
    let store = Arc::new(InMemoryDocumentStore::new());
    seed_members(&store, "r1", "r1", (0..3).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect());
    let ctx = context(&store);
    let service = RoomAllotmentService::new(&ctx);

    assert_eq!(service.board().await.unwrap().unassigned_standard().len(), 1);
    service.assign_standard(&keys("r1", 3), None).await.unwrap();

    let board = service.board().await.unwrap();
    assert!(board.unassigned_standard().is_empty());
    assert_eq!(board.room("RM-01").unwrap().members.len(), 3);
}

#[tokio::test]
async fn rooms_held_by_sparse_registrations_are_not_reused() {
    let store = Arc::new(InMemoryDocumentStore::new());
    store.seed(
        Collection::REGISTRATIONS,
        "r0",
        fields(json!({
            "name": null,
            "phone": null,
            "members": [{
                "name": "Old", "gender": null, "packageName": "Standard",
                "roomNumber": "RM-01", "isTwoSharing": null
            }],
            "paymentDetails": {
                "paymentType": "installment", "amountPaid": 0, "totalAmount": 9000,
                "installments": [{ "name": "Advance", "amount": 3000, "status": "rejected" }]
            }
        })),
    );
    seed_members(&store, "r1", "r1", (0..3).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect());
    let ctx = context(&store);

    RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 3), None)
        .await
        .unwrap();

    assert_eq!(rooms_of(&store, "r1"), vec![Some("RM-02".to_string()); 3]);
    assert_eq!(rooms_of(&store, "r0"), vec![Some("RM-01".to_string())]);
}

#[tokio::test]
async fn unreadable_registration_blocks_allotment() {
    let store = Arc::new(InMemoryDocumentStore::new());
    store.seed(
        Collection::REGISTRATIONS,
        "r0",
        fields(json!({ "name": "Broken", "members": "not a list" })),
    );
    seed_members(&store, "r1", "r1", (0..3).map(|i| traveller(&format!("T{i}"), "Deluxe")).collect());
    let ctx = context(&store);

    let err = RoomAllotmentService::new(&ctx)
        .assign_standard(&keys("r1", 3), None)
        .await
        .unwrap_err();

    assert!(matches!(err, YatraError::Decode { .. }));
    assert_eq!(rooms_of(&store, "r1"), vec![None; 3]);
    assert_eq!(ctx.repository().registrations().await.unwrap().len(), 1);
}
