//! # Yatra
//!
//! Administrative engine for pilgrimage-tour ("yatra") registrations.
//!
//! - **Refund policy**: date-tiered refund percentages per tenant
//! - **Cancellation**: full or partial, with an audit record and snapshot
//! - **Undo**: merge back, restore from snapshot, or rebuild from the record
//! - **Room allotment**: standard rooms of three, automatic two-sharing pairs
//! - **Payment tracking**: collector board, installment edits, alerts
//! - **Dashboard**: revenue, traveller and age figures
//!
//! # Architecture
//!
//! ```text
//!  TenantRegistry ──resolve──▶ YatraContext { tenant, store, clock, ids, retry }
//!                                   │
//!        ┌──────────────┬───────────┼──────────────┬────────────────┐
//!        ▼              ▼           ▼              ▼                ▼
//!  Cancellation     Restore   RoomAllotment   PaymentTracker    Repository
//!   Processor      Processor     Service                      (reads, streams)
//!        │              │           │              │
//!        └── run_transaction ──┘    └─ batched updates ┘ (payments: transaction)
//! ```
//!
//! Decisions (which members go, which room, what refund) are pure functions
//! over decoded records; processors only load, decide and write.

#![forbid(unsafe_code)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod dashboard;
pub mod error;
pub mod payments;
pub mod policy;
pub mod repository;
pub mod restore;
pub mod rooms;
pub mod serde_helpers;
pub mod tenant;
pub mod types;

pub use cancellation::{
    CancellationKind, CancellationProcessor, CancellationReceipt, CancellationRequest, MemberRef,
};
pub use context::{StoreConnector, YatraContext};
pub use dashboard::DashboardStats;
pub use error::{Result, YatraError};
pub use payments::{PaymentBoard, PaymentEdit, PaymentTarget, PaymentTracker};
pub use policy::{RefundPolicy, RefundPolicyRule, RefundQuote};
pub use repository::Repository;
pub use restore::{RestoreOutcome, RestoreProcessor};
pub use rooms::{RoomAllotmentService, RoomBoard, RoomPlan};
pub use tenant::{TenantRegistry, YatraDefinition};
pub use types::{CancellationRecord, Member, MemberKey, Money, RegistrationRecord};
