//! Yatra admin engine demo.
//!
//! Seeds an in-memory tenant store and walks through the admin workflows:
//! a partial cancellation and its undo, room allotment, the payment board
//! and the dashboard summary.

use anyhow::Context as _;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yatra::config::Config;
use yatra::context::StoreConnector;
use yatra::tenant::{ConnectionConfig, MASTER_OVERRIDE_ID};
use yatra::{
    CancellationProcessor, CancellationRequest, DashboardStats, MemberKey, PaymentTracker,
    RestoreProcessor, RoomAllotmentService, TenantRegistry, YatraContext, YatraDefinition,
};
use yatra_core::document::{Collection, DocumentId, Fields};
use yatra_core::document_store::DocumentStore;
use yatra_runtime::metrics::MetricsExporter;
use yatra_testing::InMemoryDocumentStore;

/// Hands every tenant the same in-memory store.
struct InMemoryConnector {
    store: Arc<InMemoryDocumentStore>,
}

impl StoreConnector for InMemoryConnector {
    fn connect(&self, _tenant: &YatraDefinition) -> yatra::Result<Arc<dyn DocumentStore>> {
        Ok(self.store.clone())
    }
}

fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn seed(store: &InMemoryDocumentStore) {
    store.seed(
        Collection::YATRA_DASHBOARDS,
        MASTER_OVERRIDE_ID,
        fields(json!({
            "policy": [
                { "date": "2099-06-30", "refund": 100 },
                { "date": "2099-09-30", "refund": 50 }
            ]
        })),
    );
    store.seed(
        Collection::YATRA_DASHBOARDS,
        "hampi",
        fields(json!({ "name": "Hampi Yatra", "config": { "projectId": "hampi", "twoSharingAmount": 1500 } })),
    );

    store.seed(
        Collection::REGISTRATIONS,
        "r-1001",
        fields(json!({
            "name": "Ravi Kumar",
            "phone": "9000000001",
            "members": [
                { "name": "Ravi Kumar", "age": 45, "gender": "M", "packageName": "Standard" },
                { "name": "Meera Kumar", "age": "41", "gender": "F", "packageName": "Standard" },
                { "name": "Anu Kumar", "age": 9, "gender": "F", "packageName": "Standard" }
            ],
            "totalAmount": 27000,
            "utr": "UTR55120098",
            "paymentStatus": "verified",
            "remarks": "Paid to Chaitanya",
            "submittedAt": "2025-03-02T09:30:00Z"
        })),
    );
    store.seed(
        Collection::REGISTRATIONS,
        "r-1002",
        fields(json!({
            "name": "Lakshmi Iyer",
            "phone": "9000000002",
            "familyId": "iyer",
            "members": [
                { "name": "Lakshmi Iyer", "age": 63, "gender": "F", "packageName": "Deluxe" },
                { "name": "Suresh Iyer", "age": 66, "gender": "M", "packageName": "Deluxe", "isTwoSharing": true },
                { "name": "Kamala Iyer", "age": 88, "gender": "F", "packageName": "Deluxe", "isTwoSharing": true }
            ],
            "paymentDetails": {
                "paymentType": "installment",
                "amountPaid": 20000,
                "totalAmount": 45000,
                "utrNumber": "cash at office",
                "paymentStatus": "verification_pending",
                "installments": [
                    { "name": "Advance", "amount": 20000, "dueDate": "2025-02-01", "status": "paid" },
                    { "name": "Balance", "amount": 25000, "dueDate": "2025-04-01", "status": "pending" }
                ]
            },
            "submittedAt": "2025-03-05T18:10:00Z"
        })),
    );
    store.seed(
        Collection::REGISTRATIONS,
        "r-1003",
        fields(json!({
            "name": "Gopal Das",
            "phone": "9000000003",
            "members": [
                { "name": "Gopal Das", "age": "28", "gender": "M", "packageName": "Standard" },
                { "name": "Hari Das", "age": "25", "gender": "M", "packageName": "Standard" },
                { "name": "Nitai Das", "age": "", "gender": "M", "packageName": "Standard" }
            ],
            "totalAmount": 27000,
            "utr": "UTR77410022",
            "paymentStatus": "pending_verification",
            "submittedAt": "2025-03-07T07:45:00Z"
        })),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.app.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut exporter = MetricsExporter::new();
    if config.metrics.enabled {
        exporter.install().context("installing metrics recorder")?;
    }

    let store = Arc::new(InMemoryDocumentStore::new());
    seed(&store);

    let master = YatraDefinition::master(&config.app.master_name, ConnectionConfig::default());
    let registry = TenantRegistry::load(master, store.as_ref()).await?;
    info!(tenants = registry.tenants().len(), "Tenant registry loaded");

    let connector = InMemoryConnector {
        store: Arc::clone(&store),
    };
    let ctx = YatraContext::connect(&registry, &config.app.default_tenant, &connector)?
        .with_retry(config.transactions.retry_policy());

    // Partial cancellation, then undo.
    let registration_id = DocumentId::new("r-1001");
    let registration = ctx
        .repository()
        .registration(&registration_id)
        .await?
        .context("seeded registration is missing")?;
    let cancellations = CancellationProcessor::new(&ctx);
    let quote = cancellations.quote(&registration, 1);
    let request = CancellationRequest::by_names(&registration, ["Meera Kumar"], quote)?
        .with_remarks("Medical emergency");
    let receipt = cancellations.cancel(&request).await?;
    println!(
        "Cancelled {:?} from {} ({} remaining), refund {} at {}%",
        receipt.cancelled,
        receipt.registration_id,
        receipt.remaining,
        receipt.refund.amount,
        receipt.refund.percentage
    );

    let outcome = RestoreProcessor::new(&ctx).undo(&receipt.cancellation_id).await?;
    println!("Undo of {}: {}", receipt.cancellation_id, outcome.path());

    // Room allotment.
    let rooms = RoomAllotmentService::new(&ctx);
    let selection: Vec<MemberKey> = (0..3).map(|i| MemberKey::new("r-1003", i)).collect();
    let plan = rooms.assign_standard(&selection, None).await?;
    for room in &plan.rooms {
        println!("{} ({}): {} travellers", room.room_number, room.package, room.occupants.len());
    }
    let pairs = rooms.auto_assign_two_sharing().await?;
    for room in &pairs.rooms {
        println!("{} ({}): {} travellers", room.room_number, room.package, room.occupants.len());
    }

    // Payments.
    let tracker = PaymentTracker::new(&ctx, config.app.collectors.clone());
    let board = tracker.board().await?;
    for item in board.alerts(ctx.today()) {
        println!(
            "Payment alert: {} {} [{}] collector={}",
            item.label,
            item.amount,
            item.status,
            item.collector.as_deref().unwrap_or("unassigned")
        );
    }
    tracker.verify_payment(&DocumentId::new("r-1003")).await?;

    // Dashboard.
    let registrations = ctx.repository().registrations().await?;
    println!("{}", DashboardStats::from_registrations(&registrations));

    if config.metrics.dump_on_exit {
        if let Some(rendered) = exporter.render() {
            println!("{rendered}");
        }
    }

    Ok(())
}
