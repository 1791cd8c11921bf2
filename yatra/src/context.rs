//! Per-tenant application context.
//!
//! Built once at the composition root and passed explicitly to every
//! processor. Tests build it from in-memory doubles.

use crate::error::Result;
use crate::repository::Repository;
use crate::tenant::{TenantRegistry, YatraDefinition};
use chrono::NaiveDate;
use std::sync::Arc;
use yatra_core::document_store::DocumentStore;
use yatra_core::environment::{Clock, IdGenerator, SystemClock, UuidGenerator};
use yatra_runtime::RetryPolicy;

/// Opens the document store of a tenant.
pub trait StoreConnector: Send + Sync {
    /// Connect to `tenant`'s store
    ///
    /// # Errors
    ///
    /// Connector-specific failures.
    fn connect(&self, tenant: &YatraDefinition) -> Result<Arc<dyn DocumentStore>>;
}

/// Everything a processor needs for one tenant.
#[derive(Clone)]
pub struct YatraContext {
    /// Selected tenant
    pub tenant: YatraDefinition,
    /// The tenant's store
    pub store: Arc<dyn DocumentStore>,
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Source of new document ids
    pub ids: Arc<dyn IdGenerator>,
    /// Retry policy for transactions
    pub retry: RetryPolicy,
}

impl YatraContext {
    /// Context with the system clock, UUID ids and the default retry policy
    #[must_use]
    pub fn new(tenant: YatraDefinition, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            tenant,
            store,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidGenerator),
            retry: RetryPolicy::default(),
        }
    }

    /// Resolve `tenant_id` in `registry` and connect to its store
    ///
    /// # Errors
    ///
    /// Unknown tenant id or connector failure.
    pub fn connect(
        registry: &TenantRegistry,
        tenant_id: &str,
        connector: &dyn StoreConnector,
    ) -> Result<Self> {
        let tenant = registry.resolve(tenant_id)?.clone();
        let store = connector.connect(&tenant)?;
        tracing::info!(tenant_id = %tenant.id, name = %tenant.name, "Connected to yatra store");
        Ok(Self::new(tenant, store))
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the id generator
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Today's date according to the context clock
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Typed reads over the tenant store
    #[must_use]
    pub fn repository(&self) -> Repository {
        Repository::new(Arc::clone(&self.store))
    }
}
