//! Tenant ("yatra") definitions and the registry built from the master database.
//!
//! Every yatra is an isolated tenant with its own document store. Their
//! definitions live in the master database's `yatra_dashboards` collection,
//! except for the master yatra itself, which is built in and can only be
//! adjusted through the special `master_puri_override` document.

use crate::error::{Result, YatraError};
use crate::policy::{RefundPolicy, RefundPolicyRule};
use crate::repository::{fields_of, value_of};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use yatra_core::document::{Collection, Document, DocumentId, Fields};
use yatra_core::document_store::DocumentStore;

/// Id of the built-in master tenant.
pub const MASTER_TENANT_ID: &str = "master_puri";

/// Document that overrides fields of the built-in master definition.
pub const MASTER_OVERRIDE_ID: &str = "master_puri_override";

/// Connection parameters of a tenant's document store.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// API key
    #[serde(default)]
    pub api_key: String,
    /// Auth domain
    #[serde(default)]
    pub auth_domain: String,
    /// Project id; also the store's identity
    #[serde(default)]
    pub project_id: String,
    /// File storage bucket
    #[serde(default)]
    pub storage_bucket: String,
    /// Messaging sender id
    #[serde(default)]
    pub messaging_sender_id: String,
    /// App id
    #[serde(default)]
    pub app_id: String,
    /// Tenant settings stored alongside (`twoSharingAmount`, ...)
    #[serde(flatten)]
    pub extra: Fields,
}

impl ConnectionConfig {
    /// Surcharge for a two-sharing room, if configured
    #[must_use]
    pub fn two_sharing_amount(&self) -> Option<u64> {
        self.extra.get("twoSharingAmount").and_then(Value::as_u64)
    }
}

/// One tenant as listed in the master database.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YatraDefinition {
    /// Tenant id (document id, or [`MASTER_TENANT_ID`])
    #[serde(default)]
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Store connection parameters
    #[serde(default, rename = "config")]
    pub connection: ConnectionConfig,
    /// Dashboard background
    #[serde(default, rename = "bgImage", skip_serializing_if = "Option::is_none")]
    pub background_image: Option<String>,
    /// Built-in master tenant
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_master: bool,
    /// Column layout for the registrations grid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_config: Option<Value>,
    /// Refund policy rules, as stored; unreadable rows are dropped
    #[serde(default, deserialize_with = "crate::policy::lenient_rules")]
    pub policy: Vec<RefundPolicyRule>,
    /// Other stored fields (`createdAt`, ...)
    #[serde(flatten)]
    pub extra: Fields,
}

impl YatraDefinition {
    /// Built-in master definition
    #[must_use]
    pub fn master(name: impl Into<String>, connection: ConnectionConfig) -> Self {
        Self {
            id: MASTER_TENANT_ID.to_string(),
            name: name.into(),
            connection,
            is_master: true,
            ..Self::default()
        }
    }
}

/// Settings an admin may edit on an existing tenant.
#[derive(Clone, Debug, PartialEq)]
pub struct YatraSettings {
    /// Display name
    pub name: String,
    /// Dashboard background
    pub background_image: Option<String>,
    /// Two-sharing surcharge; `None` removes it
    pub two_sharing_amount: Option<u64>,
    /// Validated policy
    pub policy: RefundPolicy,
}

/// Ordered list of tenants, master first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TenantRegistry {
    tenants: Vec<YatraDefinition>,
}

impl TenantRegistry {
    /// Build the registry from a `yatra_dashboards` snapshot.
    ///
    /// The override document is shallow-merged over `master`. Documents that
    /// cannot be read as a definition are skipped with a warning.
    #[must_use]
    pub fn from_snapshot(master: YatraDefinition, documents: &[Document]) -> Self {
        let mut resolved_master = master;
        let mut tenants = Vec::with_capacity(documents.len() + 1);

        for doc in documents {
            if doc.id.as_str() == MASTER_OVERRIDE_ID {
                match merge_override(&resolved_master, &doc.data) {
                    Ok(merged) => resolved_master = merged,
                    Err(err) => tracing::warn!(error = %err, "Ignoring unreadable master override"),
                }
                continue;
            }
            match doc.decode::<YatraDefinition>() {
                Ok(mut tenant) => {
                    tenant.is_master = false;
                    tenants.push(tenant);
                },
                Err(err) => {
                    tracing::warn!(tenant_id = %doc.id, error = %err, "Skipping unreadable tenant definition");
                },
            }
        }

        tenants.insert(0, resolved_master);
        Self { tenants }
    }

    /// Load the registry from the master store
    ///
    /// # Errors
    ///
    /// Returns the store error if the collection cannot be listed.
    pub async fn load(master: YatraDefinition, store: &dyn DocumentStore) -> Result<Self> {
        let documents = store.list(Collection::YATRA_DASHBOARDS).await?;
        Ok(Self::from_snapshot(master, &documents))
    }

    /// All tenants, master first
    #[must_use]
    pub fn tenants(&self) -> &[YatraDefinition] {
        &self.tenants
    }

    /// Master definition (with any override applied)
    #[must_use]
    pub fn master(&self) -> Option<&YatraDefinition> {
        self.tenants.first()
    }

    /// Look a tenant up by id
    ///
    /// # Errors
    ///
    /// Returns [`YatraError::Validation`] for an unknown id.
    pub fn resolve(&self, id: &str) -> Result<&YatraDefinition> {
        self.tenants
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| YatraError::validation(format!("unknown yatra '{id}'")))
    }
}

fn merge_override(master: &YatraDefinition, overrides: &Fields) -> Result<YatraDefinition> {
    let mut merged = fields_of(master)?;
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    merged.insert("id".into(), Value::String(master.id.clone()));
    let mut definition: YatraDefinition =
        serde_json::from_value(Value::Object(merged)).map_err(|err| {
            YatraError::decode(Collection::YATRA_DASHBOARDS, &MASTER_OVERRIDE_ID.into(), &err)
        })?;
    definition.is_master = true;
    Ok(definition)
}

/// Register a new tenant in the master store; returns its id.
///
/// # Errors
///
/// Returns a validation error for a blank name, or the store error.
pub async fn add_tenant(
    store: &dyn DocumentStore,
    definition: &YatraDefinition,
    created_at: chrono::DateTime<chrono::Utc>,
) -> Result<DocumentId> {
    if definition.name.trim().is_empty() {
        return Err(YatraError::validation("yatra name must not be blank"));
    }
    let mut fields = fields_of(definition)?;
    fields.remove("isMaster");
    fields.insert("createdAt".into(), Value::String(created_at.to_rfc3339()));
    let id = store.create(Collection::YATRA_DASHBOARDS, fields).await?;
    tracing::info!(tenant_id = %id, name = %definition.name, "Yatra registered");
    Ok(id)
}

/// Save edited settings of `tenant` to the master store.
///
/// Edits to the master tenant go to the override document.
///
/// # Errors
///
/// Returns a validation error for a blank name, [`YatraError::NotFound`] if
/// a non-master tenant document is gone, or the store error.
pub async fn update_settings(
    store: &dyn DocumentStore,
    tenant: &YatraDefinition,
    settings: &YatraSettings,
) -> Result<()> {
    if settings.name.trim().is_empty() {
        return Err(YatraError::validation("yatra name must not be blank"));
    }

    let mut connection = tenant.connection.clone();
    match settings.two_sharing_amount {
        Some(amount) => {
            connection
                .extra
                .insert("twoSharingAmount".into(), Value::from(amount));
        },
        None => {
            connection.extra.remove("twoSharingAmount");
        },
    }

    let mut fields = Fields::new();
    fields.insert("name".into(), Value::String(settings.name.clone()));
    fields.insert(
        "bgImage".into(),
        settings
            .background_image
            .clone()
            .map_or(Value::Null, Value::String),
    );
    fields.insert("config".into(), Value::Object(fields_of(&connection)?));
    fields.insert("policy".into(), value_of(&settings.policy)?);

    if tenant.is_master {
        let id = DocumentId::new(MASTER_OVERRIDE_ID);
        let mut current = store
            .get(Collection::YATRA_DASHBOARDS, &id)
            .await?
            .map(|doc| doc.data)
            .unwrap_or_default();
        current.extend(fields);
        store.set(Collection::YATRA_DASHBOARDS, &id, current).await?;
    } else {
        store
            .update(Collection::YATRA_DASHBOARDS, &DocumentId::new(&tenant.id), fields)
            .await?;
    }

    tracing::info!(tenant_id = %tenant.id, rules = settings.policy.rules().len(), "Yatra settings saved");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, body: Value) -> Document {
        let Value::Object(data) = body else { unreachable!() };
        Document::new(id.into(), data)
    }

    fn master() -> YatraDefinition {
        YatraDefinition::master(
            "Puri Yatra",
            ConnectionConfig {
                project_id: "puri".into(),
                ..ConnectionConfig::default()
            },
        )
    }

    #[test]
    fn master_comes_first() {
        let registry = TenantRegistry::from_snapshot(
            master(),
            &[doc("hampi", json!({ "name": "Hampi", "config": { "projectId": "hampi" } }))],
        );
        let ids: Vec<_> = registry.tenants().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![MASTER_TENANT_ID, "hampi"]);
        assert!(registry.master().unwrap().is_master);
        assert!(!registry.resolve("hampi").unwrap().is_master);
    }

    #[test]
    fn override_merges_over_master() {
        let registry = TenantRegistry::from_snapshot(
            master(),
            &[doc(
                MASTER_OVERRIDE_ID,
                json!({ "name": "Puri 2026", "policy": [{ "date": "2026-06-01", "refund": 80 }] }),
            )],
        );
        assert_eq!(registry.tenants().len(), 1);
        let m = registry.master().unwrap();
        assert_eq!(m.name, "Puri 2026");
        assert_eq!(m.id, MASTER_TENANT_ID);
        assert_eq!(m.connection.project_id, "puri");
        assert_eq!(m.policy.len(), 1);
    }

    #[test]
    fn unknown_tenant_is_a_validation_error() {
        let registry = TenantRegistry::from_snapshot(master(), &[]);
        assert!(matches!(registry.resolve("nope"), Err(YatraError::Validation(_))));
    }

    #[test]
    fn two_sharing_amount_reads_from_connection_extras() {
        let registry = TenantRegistry::from_snapshot(
            master(),
            &[doc("hampi", json!({ "name": "Hampi", "config": { "twoSharingAmount": 1500 } }))],
        );
        let hampi = registry.resolve("hampi").unwrap();
        assert_eq!(hampi.connection.two_sharing_amount(), Some(1500));
    }

    #[test]
    fn blank_policy_row_keeps_the_tenant() {
        let registry = TenantRegistry::from_snapshot(
            master(),
            &[doc(
                "hampi",
                json!({
                    "name": "Hampi",
                    "config": { "projectId": "hampi" },
                    "policy": [{ "date": "2025-09-01", "refund": 50 }, { "date": "", "refund": 0 }]
                }),
            )],
        );
        assert_eq!(registry.tenants().len(), 2);
        let hampi = registry.resolve("hampi").unwrap();
        let cutoff = chrono::NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(hampi.policy, vec![RefundPolicyRule::new(cutoff, 50)]);
    }
}
