//! Loading and normalization of the static tenant list.
//!
//! Records come from the configuration file or, failing that, a JSON array
//! in one of two environment variables. The raw shape is controlled by an
//! external export and is parsed permissively: entries missing an id or a
//! tenant name are dropped, everything else defaults to empty.

use crate::core::config::Config;
use crate::core::constants::TENANTS_ENV_KEYS;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// One deployment target of a tenant's chat product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudchatInstance {
    pub instance: String,
    #[serde(rename = "accountId")]
    pub account_id: i64,
    #[serde(rename = "accountName")]
    pub account_name: String,
}

/// An organizational scope a user may act within. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// `"{id}:{tenant_name}"`; unique within one catalog load.
    pub key: String,
    pub id: String,
    #[serde(rename = "tenantName")]
    pub tenant_name: String,
    #[serde(rename = "cloudchatInstances")]
    pub cloudchat_instances: Vec<CloudchatInstance>,
    #[serde(rename = "connectorProjectIds")]
    pub connector_project_ids: Vec<String>,
    #[serde(rename = "claudiaProjectIds")]
    pub claudia_project_ids: Vec<String>,
    #[serde(rename = "eddieInstance")]
    pub eddie_instance: String,
}

/// Raw tenant record as exported upstream. Field types are deliberately
/// loose; [`RawTenantRecord::normalize`] decides what survives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTenantRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Legacy identifier: either a plain string or `{"$oid": "..."}`.
    #[serde(rename = "_id", default, deserialize_with = "lenient_legacy_id")]
    pub legacy_id: Option<String>,
    #[serde(rename = "tenantName", default, deserialize_with = "lenient_string")]
    pub tenant_name: Option<String>,
    #[serde(rename = "cloudchatInstances", default)]
    pub cloudchat_instances: Option<Vec<CloudchatInstance>>,
    #[serde(rename = "connectorProjectIds", default)]
    pub connector_project_ids: Option<Vec<String>>,
    #[serde(rename = "claudiaProjectIds", default)]
    pub claudia_project_ids: Option<Vec<String>>,
    #[serde(rename = "eddieInstance", default, deserialize_with = "lenient_string")]
    pub eddie_instance: Option<String>,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

fn lenient_legacy_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(id) => Some(id),
        Value::Object(map) => map
            .get("$oid")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    })
}

impl RawTenantRecord {
    fn resolved_id(&self) -> String {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or_else(|| self.legacy_id.as_deref().filter(|id| !id.is_empty()))
            .unwrap_or_default()
            .to_string()
    }

    /// Produces a [`Tenant`] when the record carries both an id and a name.
    pub fn normalize(&self) -> Option<Tenant> {
        let id = self.resolved_id();
        let tenant_name = self.tenant_name.clone().unwrap_or_default();
        if id.is_empty() || tenant_name.is_empty() {
            return None;
        }

        Some(Tenant {
            key: format!("{id}:{tenant_name}"),
            id,
            tenant_name,
            cloudchat_instances: self.cloudchat_instances.clone().unwrap_or_default(),
            connector_project_ids: self.connector_project_ids.clone().unwrap_or_default(),
            claudia_project_ids: self.claudia_project_ids.clone().unwrap_or_default(),
            eddie_instance: self.eddie_instance.clone().unwrap_or_default(),
        })
    }
}

/// Ordered, read-only collection of known tenants.
#[derive(Debug, Clone, Default)]
pub struct TenantCatalog {
    tenants: Vec<Tenant>,
}

impl TenantCatalog {
    /// Loads tenants from the first non-empty source: the configuration
    /// file's static list, then the tenant environment variables.
    pub fn load(config: &Config) -> Self {
        let from_config = Self::from_records(&config.tenants);
        if !from_config.is_empty() {
            return from_config;
        }
        Self::from_env()
    }

    pub fn from_records(records: &[RawTenantRecord]) -> Self {
        let tenants = records
            .iter()
            .filter_map(RawTenantRecord::normalize)
            .collect();
        Self { tenants }
    }

    fn from_env() -> Self {
        for key in TENANTS_ENV_KEYS {
            if let Ok(raw) = std::env::var(key) {
                if !raw.is_empty() {
                    return Self::from_json(&raw);
                }
            }
        }
        Self::default()
    }

    /// Parses a JSON array of raw records. Malformed JSON degrades to an
    /// empty catalog; individual unreadable entries are dropped.
    pub fn from_json(raw: &str) -> Self {
        let values = match serde_json::from_str::<Vec<Value>>(raw) {
            Ok(values) => values,
            Err(err) => {
                warn!(error = %err, "Failed to parse tenant list from environment");
                return Self::default();
            }
        };

        let tenants = values
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<RawTenantRecord>(value) {
                Ok(record) => record.normalize(),
                Err(err) => {
                    debug!(error = %err, "Dropping unreadable tenant record");
                    None
                }
            })
            .collect();
        Self { tenants }
    }

    pub fn tenants(&self) -> &[Tenant] {
        &self.tenants
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn find_by_key(&self, key: &str) -> Option<&Tenant> {
        self.tenants.iter().find(|tenant| tenant.key == key)
    }
}

/// Keys of every tenant in load order; handy for membership checks.
pub fn catalog_keys(catalog: &TenantCatalog) -> Vec<String> {
    catalog
        .tenants()
        .iter()
        .map(|tenant| tenant.key.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_plain_id_and_derives_key() {
        let catalog = TenantCatalog::from_json(r#"[{"id":"1","tenantName":"Acme"}]"#);
        assert_eq!(catalog.len(), 1);
        let tenant = &catalog.tenants()[0];
        assert_eq!(tenant.key, "1:Acme");
        assert_eq!(tenant.id, "1");
        assert_eq!(tenant.tenant_name, "Acme");
        assert!(tenant.cloudchat_instances.is_empty());
        assert!(tenant.connector_project_ids.is_empty());
        assert_eq!(tenant.eddie_instance, "");
    }

    #[test]
    fn accepts_legacy_string_id() {
        let catalog = TenantCatalog::from_json(r#"[{"_id":"abc","tenantName":"Globex"}]"#);
        assert_eq!(catalog.tenants()[0].key, "abc:Globex");
    }

    #[test]
    fn accepts_legacy_oid_id() {
        let catalog =
            TenantCatalog::from_json(r#"[{"_id":{"$oid":"5f1"},"tenantName":"Globex"}]"#);
        assert_eq!(catalog.tenants()[0].key, "5f1:Globex");
    }

    #[test]
    fn plain_id_wins_over_legacy_id() {
        let catalog =
            TenantCatalog::from_json(r#"[{"id":"new","_id":"old","tenantName":"Acme"}]"#);
        assert_eq!(catalog.tenants()[0].id, "new");
    }

    #[test]
    fn drops_records_missing_id_or_name() {
        let catalog = TenantCatalog::from_json(
            r#"[
                {"tenantName":"NoId"},
                {"id":"2"},
                {"id":"3","tenantName":"Kept"}
            ]"#,
        );
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.tenants()[0].key, "3:Kept");
    }

    #[test]
    fn non_string_id_falls_back_to_legacy_id() {
        let catalog =
            TenantCatalog::from_json(r#"[{"id":5,"_id":"x","tenantName":"Acme"}]"#);
        assert_eq!(catalog.tenants()[0].id, "x");
    }

    #[test]
    fn malformed_json_degrades_to_empty() {
        let catalog = TenantCatalog::from_json("not json at all");
        assert!(catalog.is_empty());
    }

    #[test]
    fn non_array_json_degrades_to_empty() {
        let catalog = TenantCatalog::from_json(r#"{"id":"1","tenantName":"Acme"}"#);
        assert!(catalog.is_empty());
    }

    #[test]
    fn preserves_load_order() {
        let catalog = TenantCatalog::from_json(
            r#"[{"id":"2","tenantName":"B"},{"id":"1","tenantName":"A"}]"#,
        );
        let keys = catalog_keys(&catalog);
        assert_eq!(keys, vec!["2:B".to_string(), "1:A".to_string()]);
    }

    #[test]
    fn find_by_key_matches_exactly() {
        let catalog = TenantCatalog::from_json(r#"[{"id":"1","tenantName":"Acme"}]"#);
        assert!(catalog.find_by_key("1:Acme").is_some());
        assert!(catalog.find_by_key("1:acme").is_none());
    }

    #[test]
    fn retains_cloudchat_instances() {
        let catalog = TenantCatalog::from_json(
            r#"[{
                "id":"1",
                "tenantName":"Acme",
                "cloudchatInstances":[{"instance":"us-1","accountId":42,"accountName":"Acme Prod"}],
                "connectorProjectIds":["p1"],
                "eddieInstance":"eddie-1"
            }]"#,
        );
        let tenant = &catalog.tenants()[0];
        assert_eq!(tenant.cloudchat_instances.len(), 1);
        assert_eq!(tenant.cloudchat_instances[0].account_id, 42);
        assert_eq!(tenant.connector_project_ids, vec!["p1".to_string()]);
        assert_eq!(tenant.eddie_instance, "eddie-1");
    }
}
