//! Tenant visibility and the durable active selection.

use crate::auth::User;
use crate::core::constants::{ADMIN_ROLE, ROLE_CLAIM, SELECTED_TENANT_STORAGE_KEY, TENANT_CLAIM};
use crate::tenant::catalog::{Tenant, TenantCatalog};
use crate::tenant::storage::{read_decoded, MemoryTier, SelectionTier};
use tracing::debug;

/// Computes which tenants a user may act as and keeps the active selection
/// valid across user changes.
///
/// The selection is written to both tiers on every change and read back
/// preferring the session tier. [`TenantSelectionStore::reconcile`] must run
/// whenever the visible tenant set may have changed; it repairs selections
/// that no longer match the catalog by falling back to the first visible
/// tenant.
pub struct TenantSelectionStore {
    catalog: TenantCatalog,
    session_tier: Box<dyn SelectionTier>,
    durable_tier: Box<dyn SelectionTier>,
    selected_key: String,
}

impl TenantSelectionStore {
    pub fn new(
        catalog: TenantCatalog,
        session_tier: Box<dyn SelectionTier>,
        durable_tier: Box<dyn SelectionTier>,
    ) -> Self {
        let mut store = Self {
            catalog,
            session_tier,
            durable_tier,
            selected_key: String::new(),
        };
        if let Some(stored) = store.stored_key() {
            store.selected_key = stored;
        }
        store
    }

    /// Store backed by two in-memory tiers; useful for hosts that manage
    /// their own persistence.
    pub fn in_memory(catalog: TenantCatalog) -> Self {
        Self::new(
            catalog,
            Box::new(MemoryTier::new()),
            Box::new(MemoryTier::new()),
        )
    }

    pub fn catalog(&self) -> &TenantCatalog {
        &self.catalog
    }

    fn stored_key(&self) -> Option<String> {
        read_decoded(self.session_tier.as_ref(), SELECTED_TENANT_STORAGE_KEY).or_else(|| {
            read_decoded(self.durable_tier.as_ref(), SELECTED_TENANT_STORAGE_KEY)
        })
    }

    /// Tenants the user may act as: none when signed out, the whole catalog
    /// for administrators, otherwise the tenants matching the user's tenant
    /// claim.
    pub fn visible_tenants(&self, user: Option<&User>) -> Vec<&Tenant> {
        let Some(user) = user else {
            return Vec::new();
        };

        if user
            .metadata
            .get(ROLE_CLAIM)
            .is_some_and(|role| role == ADMIN_ROLE)
        {
            return self.catalog.tenants().iter().collect();
        }

        let Some(claim) = user.metadata.get(TENANT_CLAIM) else {
            return Vec::new();
        };
        self.catalog
            .tenants()
            .iter()
            .filter(|tenant| tenant.tenant_name == *claim)
            .collect()
    }

    pub fn selected_key(&self) -> &str {
        &self.selected_key
    }

    /// Persists `key` to both tiers and makes it the active selection.
    pub fn set_selected_key(&mut self, key: &str) {
        self.session_tier.set(SELECTED_TENANT_STORAGE_KEY, key);
        self.durable_tier.set(SELECTED_TENANT_STORAGE_KEY, key);
        self.selected_key = key.to_string();
    }

    /// Repairs the active selection against the visible set for `user`.
    ///
    /// No visible tenants is a valid empty state and leaves storage alone.
    /// Otherwise the current key (in-memory, falling back to storage) is
    /// kept when it is still visible and replaced with the first visible
    /// tenant's key when it is not, including when nothing was selected yet.
    pub fn reconcile(&mut self, user: Option<&User>) {
        let visible: Vec<String> = self
            .visible_tenants(user)
            .iter()
            .map(|tenant| tenant.key.clone())
            .collect();
        if visible.is_empty() {
            return;
        }

        let current = if self.selected_key.is_empty() {
            self.stored_key()
        } else {
            Some(self.selected_key.clone())
        };

        match current {
            Some(key) if visible.contains(&key) => {
                if key != self.selected_key {
                    self.set_selected_key(&key);
                }
            }
            Some(stale) => {
                debug!(stale = %stale, repaired = %visible[0], "Repairing invalid tenant selection");
                self.set_selected_key(&visible[0]);
            }
            None => self.set_selected_key(&visible[0]),
        }
    }

    /// The tenant whose key equals the active selection, if any.
    pub fn selected_tenant(&self) -> Option<&Tenant> {
        self.catalog.find_by_key(&self.selected_key)
    }

    /// The selected tenant's id, or empty when nothing valid is selected.
    pub fn selected_tenant_id(&self) -> String {
        self.selected_tenant()
            .map(|tenant| tenant.id.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::User;
    use crate::tenant::storage::MemoryTier;
    use std::collections::HashMap;

    fn catalog() -> TenantCatalog {
        TenantCatalog::from_json(
            r#"[{"id":"1","tenantName":"Acme"},{"id":"2","tenantName":"Globex"}]"#,
        )
    }

    fn user_with_claims(claims: &[(&str, &str)]) -> User {
        let metadata: HashMap<String, String> = claims
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        User {
            id: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            display_name: Some("User".to_string()),
            first_name: None,
            last_name: None,
            metadata,
        }
    }

    fn admin() -> User {
        user_with_claims(&[(ROLE_CLAIM, ADMIN_ROLE)])
    }

    fn member_of(tenant: &str) -> User {
        user_with_claims(&[(ROLE_CLAIM, "MEMBER"), (TENANT_CLAIM, tenant)])
    }

    #[test]
    fn no_user_sees_no_tenants() {
        let store = TenantSelectionStore::in_memory(catalog());
        assert!(store.visible_tenants(None).is_empty());
    }

    #[test]
    fn admin_sees_all_tenants() {
        let store = TenantSelectionStore::in_memory(catalog());
        let visible = store.visible_tenants(Some(&admin()));
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn member_sees_only_claimed_tenant() {
        let store = TenantSelectionStore::in_memory(catalog());
        let visible = store.visible_tenants(Some(&member_of("Globex")));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].key, "2:Globex");
    }

    #[test]
    fn user_without_tenant_claim_sees_nothing() {
        let store = TenantSelectionStore::in_memory(catalog());
        let user = user_with_claims(&[(ROLE_CLAIM, "MEMBER")]);
        assert!(store.visible_tenants(Some(&user)).is_empty());
    }

    #[test]
    fn reconcile_selects_first_visible_when_nothing_stored() {
        let mut store = TenantSelectionStore::in_memory(catalog());
        store.reconcile(Some(&admin()));
        assert_eq!(store.selected_key(), "1:Acme");
        assert_eq!(store.selected_tenant_id(), "1");
    }

    #[test]
    fn reconcile_repairs_key_outside_visible_set() {
        let mut session = MemoryTier::new();
        session.set(SELECTED_TENANT_STORAGE_KEY, "1:Acme");
        let mut store = TenantSelectionStore::new(
            catalog(),
            Box::new(session),
            Box::new(MemoryTier::new()),
        );

        store.reconcile(Some(&member_of("Globex")));
        assert_eq!(store.selected_key(), "2:Globex");
    }

    #[test]
    fn reconcile_keeps_valid_selection() {
        let mut store = TenantSelectionStore::in_memory(catalog());
        store.set_selected_key("2:Globex");
        store.reconcile(Some(&admin()));
        assert_eq!(store.selected_key(), "2:Globex");
    }

    #[test]
    fn reconcile_repairs_stale_key_for_shrunken_catalog() {
        let small = TenantCatalog::from_json(r#"[{"id":"9","tenantName":"Rump"}]"#);
        let mut session = MemoryTier::new();
        session.set(SELECTED_TENANT_STORAGE_KEY, "gone:Tenant");
        let mut store =
            TenantSelectionStore::new(small, Box::new(session), Box::new(MemoryTier::new()));

        store.reconcile(Some(&admin()));
        assert_eq!(store.selected_key(), "9:Rump");
    }

    #[test]
    fn reconcile_with_no_visible_tenants_leaves_state_alone() {
        let mut store = TenantSelectionStore::in_memory(TenantCatalog::default());
        store.reconcile(Some(&admin()));
        assert_eq!(store.selected_key(), "");
        assert!(store.selected_tenant().is_none());
        assert_eq!(store.selected_tenant_id(), "");
    }

    #[test]
    fn set_selected_key_is_idempotent() {
        let mut store = TenantSelectionStore::in_memory(catalog());
        store.set_selected_key("1:Acme");
        let first = store.selected_tenant().cloned();
        store.set_selected_key("1:Acme");
        assert_eq!(store.selected_key(), "1:Acme");
        assert_eq!(store.selected_tenant().cloned(), first);
    }

    #[test]
    fn set_selected_key_writes_both_tiers() {
        let mut store = TenantSelectionStore::in_memory(catalog());
        store.set_selected_key("2:Globex");

        assert_eq!(
            read_decoded(store.session_tier.as_ref(), SELECTED_TENANT_STORAGE_KEY).as_deref(),
            Some("2:Globex")
        );
        assert_eq!(
            read_decoded(store.durable_tier.as_ref(), SELECTED_TENANT_STORAGE_KEY).as_deref(),
            Some("2:Globex")
        );
    }

    #[test]
    fn stored_key_prefers_session_tier() {
        let mut session = MemoryTier::new();
        session.set(SELECTED_TENANT_STORAGE_KEY, "1:Acme");
        let mut durable = MemoryTier::new();
        durable.set(SELECTED_TENANT_STORAGE_KEY, "2:Globex");

        let store =
            TenantSelectionStore::new(catalog(), Box::new(session), Box::new(durable));
        assert_eq!(store.selected_key(), "1:Acme");
    }

    #[test]
    fn stored_key_falls_back_to_durable_tier() {
        let mut durable = MemoryTier::new();
        durable.set(SELECTED_TENANT_STORAGE_KEY, "2:Globex");

        let store = TenantSelectionStore::new(
            catalog(),
            Box::new(MemoryTier::new()),
            Box::new(durable),
        );
        assert_eq!(store.selected_key(), "2:Globex");
    }

    #[test]
    fn legacy_json_encoded_stored_key_is_honored() {
        let mut session = MemoryTier::new();
        session.set(SELECTED_TENANT_STORAGE_KEY, "\"2:Globex\"");

        let mut store = TenantSelectionStore::new(
            catalog(),
            Box::new(session),
            Box::new(MemoryTier::new()),
        );
        store.reconcile(Some(&admin()));
        assert_eq!(store.selected_key(), "2:Globex");
    }
}
