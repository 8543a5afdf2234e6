/// Storage key under which both tiers persist the active tenant selection.
pub const SELECTED_TENANT_STORAGE_KEY: &str = "oap-selected-tenant-key";

/// Header carrying the active tenant's display name on discovery calls.
pub const TENANT_HEADER: &str = "x-tenant";

/// Role claim value that grants visibility into every catalog tenant.
pub const ADMIN_ROLE: &str = "ADMIN";

/// User metadata claim carrying the role marker.
pub const ROLE_CLAIM: &str = "custom:hub_role";

/// User metadata claim carrying the tenant a non-admin user belongs to.
pub const TENANT_CLAIM: &str = "custom:tenant_id";

/// Path suffix appended to the base API URL to reach the discovery endpoint.
pub const DISCOVERY_PATH_SUFFIX: &str = "oap_mcp";

/// Environment variables supplying the tenant list; first non-empty wins.
pub const TENANTS_ENV_KEYS: [&str; 2] = ["OAP_TENANTS_JSON", "OAP_TENANTS"];

/// Environment variable supplying the base API URL.
pub const BASE_API_URL_ENV: &str = "OAP_BASE_API_URL";

/// Environment variables supplying the identity-provider configuration.
pub const IDENTITY_POOL_ID_ENV: &str = "OAP_IDENTITY_POOL_ID";
pub const IDENTITY_CLIENT_ID_ENV: &str = "OAP_IDENTITY_CLIENT_ID";
