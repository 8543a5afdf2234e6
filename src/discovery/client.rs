//! Discovery client: session establishment, paginated capability listing,
//! and invocation.

use crate::core::config::{Config, ConfigError};
use crate::core::constants::DISCOVERY_PATH_SUFFIX;
use crate::discovery::coordinator::CatalogSource;
use crate::discovery::transport::{RpcSession, PROTOCOL_VERSION};
use crate::discovery::wire::{ToolDescriptor, ToolPage};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const HTTP_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

/// Hard ceiling on how many capabilities one listing accumulates.
const DISCOVERY_MAX_TOOLS: usize = 500;

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECONDS))
        .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECONDS))
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECONDS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Derives the discovery endpoint from the base API URL, tolerating any
/// number of trailing slashes.
pub fn discovery_endpoint(base_api_url: &str) -> String {
    let trimmed = base_api_url.trim_end_matches('/');
    format!("{trimmed}/{DISCOVERY_PATH_SUFFIX}")
}

/// Result of [`DiscoveryClient::connect`]. An unauthenticated handle is a
/// valid degraded state: listings come back empty and invocation fails
/// cleanly, with no network traffic either way.
pub struct ConnectionHandle {
    rpc: Option<RpcSession>,
}

impl ConnectionHandle {
    pub fn is_authenticated(&self) -> bool {
        self.rpc.is_some()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.rpc.as_ref().and_then(RpcSession::session_id)
    }
}

/// Client for the capability discovery endpoint.
pub struct DiscoveryClient {
    http: reqwest::Client,
    endpoint: String,
    client_name: String,
    client_version: String,
}

impl DiscoveryClient {
    pub fn new(
        endpoint: impl Into<String>,
        client_name: impl Into<String>,
        client_version: impl Into<String>,
    ) -> Self {
        Self {
            http: build_http_client(),
            endpoint: endpoint.into(),
            client_name: client_name.into(),
            client_version: client_version.into(),
        }
    }

    /// Builds a client from configuration. A missing base API URL is fatal.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let base = config.require_base_api_url()?;
        Ok(Self::new(
            discovery_endpoint(&base),
            config.client_name(),
            config.client_version(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Establishes a session for `access_token`, scoped to `tenant_name`
    /// when one is active.
    ///
    /// A blank token short-circuits to an unauthenticated handle without
    /// touching the network.
    pub async fn connect(
        &self,
        access_token: &str,
        tenant_name: Option<String>,
    ) -> Result<ConnectionHandle, String> {
        if access_token.trim().is_empty() {
            debug!("No access token; returning unauthenticated handle");
            return Ok(ConnectionHandle { rpc: None });
        }

        let mut rpc = RpcSession::new(
            self.http.clone(),
            self.endpoint.clone(),
            access_token,
            tenant_name,
        );

        let result = rpc
            .send_request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": self.client_name,
                        "version": self.client_version,
                    },
                }),
            )
            .await?;

        let negotiated = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .map(str::to_string);
        rpc.set_protocol_version(negotiated);
        rpc.send_notification("notifications/initialized").await?;

        info!(endpoint = %self.endpoint, "Discovery session established");
        Ok(ConnectionHandle { rpc: Some(rpc) })
    }

    /// Fetches one page of the listing. Unauthenticated handles yield an
    /// empty final page.
    pub async fn list_capabilities(
        &self,
        handle: &mut ConnectionHandle,
        cursor: Option<String>,
    ) -> Result<ToolPage, String> {
        let Some(rpc) = handle.rpc.as_mut() else {
            return Ok(ToolPage::default());
        };

        let params = match cursor {
            Some(cursor) => json!({ "cursor": cursor }),
            None => json!({}),
        };
        let result = rpc.send_request("tools/list", params).await?;
        serde_json::from_value::<ToolPage>(result).map_err(|err| err.to_string())
    }

    /// Walks the listing to completion, stopping at the page limit.
    pub async fn list_all_capabilities(
        &self,
        handle: &mut ConnectionHandle,
    ) -> Result<Vec<ToolDescriptor>, String> {
        let mut tools: Vec<ToolDescriptor> = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.list_capabilities(handle, cursor).await?;
            tools.extend(page.tools);
            if tools.len() >= DISCOVERY_MAX_TOOLS {
                tools.truncate(DISCOVERY_MAX_TOOLS);
                debug!(limit = DISCOVERY_MAX_TOOLS, "Capability listing truncated");
                break;
            }
            match page.next_cursor.filter(|cursor| !cursor.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(tools)
    }

    /// Invokes a capability by name. Requires an authenticated handle.
    pub async fn invoke(
        &self,
        handle: &mut ConnectionHandle,
        name: &str,
        arguments: Value,
    ) -> Result<Value, String> {
        let Some(rpc) = handle.rpc.as_mut() else {
            return Err("Authentication required to invoke capabilities.".to_string());
        };
        rpc.send_request("tools/call", json!({ "name": name, "arguments": arguments }))
            .await
    }
}

#[async_trait]
impl CatalogSource for DiscoveryClient {
    async fn fetch(
        &self,
        access_token: &str,
        tenant_name: Option<String>,
    ) -> Result<Vec<ToolDescriptor>, String> {
        let mut handle = self.connect(access_token, tenant_name).await?;
        self.list_all_capabilities(&mut handle).await
    }
}
