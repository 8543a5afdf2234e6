//! Keeps the capability snapshot in sync with the session and tenant.
//!
//! Refreshes overlap whenever the token or tenant changes mid-flight, so
//! every refresh runs under a freshly minted epoch and a result is only
//! applied while its epoch is still the newest one. A stale result is
//! dropped on the floor; the refresh that obsoleted it owns the snapshot.

use crate::discovery::epoch::{Epoch, EpochCounter};
use crate::discovery::wire::ToolDescriptor;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Where capability listings come from. Implemented by
/// [`DiscoveryClient`](crate::discovery::DiscoveryClient).
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(
        &self,
        access_token: &str,
        tenant_name: Option<String>,
    ) -> Result<Vec<ToolDescriptor>, String>;
}

/// Point-in-time view of the capability catalog.
#[derive(Debug, Clone, Default)]
pub struct DiscoverySnapshot {
    pub tools: Vec<ToolDescriptor>,
    pub loading: bool,
}

#[derive(Default)]
struct CoordinatorState {
    tools: Vec<ToolDescriptor>,
    loading: bool,
    last_token: Option<String>,
    last_tenant_key: String,
}

pub struct DiscoveryCoordinator<S: CatalogSource> {
    source: S,
    epochs: EpochCounter,
    state: Arc<Mutex<CoordinatorState>>,
}

impl<S: CatalogSource> DiscoveryCoordinator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            epochs: EpochCounter::new(),
            state: Arc::new(Mutex::new(CoordinatorState::default())),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> DiscoverySnapshot {
        let state = self.lock_state();
        DiscoverySnapshot {
            tools: state.tools.clone(),
            loading: state.loading,
        }
    }

    /// Reconciles the snapshot with the current session and tenant.
    ///
    /// `tenant_key` identifies the selection for change detection;
    /// `tenant_name` is what gets sent on the wire. Unchanged inputs are a
    /// no-op so hosts may call this on every state transition.
    pub async fn update(
        &self,
        access_token: Option<&str>,
        tenant_key: &str,
        tenant_name: Option<&str>,
    ) {
        let epoch = {
            let mut state = self.lock_state();
            if state.last_token.as_deref() == access_token && state.last_tenant_key == tenant_key {
                debug!("Discovery inputs unchanged; skipping refresh");
                return;
            }
            state.last_token = access_token.map(str::to_string);
            state.last_tenant_key = tenant_key.to_string();
            self.begin_refresh(&mut state)
        };
        self.run_refresh(epoch, access_token, tenant_name).await;
    }

    /// Unconditionally rebuilds the snapshot for the given session scope.
    pub async fn refresh(&self, access_token: Option<&str>, tenant_name: Option<&str>) {
        let epoch = {
            let mut state = self.lock_state();
            self.begin_refresh(&mut state)
        };
        self.run_refresh(epoch, access_token, tenant_name).await;
    }

    /// Mints the epoch and enters the loading state in one critical
    /// section. Minting outside the lock would let an older epoch clear
    /// tools a newer refresh already applied.
    fn begin_refresh(&self, state: &mut CoordinatorState) -> Epoch {
        let epoch = self.epochs.mint();
        state.tools.clear();
        state.loading = true;
        epoch
    }

    async fn run_refresh(
        &self,
        epoch: Epoch,
        access_token: Option<&str>,
        tenant_name: Option<&str>,
    ) {
        let token = access_token.unwrap_or("").trim();
        if token.is_empty() {
            let mut state = self.lock_state();
            if epoch.is_current() {
                state.loading = false;
            }
            return;
        }

        let result = self.source.fetch(token, tenant_name.map(str::to_string)).await;

        let mut state = self.lock_state();
        if !epoch.is_current() {
            debug!(epoch = epoch.value(), "Discarding stale discovery result");
            return;
        }
        match result {
            Ok(tools) => {
                debug!(count = tools.len(), "Capability catalog refreshed");
                state.tools = tools;
            }
            Err(err) => {
                warn!(error = %err, "Capability refresh failed");
                state.tools.clear();
            }
        }
        state.loading = false;
    }
}
