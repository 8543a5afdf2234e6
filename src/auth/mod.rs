//! Session lifecycle and the provider seam.
//!
//! Hosts talk to an [`AuthProvider`] and observe session changes through
//! registered callbacks. Providers normalize backend-specific failures into
//! [`AuthError`] so callers can branch on code and status without knowing
//! which identity backend is behind the trait.

pub mod provider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;

pub use provider::{IdentityAuthProvider, IdentityError, IdentityService, IdentityTokens};

/// Normalized identity of a signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    /// Preferred display name; falls back to the account username.
    pub display_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Every attribute the backend reported, including custom claims.
    pub metadata: HashMap<String, String>,
}

/// An authenticated period with tokens and an expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: Option<User>,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Credentials for password-based sign-up and sign-in.
#[derive(Debug, Clone)]
pub struct AuthCredentials {
    pub email: String,
    pub password: String,
    /// Extra profile attributes to attach on sign-up.
    pub attributes: HashMap<String, String>,
}

impl AuthCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            attributes: HashMap::new(),
        }
    }
}

/// Failure shape every auth operation reports.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthError {
    pub message: String,
    /// Backend error code when one was reported.
    pub code: Option<String>,
    /// HTTP-style status; defaults to 400.
    pub status: u16,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            status: 400,
        }
    }

    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
            status: 400,
        }
    }

    pub fn not_supported(operation: &str) -> Self {
        Self::with_code(
            format!("Operation not supported by this provider: {operation}"),
            "not_supported",
        )
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} ({code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl StdError for AuthError {}

/// Callback invoked with the new session state. `None` means signed out.
pub type SessionCallback = dyn Fn(Option<&Session>) + Send + Sync;

struct ListenerSlot {
    id: u64,
    callback: Arc<SessionCallback>,
}

#[derive(Default)]
struct ListenerRegistry {
    next_id: u64,
    slots: Vec<ListenerSlot>,
}

/// Registered session-change callbacks.
///
/// Callbacks are cloned out of the lock before they run, so a callback may
/// subscribe or unsubscribe without deadlocking.
#[derive(Clone, Default)]
pub struct SessionListeners {
    registry: Arc<Mutex<ListenerRegistry>>,
}

impl SessionListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` and returns a handle that removes it.
    pub fn subscribe(&self, callback: Arc<SessionCallback>) -> Subscription {
        let mut registry = lock_registry(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.slots.push(ListenerSlot { id, callback });
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Invokes every registered callback with `session`.
    pub fn notify(&self, session: Option<&Session>) {
        let callbacks: Vec<Arc<SessionCallback>> = {
            let registry = lock_registry(&self.registry);
            registry
                .slots
                .iter()
                .map(|slot| Arc::clone(&slot.callback))
                .collect()
        };
        debug!(listeners = callbacks.len(), "Notifying session listeners");
        for callback in callbacks {
            callback(session);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_registry(&self.registry).slots.len()
    }
}

fn lock_registry(registry: &Mutex<ListenerRegistry>) -> std::sync::MutexGuard<'_, ListenerRegistry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Handle for one registered callback. Dropping it does nothing; call
/// [`Subscription::unsubscribe`] to remove the callback. Unsubscribing twice
/// is a no-op.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<ListenerRegistry>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = lock_registry(&registry);
            registry.slots.retain(|slot| slot.id != self.id);
        }
    }
}

/// The operations a session backend must support.
///
/// Operations that report failure as a value return `Result` in the outer
/// position only for transport-level breakage; an invalid password is an
/// `Err(AuthError)` from the specific operation, not a panic or a silent
/// `None`.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, credentials: &AuthCredentials) -> Result<User, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    /// Federated sign-in through an external identity provider.
    async fn sign_in_with_provider(&self, provider: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Current session, or `None` when signed out or expired. Never errors;
    /// backend failures degrade to `None`.
    async fn get_session(&self) -> Option<Session>;

    /// Forces a token refresh and returns the resulting session.
    async fn refresh_session(&self) -> Option<Session>;

    async fn get_current_user(&self) -> Option<User>;

    async fn update_user(&self, attributes: &HashMap<String, String>) -> Result<User, AuthError>;

    async fn reset_password(&self, email: &str) -> Result<(), AuthError>;

    async fn update_password(&self, new_password: &str) -> Result<(), AuthError>;

    /// Registers `callback` for session transitions.
    fn on_auth_state_change(&self, callback: Arc<SessionCallback>) -> Subscription;
}
