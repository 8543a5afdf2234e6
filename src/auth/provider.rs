//! [`AuthProvider`] implementation over a user-pool identity backend.

use crate::auth::{
    AuthCredentials, AuthError, AuthProvider, Session, SessionCallback, SessionListeners,
    Subscription, User,
};
use crate::core::config::{Config, ConfigError, IdentityConfig};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Token bundle returned by the identity backend.
#[derive(Debug, Clone)]
pub struct IdentityTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Backend failure before normalization into [`AuthError`].
#[derive(Debug, Clone)]
pub struct IdentityError {
    pub message: String,
    pub code: Option<String>,
}

impl From<IdentityError> for AuthError {
    fn from(err: IdentityError) -> Self {
        AuthError {
            message: err.message,
            code: err.code,
            status: 400,
        }
    }
}

/// Raw attribute map for the signed-in account.
#[derive(Debug, Clone, Default)]
pub struct UserAttributes {
    pub username: String,
    pub attributes: HashMap<String, String>,
}

/// The slice of a user-pool API the provider needs.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: &HashMap<String, String>,
    ) -> Result<UserAttributes, IdentityError>;

    async fn authenticate(&self, email: &str, password: &str)
        -> Result<IdentityTokens, IdentityError>;

    /// Valid tokens for the current account, refreshing if necessary.
    /// `Ok(None)` means signed out.
    async fn current_tokens(&self) -> Result<Option<IdentityTokens>, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;

    async fn user_attributes(&self) -> Result<Option<UserAttributes>, IdentityError>;
}

/// Session manager backed by an [`IdentityService`].
pub struct IdentityAuthProvider<S: IdentityService> {
    service: S,
    listeners: SessionListeners,
}

impl<S: IdentityService> IdentityAuthProvider<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            listeners: SessionListeners::new(),
        }
    }

    /// Builds a provider after checking that the identity pool and client
    /// are configured. Missing identity configuration is fatal.
    pub fn from_config<F>(config: &Config, build: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(IdentityConfig) -> S,
    {
        let identity = config.require_identity()?;
        Ok(Self::new(build(identity)))
    }

    fn user_from_attributes(raw: &UserAttributes) -> User {
        let get = |key: &str| raw.attributes.get(key).cloned();
        let display_name = get("name")
            .filter(|name| !name.is_empty())
            .or_else(|| Some(raw.username.clone()).filter(|name| !name.is_empty()));
        User {
            id: raw.username.clone(),
            email: get("email"),
            display_name,
            first_name: get("given_name"),
            last_name: get("family_name"),
            metadata: raw.attributes.clone(),
        }
    }

    async fn build_session(&self, tokens: IdentityTokens) -> Session {
        let user = match self.service.user_attributes().await {
            Ok(Some(raw)) => Some(Self::user_from_attributes(&raw)),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err.message, "Failed to load user attributes");
                None
            }
        };
        Session {
            user,
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires_at: tokens.expires_at,
        }
    }
}

#[async_trait]
impl<S: IdentityService> AuthProvider for IdentityAuthProvider<S> {
    async fn sign_up(&self, credentials: &AuthCredentials) -> Result<User, AuthError> {
        let raw = self
            .service
            .sign_up(&credentials.email, &credentials.password, &credentials.attributes)
            .await?;
        Ok(Self::user_from_attributes(&raw))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let tokens = self.service.authenticate(email, password).await?;
        let session = self.build_session(tokens).await;
        self.listeners.notify(Some(&session));
        Ok(session)
    }

    async fn sign_in_with_provider(&self, provider: &str) -> Result<Session, AuthError> {
        debug!(provider, "Federated sign-in requested");
        Err(AuthError::not_supported("sign_in_with_provider"))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.service.sign_out().await?;
        self.listeners.notify(None);
        Ok(())
    }

    async fn get_session(&self) -> Option<Session> {
        let tokens = match self.service.current_tokens().await {
            Ok(tokens) => tokens?,
            Err(err) => {
                debug!(error = %err.message, "No current session");
                return None;
            }
        };
        Some(self.build_session(tokens).await)
    }

    async fn refresh_session(&self) -> Option<Session> {
        // Fetching current tokens already refreshes expired ones.
        self.get_session().await
    }

    async fn get_current_user(&self) -> Option<User> {
        match self.service.user_attributes().await {
            Ok(Some(raw)) => Some(Self::user_from_attributes(&raw)),
            Ok(None) => None,
            Err(err) => {
                debug!(error = %err.message, "No current user");
                None
            }
        }
    }

    async fn update_user(&self, _attributes: &HashMap<String, String>) -> Result<User, AuthError> {
        Err(AuthError::not_supported("update_user"))
    }

    async fn reset_password(&self, _email: &str) -> Result<(), AuthError> {
        Err(AuthError::not_supported("reset_password"))
    }

    async fn update_password(&self, _new_password: &str) -> Result<(), AuthError> {
        Err(AuthError::not_supported("update_password"))
    }

    fn on_auth_state_change(&self, callback: Arc<SessionCallback>) -> Subscription {
        self.listeners.subscribe(callback)
    }
}
