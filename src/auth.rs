//! Authenticated principal and session token access
//!
//! The call path never reaches into process-global auth state; an
//! [`AuthSession`] is constructed at application start and handed to the
//! [`CallController`](crate::call::CallController) explicitly.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Who is making calls: a user signed in through the external auth provider,
/// or a locally-synthesized user (self-hosted / development deployments).
///
/// The variants are an explicit discriminant; call sites dispatch with an
/// exhaustive `match` rather than probing for capabilities at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum AuthPrincipal {
    /// User authenticated by the external auth provider
    External(ExternalUser),
    /// Locally-synthesized user
    Local(LocalUser),
}

/// User record from the external auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalUser {
    /// Provider subject identifier
    pub subject: String,
    /// Display name
    pub display_name: String,
    /// Bearer token for the backend API
    pub access_token: String,
    /// Granted permission names
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// Locally-synthesized user (no external provider involved)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalUser {
    /// Local username
    pub username: String,
    /// Bearer token, if the local deployment issues one
    pub access_token: Option<String>,
}

impl AuthPrincipal {
    /// Bearer token for backend requests, if one is available
    pub fn access_token(&self) -> Option<&str> {
        match self {
            AuthPrincipal::External(user) => Some(user.access_token.as_str()),
            AuthPrincipal::Local(user) => user.access_token.as_deref(),
        }
    }

    /// Human-readable name for logging
    pub fn display_name(&self) -> &str {
        match self {
            AuthPrincipal::External(user) => &user.display_name,
            AuthPrincipal::Local(user) => &user.username,
        }
    }
}

/// Session-scoped holder for the current principal.
///
/// Replaceable at runtime (token refresh, sign-out) without tearing down the
/// objects that borrowed the session.
#[derive(Debug)]
pub struct AuthSession {
    principal: RwLock<Option<AuthPrincipal>>,
}

impl AuthSession {
    /// Create a session for the given principal
    pub fn new(principal: AuthPrincipal) -> Self {
        Self {
            principal: RwLock::new(Some(principal)),
        }
    }

    /// Create a session with nobody signed in
    pub fn anonymous() -> Self {
        Self {
            principal: RwLock::new(None),
        }
    }

    /// Replace the current principal (token refresh, sign-in)
    pub fn set_principal(&self, principal: AuthPrincipal) {
        *self.principal.write().expect("auth lock poisoned") = Some(principal);
    }

    /// Clear the principal (sign-out)
    pub fn clear(&self) {
        *self.principal.write().expect("auth lock poisoned") = None;
    }

    /// Current bearer token, if a signed-in principal has one
    pub fn access_token(&self) -> Option<String> {
        self.principal
            .read()
            .expect("auth lock poisoned")
            .as_ref()
            .and_then(|p| p.access_token().map(str::to_string))
    }
}
