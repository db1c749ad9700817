//! Identity provider interface used by the auth gate and the user handlers.
//!
//! The provider is the only store of record: user profiles, credentials and the
//! `role` custom claim all live there. Every call is attempted once; retries
//! and error translation are the caller's business.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::services::access::Role;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Error reported by the identity provider.
///
/// `code` is namespaced the way the provider's admin SDKs report it
/// (`auth/user-not-found`, `app/network-error`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} - {message}")]
pub struct ProviderError {
    pub code: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn user_not_found() -> Self {
        Self::new(
            "auth/user-not-found",
            "There is no user record corresponding to the provided identifier.",
        )
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new("app/network-error", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("auth/internal-error", message)
    }

    pub fn invalid_id_token(message: impl Into<String>) -> Self {
        Self::new("auth/argument-error", message)
    }
}

/// Claims carried by a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdToken {
    pub uid: String,
    pub email: Option<String>,
    pub role: Option<Role>,
}

/// Custom claims attached to a user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl CustomClaims {
    pub fn with_role(role: Role) -> Self {
        Self { role: Some(role) }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserMetadata {
    pub creation_time: Option<DateTime<Utc>>,
    pub last_sign_in_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub custom_claims: Option<CustomClaims>,
    pub metadata: UserMetadata,
}

impl UserRecord {
    pub fn role(&self) -> Option<Role> {
        self.custom_claims.as_ref().and_then(|c| c.role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserUpdate {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Black-box identity service.
///
/// Implementations must be shareable across requests (`Arc<dyn IdentityProvider>`
/// lives in `AppState`).
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Backend name (for logging).
    fn backend_name(&self) -> &'static str;

    /// Verify an ID token and return the caller's identity.
    async fn verify_id_token(&self, token: &str) -> ProviderResult<VerifiedIdToken>;

    /// Create a user record. Returns the new uid.
    async fn create_user(&self, user: NewUser) -> ProviderResult<String>;

    /// Replace the custom claims of `uid`.
    async fn set_custom_user_claims(&self, uid: &str, claims: &CustomClaims)
    -> ProviderResult<()>;

    /// First page of user records (provider default page size).
    async fn list_users(&self) -> ProviderResult<Vec<UserRecord>>;

    async fn get_user(&self, uid: &str) -> ProviderResult<UserRecord>;

    async fn update_user(&self, uid: &str, update: UserUpdate) -> ProviderResult<()>;

    async fn delete_user(&self, uid: &str) -> ProviderResult<()>;
}
