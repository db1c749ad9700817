/*
 * Responsibility
 * - The authenticated caller as seen by the authorization gate and handlers
 * - The authentication gate builds it from a verified ID token and stores it in request
 *   extensions; nothing downstream mutates it
 */
use crate::services::access::Role;
use crate::services::identity::VerifiedIdToken;

/// Per-request identity of the caller.
///
/// - `subject_id` is the provider uid of the caller
/// - `email` / `role` are absent when the provider has none on record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCtx {
    pub subject_id: String,
    pub email: Option<String>,
    pub role: Option<Role>,
}

impl AuthCtx {
    pub fn new(subject_id: impl Into<String>, email: Option<String>, role: Option<Role>) -> Self {
        Self {
            subject_id: subject_id.into(),
            email,
            role,
        }
    }
}

impl From<VerifiedIdToken> for AuthCtx {
    fn from(token: VerifiedIdToken) -> Self {
        Self::new(token.uid, token.email, token.role)
    }
}
