/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - identity provider client, access policy
 * - Cheap to Clone (Arc inside)
 */
use std::sync::Arc;

use crate::services::{access::AccessPolicy, identity::IdentityProvider};

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub access: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, access: AccessPolicy) -> Self {
        Self {
            identity,
            access: Arc::new(access),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("identity", &self.identity.backend_name())
            .field("access", &self.access)
            .finish()
    }
}
