//! Authorization decision for the user-management routes.
//!
//! The decision is a pure function of the caller's identity, the route's
//! declared requirement, the subject id taken from the path and the configured
//! root email. Wiring it into the request pipeline lives in
//! `middleware::auth::authorize`.
use std::sync::Arc;

use crate::api::extractors::AuthCtx;
use crate::services::access::Role;

/// Per-route requirement, declared once when the router is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    required_roles: Arc<[Role]>,
    allow_same_subject: bool,
}

impl RoleRequirement {
    /// `roles` must not be empty; an empty requirement would only ever admit
    /// same-subject or root callers.
    pub fn any_of(roles: &[Role]) -> Self {
        debug_assert!(!roles.is_empty(), "role requirement needs at least one role");
        Self {
            required_roles: roles.into(),
            allow_same_subject: false,
        }
    }

    /// Also admit a caller acting on their own record (`/users/{id}` with
    /// `id == caller`).
    pub fn or_same_subject(mut self) -> Self {
        self.allow_same_subject = true;
        self
    }
}

/// Why a request was let through. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    SameSubject,
    RootEmail,
    Role(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow(Grant),
    Deny,
}

/// Process-wide access configuration.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    root_email: Option<String>,
}

impl AccessPolicy {
    pub fn new(root_email: Option<String>) -> Self {
        Self {
            root_email: root_email.filter(|e| !e.trim().is_empty()),
        }
    }

    pub fn root_email(&self) -> Option<&str> {
        self.root_email.as_deref()
    }

    /// First matching rule wins:
    /// 1. same subject (when the route allows it)
    /// 2. root email
    /// 3. no role -> deny
    /// 4. role in the requirement
    /// 5. deny
    pub fn decide(
        &self,
        caller: &AuthCtx,
        requirement: &RoleRequirement,
        path_subject: Option<&str>,
    ) -> Decision {
        if requirement.allow_same_subject
            && let Some(target) = path_subject
            && !target.is_empty()
            && target == caller.subject_id
        {
            return Decision::Allow(Grant::SameSubject);
        }

        if let (Some(root), Some(email)) = (self.root_email.as_deref(), caller.email.as_deref())
            && root == email
        {
            return Decision::Allow(Grant::RootEmail);
        }

        let Some(role) = caller.role else {
            return Decision::Deny;
        };

        if requirement.required_roles.contains(&role) {
            return Decision::Allow(Grant::Role(role));
        }

        Decision::Deny
    }
}
