//! Authorization gate: applies a route's RoleRequirement to the AuthCtx left by
//! the authentication gate. Deny answers 403 with an empty body.
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, RawPathParams, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::services::access::{AccessPolicy, Decision, Grant, RoleRequirement};
use crate::state::AppState;

/// Path parameter naming the target user on `/users/{id}`.
const SUBJECT_PARAM: &str = "id";

#[derive(Clone)]
struct Gate {
    policy: Arc<AccessPolicy>,
    requirement: RoleRequirement,
}

/// Guard every method currently registered on `route` with `requirement`.
pub fn apply(
    route: MethodRouter<AppState>,
    state: &AppState,
    requirement: RoleRequirement,
) -> MethodRouter<AppState> {
    let gate = Gate {
        policy: state.access.clone(),
        requirement,
    };
    route.route_layer(middleware::from_fn_with_state(gate, authorize_middleware))
}

async fn authorize_middleware(
    State(gate): State<Gate>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let caller = parts
        .extensions
        .get::<AuthCtx>()
        .cloned()
        .ok_or(AppError::Unauthorized)?;

    // routes without `{id}` simply have no subject
    let path_subject = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == SUBJECT_PARAM)
                .map(|(_, value)| value.to_string())
        });

    match gate
        .policy
        .decide(&caller, &gate.requirement, path_subject.as_deref())
    {
        Decision::Allow(Grant::RootEmail) => {
            tracing::warn!(
                subject = %caller.subject_id,
                method = %parts.method,
                path = %parts.uri.path(),
                "root email bypass granted"
            );
        }
        Decision::Allow(Grant::SameSubject) => {
            tracing::debug!(subject = %caller.subject_id, "access granted to own record");
        }
        Decision::Allow(Grant::Role(role)) => {
            tracing::debug!(subject = %caller.subject_id, role = %role, "access granted");
        }
        Decision::Deny => {
            tracing::debug!(
                subject = %caller.subject_id,
                role = ?caller.role,
                method = %parts.method,
                path = %parts.uri.path(),
                "access denied"
            );
            return Err(AppError::Forbidden);
        }
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}
