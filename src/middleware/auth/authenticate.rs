//! Authentication gate: ID token verification -> AuthCtx in request extensions.
//!
//! - `Authorization: Bearer <id token>` is required
//! - The token is verified by the identity provider; we do not inspect it here
//! - Any failure answers 401 `{"message":"Unauthorized"}`

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::api::extractors::AuthCtx;
use crate::error::AppError;
use crate::state::AppState;

/// Put the authentication gate in front of every route of `router`.
///
/// `route_layer` keeps unmatched paths answering 404 instead of 401.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 from_fn cannot take a State extractor; pass it via from_fn_with_state
    router.route_layer(middleware::from_fn_with_state(state, authenticate_middleware))
}

async fn authenticate_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;

    let verified = match state.identity.verify_id_token(&token).await {
        Ok(verified) => verified,
        Err(err) => {
            tracing::warn!(
                code = %err.code,
                message = %err.message,
                "id token verification failed"
            );
            return Err(AppError::Unauthorized);
        }
    };

    // middleware -> authorization gate / extractor
    req.extensions_mut().insert(AuthCtx::from(verified));

    Ok(next.run(req).await)
}

/// `Bearer <token>` with exactly one `Bearer ` separator.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    if !auth.starts_with("Bearer") {
        return None;
    }

    let mut parts = auth.split("Bearer ");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(token), None) if !token.is_empty() => Some(token.to_string()),
        _ => None,
    }
}
