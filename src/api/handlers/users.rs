/*
 * Responsibility
 * - /users CRUD handlers
 * - Validate the body, call the identity provider, map the result
 * - Provider calls are sequential and attempted once; any failure is a 500 (see AppError)
 * - Authorization already happened in the route layer; AuthCtx is only used for logging here
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde_json::{Value, json};

use crate::{
    api::{
        dto::users::{
            CreateUserRequest, CreateUserResponse, UpdateUserRequest, UserListResponse,
            UserResponse, UserView,
        },
        extractors::{AuthCtxExtractor, JsonBody},
    },
    error::AppError,
    services::identity::CustomClaims,
    state::AppState,
};

pub async fn create_user(
    State(state): State<AppState>,
    AuthCtxExtractor(caller): AuthCtxExtractor,
    JsonBody(req): JsonBody<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreateUserResponse>), AppError> {
    let (new_user, role) = req.validate().map_err(AppError::bad_request)?.into_new_user();

    let uid = state.identity.create_user(new_user).await?;
    state
        .identity
        .set_custom_user_claims(&uid, &CustomClaims::with_role(role))
        .await?;

    tracing::info!(actor = %caller.subject_id, uid = %uid, role = %role, "user created");

    Ok((StatusCode::CREATED, Json(CreateUserResponse { uid })))
}

pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<UserListResponse>, AppError> {
    let users = state
        .identity
        .list_users()
        .await?
        .into_iter()
        .map(UserView::from)
        .collect();

    Ok(Json(UserListResponse { users }))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.identity.get_user(&user_id).await?;

    Ok(Json(UserResponse { user: user.into() }))
}

/// Answers 204 *with* the refreshed record as body; existing clients read it.
pub async fn update_user(
    State(state): State<AppState>,
    AuthCtxExtractor(caller): AuthCtxExtractor,
    Path(user_id): Path<String>,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    let (update, role) = req.validate().map_err(AppError::bad_request)?.into_update();

    state.identity.update_user(&user_id, update).await?;
    // no rollback if this fails after the profile update went through
    state
        .identity
        .set_custom_user_claims(&user_id, &CustomClaims::with_role(role))
        .await?;
    let user = state.identity.get_user(&user_id).await?;

    tracing::info!(actor = %caller.subject_id, uid = %user_id, role = %role, "user updated");

    Ok((StatusCode::NO_CONTENT, Json(UserResponse { user: user.into() })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AuthCtxExtractor(caller): AuthCtxExtractor,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    state.identity.delete_user(&user_id).await?;

    tracing::info!(actor = %caller.subject_id, uid = %user_id, "user deleted");

    Ok((StatusCode::NO_CONTENT, Json(json!({}))))
}
