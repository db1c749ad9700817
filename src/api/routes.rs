/*
 * Responsibility
 * - URL layout: /health (open) and /users (behind both gates)
 * - Per-route RoleRequirement declarations
 * - Gate order: authentication (router layer) runs before authorization (method layer)
 */
use axum::{
    Router,
    routing::{delete, get},
};

use crate::{
    api::handlers::{
        health::health,
        users::{create_user, delete_user, get_user, list_users, update_user},
    },
    middleware::auth::{authenticate, authorize},
    services::access::{Role, RoleRequirement},
    state::AppState,
};

pub fn routes(state: &AppState) -> Router<AppState> {
    let staff = RoleRequirement::any_of(&[Role::Admin, Role::Worker]);
    let staff_or_self = staff.clone().or_same_subject();

    let users = Router::new()
        .route(
            "/users",
            authorize::apply(get(list_users).post(create_user), state, staff.clone()),
        )
        .route(
            "/users/{id}",
            authorize::apply(get(get_user).patch(update_user), state, staff_or_self)
                .merge(authorize::apply(delete(delete_user), state, staff)),
        );

    Router::new()
        .route("/health", get(health))
        .merge(authenticate::apply(users, state.clone()))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::app::build_router;
    use crate::config::{AppEnv, Config, IdentityConfig};
    use crate::services::access::{AccessPolicy, Role};
    use crate::services::identity::ProviderError;
    use crate::services::identity::memory::MemoryIdentityProvider;
    use crate::state::AppState;

    const ROOT: &str = "root@example.com";

    fn test_config() -> Config {
        Config {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            app_env: AppEnv::Development,
            cors_allowed_origins: Vec::new(),
            root_email: Some(ROOT.to_string()),
            identity: IdentityConfig {
                project_id: Some("demo-project".to_string()),
                credentials_path: None,
                emulator_host: Some("localhost:9099".to_string()),
                http_timeout: Duration::from_secs(1),
                id_token_leeway_seconds: 0,
            },
        }
    }

    fn app() -> (Router, Arc<MemoryIdentityProvider>) {
        let provider = Arc::new(MemoryIdentityProvider::new());
        let config = test_config();
        let state = AppState::new(provider.clone(), AccessPolicy::new(config.root_email.clone()));
        (build_router(state, &config), provider)
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    fn json_of(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    fn new_user(role: Option<&str>) -> Value {
        let mut body = json!({
            "displayName": "Casey",
            "password": "s3cret-pw",
            "email": "casey@example.com",
        });
        if let Some(role) = role {
            body["role"] = json!(role);
        }
        body
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let (app, _) = app();
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn unknown_path_is_404_without_token() {
        let (app, _) = app();
        let (status, _) = send(&app, Method::GET, "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn missing_or_bad_token_is_401() {
        let (app, provider) = app();
        provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;

        let (status, body) = send(&app, Method::GET, "/users", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json_of(&body), json!({"message": "Unauthorized"}));

        let (status, _) = send(&app, Method::GET, "/users", Some("forged"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn worker_lists_users() {
        let (app, provider) = app();
        let token = provider.seed("w1", "worker@example.com", Some(Role::Worker)).await;
        provider.seed("u1", "user@example.com", None).await;

        let (status, body) = send(&app, Method::GET, "/users", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);

        let users = json_of(&body)["users"].as_array().cloned().unwrap();
        assert_eq!(users.len(), 2);
        let plain = users.iter().find(|u| u["uid"] == "u1").unwrap();
        assert_eq!(plain["role"], "");
        assert_eq!(plain["lastSignInTime"], Value::Null);
    }

    #[tokio::test]
    async fn plain_user_is_forbidden_with_empty_body() {
        let (app, provider) = app();
        let token = provider.seed("u1", "user@example.com", Some(Role::User)).await;

        let (status, body) = send(&app, Method::GET, "/users", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.is_empty());

        let (status, _) = send(&app, Method::GET, "/users/u2", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn create_with_missing_field_never_reaches_provider() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        let before = provider.calls();

        let (status, body) =
            send(&app, Method::POST, "/users", Some(token.as_str()), Some(new_user(None))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body), json!({"message": "Missing fields"}));
        assert_eq!(provider.calls(), before);
    }

    #[tokio::test]
    async fn create_with_unknown_role_is_400() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(token.as_str()),
            Some(new_user(Some("owner"))),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body), json!({"message": "Invalid role"}));
    }

    #[tokio::test]
    async fn create_sets_role_claim() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(token.as_str()),
            Some(new_user(Some("worker"))),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let uid = json_of(&body)["uid"].as_str().unwrap().to_string();
        let created = provider.user(&uid).await.unwrap();
        assert_eq!(created.role(), Some(Role::Worker));
        assert_eq!(created.email.as_deref(), Some("casey@example.com"));
    }

    #[tokio::test]
    async fn create_duplicate_email_is_flattened_to_500() {
        let (app, provider) = app();
        let token = provider.seed("a1", "casey@example.com", Some(Role::Admin)).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/users",
            Some(token.as_str()),
            Some(new_user(Some("user"))),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json_of(&body)["message"].as_str().unwrap().to_string();
        assert!(message.starts_with("auth/email-already-exists - "), "{message}");
    }

    #[tokio::test]
    async fn same_subject_reads_own_record_without_role() {
        let (app, provider) = app();
        let token = provider.seed("42", "self@example.com", None).await;

        let (status, body) = send(&app, Method::GET, "/users/42", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_of(&body)["user"]["uid"], "42");
        assert_eq!(json_of(&body)["user"]["email"], "self@example.com");
    }

    #[tokio::test]
    async fn same_subject_cannot_delete_self() {
        let (app, provider) = app();
        let token = provider.seed("42", "self@example.com", Some(Role::User)).await;

        let (status, _) = send(&app, Method::DELETE, "/users/42", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(provider.user("42").await.is_some());
    }

    #[tokio::test]
    async fn root_email_bypasses_role_checks() {
        let (app, provider) = app();
        let token = provider.seed("r1", ROOT, None).await;

        let (status, _) = send(&app, Method::GET, "/users", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_user_is_500_not_404() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;

        let (status, body) = send(&app, Method::GET, "/users/ghost", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = json_of(&body)["message"].as_str().unwrap().to_string();
        assert!(message.contains("auth/user-not-found"), "{message}");
    }

    #[tokio::test]
    async fn delete_is_not_idempotent() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        provider.seed("u1", "user@example.com", Some(Role::User)).await;

        let (status, _) = send(&app, Method::DELETE, "/users/u1", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(provider.user("u1").await.is_none());

        let (status, body) = send(&app, Method::DELETE, "/users/u1", Some(token.as_str()), None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            json_of(&body)["message"]
                .as_str()
                .unwrap()
                .contains("auth/user-not-found")
        );
    }

    #[tokio::test]
    async fn patch_updates_profile_and_role() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        provider.seed("u1", "user@example.com", Some(Role::User)).await;

        let body = json!({
            "displayName": "Renamed",
            "password": "another-pw",
            "email": "renamed@example.com",
            "role": "worker",
        });
        let (status, _) = send(&app, Method::PATCH, "/users/u1", Some(token.as_str()), Some(body)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let updated = provider.user("u1").await.unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Renamed"));
        assert_eq!(updated.email.as_deref(), Some("renamed@example.com"));
        assert_eq!(updated.role(), Some(Role::Worker));
    }

    #[tokio::test]
    async fn patch_by_same_subject_is_allowed() {
        let (app, provider) = app();
        let token = provider.seed("u1", "user@example.com", Some(Role::User)).await;

        let body = json!({
            "displayName": "Me",
            "password": "another-pw",
            "email": "me@example.com",
            "role": "user",
        });
        let (status, _) = send(&app, Method::PATCH, "/users/u1", Some(token.as_str()), Some(body)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            provider.user("u1").await.unwrap().email.as_deref(),
            Some("me@example.com")
        );
    }

    #[tokio::test]
    async fn patch_with_missing_fields_is_400() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        let before = provider.calls();

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/users/a1",
            Some(token.as_str()),
            Some(json!({"displayName": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body), json!({"message": "Missing fields"}));
        assert_eq!(provider.calls(), before);
    }

    #[tokio::test]
    async fn create_without_json_body_is_missing_fields() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        let before = provider.calls();

        let request = Request::post("/users")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(json_of(&bytes), json!({"message": "Missing fields"}));

        let request = Request::post("/users")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(provider.calls(), before);
    }

    #[tokio::test]
    async fn patch_with_non_string_role_is_400() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        let before = provider.calls();

        let body = json!({
            "displayName": "Renamed",
            "password": "another-pw",
            "email": "renamed@example.com",
            "role": 7,
        });
        let (status, body) = send(&app, Method::PATCH, "/users/a1", Some(token.as_str()), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_of(&body), json!({"message": "Missing fields"}));
        assert_eq!(provider.calls(), before);
    }

    #[tokio::test]
    async fn patch_claim_failure_keeps_profile_change() {
        let (app, provider) = app();
        let token = provider.seed("a1", "admin@example.com", Some(Role::Admin)).await;
        provider.seed("u1", "user@example.com", Some(Role::User)).await;
        provider.fail_next(
            "set_custom_user_claims",
            ProviderError::internal("An internal error has occurred."),
        );

        let body = json!({
            "displayName": "Renamed",
            "password": "another-pw",
            "email": "renamed@example.com",
            "role": "worker",
        });
        let (status, body) = send(&app, Method::PATCH, "/users/u1", Some(token.as_str()), Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            json_of(&body),
            json!({"message": "auth/internal-error - An internal error has occurred."})
        );

        let user = provider.user("u1").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("renamed@example.com"));
        assert_eq!(user.role(), Some(Role::User));
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (app, _) = app();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
    }
}
