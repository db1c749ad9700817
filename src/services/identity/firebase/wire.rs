//! Identity Toolkit v1 request/response bodies and error mapping.
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::services::access::Role;
use crate::services::identity::{CustomClaims, ProviderError, UserMetadata, UserRecord};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub display_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub local_id: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccountInfoRequest<'a> {
    pub local_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<&'a str>,
    /// JSON-encoded claims object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_attributes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupRequest<'a> {
    pub local_id: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub users: Vec<UserInfo>,
}

/// Only the first page is read; `nextPageToken` is ignored.
#[derive(Debug, Deserialize)]
pub struct BatchGetResponse {
    #[serde(default)]
    pub users: Vec<UserInfo>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest<'a> {
    pub local_id: &'a str,
}

/// User as returned by `accounts:lookup` / `accounts:batchGet`.
///
/// Timestamps are epoch milliseconds encoded as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub custom_attributes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_login_at: Option<String>,
}

impl UserInfo {
    pub fn into_record(self) -> UserRecord {
        let custom_claims = self.custom_attributes.as_deref().map(parse_custom_attributes);

        UserRecord {
            uid: self.local_id,
            email: self.email,
            display_name: self.display_name,
            custom_claims,
            metadata: UserMetadata {
                creation_time: parse_millis(self.created_at.as_deref()),
                last_sign_in_time: parse_millis(self.last_login_at.as_deref()),
            },
        }
    }
}

fn parse_millis(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
}

fn parse_custom_attributes(raw: &str) -> CustomClaims {
    let value: serde_json::Value = serde_json::from_str(raw).unwrap_or_default();
    CustomClaims {
        role: Role::from_claim(value.get("role").and_then(|v| v.as_str())),
    }
}

pub fn encode_custom_attributes(claims: &CustomClaims) -> Result<String, ProviderError> {
    serde_json::to_string(claims)
        .map_err(|e| ProviderError::new("auth/invalid-claims", e.to_string()))
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Translate an Identity Toolkit error body into a namespaced provider error.
///
/// Server messages look like `USER_NOT_FOUND` or `WEAK_PASSWORD : Password
/// should be at least 6 characters`; the detail after ` : ` wins over the
/// canned message when present.
pub fn map_server_error(status: StatusCode, body: &str) -> ProviderError {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return ProviderError::internal(format!(
            "An internal error has occurred. Raw server response ({}): {}",
            status.as_u16(),
            body
        ));
    };

    let raw = envelope.error.message;
    let (server_code, detail) = match raw.split_once(" : ") {
        Some((code, detail)) => (code.trim(), Some(detail.trim())),
        None => (raw.trim(), None),
    };

    let (code, message) = match server_code {
        "USER_NOT_FOUND" => (
            "auth/user-not-found",
            "There is no user record corresponding to the provided identifier.",
        ),
        "EMAIL_EXISTS" => (
            "auth/email-already-exists",
            "The email address is already in use by another account.",
        ),
        "DUPLICATE_LOCAL_ID" => (
            "auth/uid-already-exists",
            "The user with the provided uid already exists.",
        ),
        "INVALID_EMAIL" => (
            "auth/invalid-email",
            "The email address is improperly formatted.",
        ),
        "WEAK_PASSWORD" | "INVALID_PASSWORD" => (
            "auth/invalid-password",
            "The password must be a string with at least 6 characters.",
        ),
        "INVALID_DISPLAY_NAME" => (
            "auth/invalid-display-name",
            "The displayName field must be a valid string.",
        ),
        "INVALID_ID_TOKEN" => (
            "auth/invalid-id-token",
            "The provided ID token is not a valid Firebase ID token.",
        ),
        "TOKEN_EXPIRED" => ("auth/id-token-expired", "The provided Firebase ID token is expired."),
        "PROJECT_NOT_FOUND" | "CONFIGURATION_NOT_FOUND" => (
            "auth/project-not-found",
            "No Firebase project was found for the provided credential.",
        ),
        "INSUFFICIENT_PERMISSION" => (
            "auth/insufficient-permission",
            "Credential implementation provided to initializeApp() via the \"credential\" property has insufficient permission to access the requested resource.",
        ),
        "INVALID_CLAIMS" => ("auth/invalid-claims", "The provided custom claim attributes are invalid."),
        _ => {
            return ProviderError::internal(format!(
                "An internal error has occurred. Raw server response: {raw}"
            ));
        }
    };

    ProviderError::new(code, detail.unwrap_or(message))
}
