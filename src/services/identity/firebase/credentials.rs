//! Credentials for calling the Identity Toolkit admin endpoints.
//!
//! - Emulator: the literal bearer `owner`.
//! - Service account: an RS256 JWT-bearer assertion exchanged for an OAuth2
//!   access token, cached until shortly before it expires.
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::services::identity::ProviderError;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SCOPES: &str = "https://www.googleapis.com/auth/cloud-platform \
https://www.googleapis.com/auth/firebase \
https://www.googleapis.com/auth/identitytoolkit \
https://www.googleapis.com/auth/userinfo.email";

/// Refresh this long before the provider-reported expiry.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("no credentials: set GOOGLE_APPLICATION_CREDENTIALS or FIREBASE_AUTH_EMULATOR_HOST")]
    Missing,
    #[error("cannot read service account file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid service account json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid service account private key: {0}")]
    PrivateKey(#[from] jsonwebtoken::errors::Error),
}

/// The subset of a Google service-account key file we use.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, CredentialsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CredentialsError> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    token: String,
    refresh_at: DateTime<Utc>,
}

pub enum Credentials {
    Emulator,
    ServiceAccount {
        key: ServiceAccountKey,
        encoding_key: EncodingKey,
        cached: RwLock<Option<CachedToken>>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Emulator => f.write_str("Credentials::Emulator"),
            Credentials::ServiceAccount { key, .. } => f
                .debug_struct("Credentials::ServiceAccount")
                .field("client_email", &key.client_email)
                .finish(),
        }
    }
}

impl Credentials {
    pub fn service_account(key: ServiceAccountKey) -> Result<Self, CredentialsError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self::ServiceAccount {
            key,
            encoding_key,
            cached: RwLock::new(None),
        })
    }

    /// Bearer value for the `Authorization` header of an admin call.
    pub async fn bearer(&self, http: &reqwest::Client) -> Result<String, ProviderError> {
        let (key, encoding_key, cached) = match self {
            Credentials::Emulator => return Ok("owner".to_string()),
            Credentials::ServiceAccount {
                key,
                encoding_key,
                cached,
            } => (key, encoding_key, cached),
        };

        let now = Utc::now();
        if let Some(token) = cached.read().await.as_ref()
            && token.refresh_at > now
        {
            return Ok(token.token.clone());
        }

        let mut slot = cached.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref()
            && token.refresh_at > now
        {
            return Ok(token.token.clone());
        }

        let fresh = fetch_access_token(http, key, encoding_key, now).await?;
        let token = fresh.token.clone();
        *slot = Some(fresh);
        Ok(token)
    }
}

async fn fetch_access_token(
    http: &reqwest::Client,
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
    now: DateTime<Utc>,
) -> Result<CachedToken, ProviderError> {
    let assertion = sign_assertion(key, encoding_key, now)?;

    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", JWT_BEARER_GRANT)
        .append_pair("assertion", &assertion)
        .finish();

    let resp = http
        .post(&key.token_uri)
        .header(
            reqwest::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body)
        .send()
        .await
        .map_err(|e| ProviderError::network(format!("failed to fetch access token: {e}")))?;

    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ProviderError::network(format!("failed to read access token: {e}")))?;

    if !status.is_success() {
        tracing::error!(status = %status, "service account token exchange rejected");
        return Err(ProviderError::new(
            "app/invalid-credential",
            format!("Failed to fetch a valid Google OAuth2 access token ({status}): {text}"),
        ));
    }

    let parsed: TokenResponse = serde_json::from_str(&text).map_err(|e| {
        ProviderError::new(
            "app/invalid-credential",
            format!("Unexpected token response: {e}"),
        )
    })?;

    Ok(CachedToken {
        token: parsed.access_token,
        refresh_at: now + Duration::seconds(parsed.expires_in - EXPIRY_MARGIN_SECONDS),
    })
}

fn sign_assertion(
    key: &ServiceAccountKey,
    encoding_key: &EncodingKey,
    now: DateTime<Utc>,
) -> Result<String, ProviderError> {
    let iat = now.timestamp();
    let claims = AssertionClaims {
        iss: &key.client_email,
        scope: SCOPES,
        aud: &key.token_uri,
        iat,
        exp: iat + 3600,
    };

    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, encoding_key)
        .map_err(|e| ProviderError::new("app/invalid-credential", e.to_string()))
}
