//! ID token verification.
//!
//! Production tokens are RS256 JWTs signed by the `securetoken` service
//! account; the key set is fetched lazily and cached per `Cache-Control`.
//! Emulator tokens are unsigned, so only the payload claims are checked.
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind, jwk::JwkSet};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::services::access::Role;
use crate::services::identity::{ProviderError, VerifiedIdToken};

const JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Used when the key endpoint does not send `max-age`.
const DEFAULT_KEYS_TTL_SECONDS: i64 = 3600;

const MAX_UID_LEN: usize = 128;

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    sub: String,
    #[serde(default)]
    aud: String,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    exp: i64,
    #[serde(default)]
    email: Option<String>,
    /// Any JSON value; non-strings read as no role.
    #[serde(default)]
    role: Option<serde_json::Value>,
}

#[derive(Debug)]
struct CachedKeys {
    set: JwkSet,
    expires_at: DateTime<Utc>,
}

impl CachedKeys {
    /// Unknown kids are rejected; only expiry triggers a refetch.
    fn key_for(&self, kid: &str) -> Result<DecodingKey, ProviderError> {
        let jwk = self.set.find(kid).ok_or_else(|| {
            ProviderError::invalid_id_token(
                "Firebase ID token has \"kid\" claim which does not correspond to a known public key.",
            )
        })?;
        DecodingKey::from_jwk(jwk)
            .map_err(|e| ProviderError::internal(format!("invalid signing key: {e}")))
    }
}

#[derive(Debug)]
enum Mode {
    Signed { keys: RwLock<Option<CachedKeys>> },
    Emulator,
}

#[derive(Debug)]
pub struct IdTokenVerifier {
    project_id: String,
    issuer: String,
    leeway_seconds: u64,
    mode: Mode,
}

impl IdTokenVerifier {
    pub fn signed(project_id: &str, leeway_seconds: u64) -> Self {
        Self::with_mode(
            project_id,
            leeway_seconds,
            Mode::Signed {
                keys: RwLock::new(None),
            },
        )
    }

    pub fn emulator(project_id: &str, leeway_seconds: u64) -> Self {
        Self::with_mode(project_id, leeway_seconds, Mode::Emulator)
    }

    fn with_mode(project_id: &str, leeway_seconds: u64, mode: Mode) -> Self {
        Self {
            project_id: project_id.to_string(),
            issuer: format!("https://securetoken.google.com/{project_id}"),
            leeway_seconds,
            mode,
        }
    }

    pub async fn verify(
        &self,
        http: &reqwest::Client,
        token: &str,
    ) -> Result<VerifiedIdToken, ProviderError> {
        let claims = match &self.mode {
            Mode::Signed { keys } => self.verify_signed(http, keys, token).await?,
            Mode::Emulator => self.verify_unsigned(token, Utc::now())?,
        };

        into_verified(claims)
    }

    async fn verify_signed(
        &self,
        http: &reqwest::Client,
        keys: &RwLock<Option<CachedKeys>>,
        token: &str,
    ) -> Result<IdTokenClaims, ProviderError> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| {
            ProviderError::invalid_id_token("Decoding Firebase ID token failed.")
        })?;

        if header.alg != Algorithm::RS256 {
            return Err(ProviderError::invalid_id_token(format!(
                "Firebase ID token has incorrect algorithm. Expected \"RS256\" but got \"{:?}\".",
                header.alg
            )));
        }

        let kid = header.kid.ok_or_else(|| {
            ProviderError::invalid_id_token("Firebase ID token has no \"kid\" claim.")
        })?;

        let key = self.decoding_key(http, keys, &kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.project_id]);
        validation.leeway = self.leeway_seconds;

        jsonwebtoken::decode::<IdTokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => ProviderError::new(
                    "auth/id-token-expired",
                    "Firebase ID token has expired.",
                ),
                ErrorKind::InvalidAudience => ProviderError::invalid_id_token(format!(
                    "Firebase ID token has incorrect \"aud\" (audience) claim. Expected \"{}\".",
                    self.project_id
                )),
                ErrorKind::InvalidIssuer => ProviderError::invalid_id_token(format!(
                    "Firebase ID token has incorrect \"iss\" (issuer) claim. Expected \"{}\".",
                    self.issuer
                )),
                _ => ProviderError::invalid_id_token(format!(
                    "Firebase ID token has invalid signature: {e}"
                )),
            })
    }

    async fn decoding_key(
        &self,
        http: &reqwest::Client,
        keys: &RwLock<Option<CachedKeys>>,
        kid: &str,
    ) -> Result<DecodingKey, ProviderError> {
        let now = Utc::now();

        if let Some(cached) = keys.read().await.as_ref()
            && cached.expires_at > now
        {
            return cached.key_for(kid);
        }

        let mut slot = keys.write().await;
        // another request may have refreshed while we waited for the lock
        if let Some(cached) = slot.as_ref()
            && cached.expires_at > now
        {
            return cached.key_for(kid);
        }

        let fresh = fetch_keys(http, now).await?;
        let key = fresh.key_for(kid);
        *slot = Some(fresh);
        key
    }

    fn verify_unsigned(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<IdTokenClaims, ProviderError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ProviderError::invalid_id_token(
                "Decoding Firebase ID token failed.",
            ));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|_| ProviderError::invalid_id_token("Decoding Firebase ID token failed."))?;
        let claims: IdTokenClaims = serde_json::from_slice(&bytes)
            .map_err(|_| ProviderError::invalid_id_token("Decoding Firebase ID token failed."))?;

        if claims.aud != self.project_id {
            return Err(ProviderError::invalid_id_token(format!(
                "Firebase ID token has incorrect \"aud\" (audience) claim. Expected \"{}\" but got \"{}\".",
                self.project_id, claims.aud
            )));
        }
        if claims.iss != self.issuer {
            return Err(ProviderError::invalid_id_token(format!(
                "Firebase ID token has incorrect \"iss\" (issuer) claim. Expected \"{}\" but got \"{}\".",
                self.issuer, claims.iss
            )));
        }
        let leeway = i64::try_from(self.leeway_seconds).unwrap_or(i64::MAX);
        if claims.exp.saturating_add(leeway) < now.timestamp() {
            return Err(ProviderError::new(
                "auth/id-token-expired",
                "Firebase ID token has expired.",
            ));
        }

        Ok(claims)
    }
}

fn into_verified(claims: IdTokenClaims) -> Result<VerifiedIdToken, ProviderError> {
    if claims.sub.is_empty() {
        return Err(ProviderError::invalid_id_token(
            "Firebase ID token has an empty string \"sub\" (subject) claim.",
        ));
    }
    if claims.sub.len() > MAX_UID_LEN {
        return Err(ProviderError::invalid_id_token(
            "Firebase ID token has \"sub\" (subject) claim longer than 128 characters.",
        ));
    }

    Ok(VerifiedIdToken {
        role: Role::from_claim(claims.role.as_ref().and_then(|v| v.as_str())),
        uid: claims.sub,
        email: claims.email,
    })
}

async fn fetch_keys(http: &reqwest::Client, now: DateTime<Utc>) -> Result<CachedKeys, ProviderError> {
    let resp = http
        .get(JWKS_URL)
        .send()
        .await
        .map_err(|e| ProviderError::network(format!("failed to fetch public keys: {e}")))?;

    if !resp.status().is_success() {
        return Err(ProviderError::internal(format!(
            "Error fetching public keys for Google certs: {}",
            resp.status()
        )));
    }

    let ttl = resp
        .headers()
        .get(reqwest::header::CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(max_age_seconds)
        .unwrap_or(DEFAULT_KEYS_TTL_SECONDS);

    let set: JwkSet = resp
        .json()
        .await
        .map_err(|e| ProviderError::internal(format!("invalid public key set: {e}")))?;

    tracing::debug!(keys = set.keys.len(), ttl, "refreshed id token signing keys");

    Ok(CachedKeys {
        set,
        expires_at: now + Duration::seconds(ttl),
    })
}

/// `public, max-age=19302, must-revalidate, no-transform` -> `19302`
fn max_age_seconds(cache_control: &str) -> Option<i64> {
    cache_control
        .split(',')
        .filter_map(|d| d.trim().strip_prefix("max-age="))
        .find_map(|v| v.trim().parse::<i64>().ok())
}
