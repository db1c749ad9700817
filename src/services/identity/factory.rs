/// Factory: build the identity provider from application `Config`.
use std::sync::Arc;

use thiserror::Error;

use crate::config::IdentityConfig;
use crate::services::identity::IdentityProvider;
use crate::services::identity::firebase::{
    Credentials, CredentialsError, FirebaseAuth, IdTokenVerifier, ServiceAccountKey,
};

#[derive(Debug, Error)]
pub enum IdentityInitError {
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("no project id: set FIREBASE_PROJECT_ID or use a service account file with project_id")]
    MissingProjectId,
    #[error("cannot build http client: {0}")]
    Http(#[from] reqwest::Error),
}

pub fn build_identity_provider(
    config: &IdentityConfig,
) -> Result<Arc<dyn IdentityProvider>, IdentityInitError> {
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let (credentials, key_project) = match (&config.emulator_host, &config.credentials_path) {
        (Some(_), _) => (Credentials::Emulator, None),
        (None, Some(path)) => {
            let key = ServiceAccountKey::from_file(path)?;
            let project = key.project_id.clone();
            (Credentials::service_account(key)?, project)
        }
        (None, None) => return Err(CredentialsError::Missing.into()),
    };

    let project_id = config
        .project_id
        .clone()
        .or(key_project)
        .ok_or(IdentityInitError::MissingProjectId)?;

    let verifier = match config.emulator_host {
        Some(_) => IdTokenVerifier::emulator(&project_id, config.id_token_leeway_seconds),
        None => IdTokenVerifier::signed(&project_id, config.id_token_leeway_seconds),
    };

    tracing::info!(
        project_id = %project_id,
        emulator = config.emulator_host.as_deref().unwrap_or("-"),
        credentials = ?credentials,
        "identity provider configured"
    );

    Ok(Arc::new(FirebaseAuth::new(
        http,
        &project_id,
        config.emulator_host.as_deref(),
        credentials,
        verifier,
    )))
}
