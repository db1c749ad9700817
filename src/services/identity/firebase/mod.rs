//! Firebase Authentication backend (Identity Toolkit REST v1).
mod credentials;
mod id_token;
mod wire;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned, de::IgnoredAny};

use crate::services::identity::{
    CustomClaims, IdentityProvider, NewUser, ProviderError, ProviderResult, UserRecord,
    UserUpdate, VerifiedIdToken,
};

pub use credentials::{Credentials, CredentialsError, ServiceAccountKey};
pub use id_token::IdTokenVerifier;

const PRODUCTION_HOST: &str = "https://identitytoolkit.googleapis.com";

/// Page size of the provider's default `listUsers()` call.
const LIST_PAGE_SIZE: u32 = 1000;

#[derive(Debug)]
pub struct FirebaseAuth {
    http: reqwest::Client,
    /// `<host>/v1/projects/<project>`
    project_url: String,
    credentials: Credentials,
    verifier: IdTokenVerifier,
}

impl FirebaseAuth {
    /// `emulator_host` is `host:port` of a running auth emulator.
    pub fn new(
        http: reqwest::Client,
        project_id: &str,
        emulator_host: Option<&str>,
        credentials: Credentials,
        verifier: IdTokenVerifier,
    ) -> Self {
        let host = match emulator_host {
            Some(h) => format!("http://{h}/identitytoolkit.googleapis.com"),
            None => PRODUCTION_HOST.to_string(),
        };

        Self {
            http,
            project_url: format!("{host}/v1/projects/{project_id}"),
            credentials,
            verifier,
        }
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/{op}", self.project_url)
    }

    async fn post<B, R>(&self, op: &str, body: &B) -> ProviderResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(op)).json(body);
        self.send(op, request).await
    }

    async fn get<R>(&self, op: &str) -> ProviderResult<R>
    where
        R: DeserializeOwned,
    {
        let request = self.http.get(self.endpoint(op));
        self.send(op, request).await
    }

    async fn send<R>(&self, op: &str, request: reqwest::RequestBuilder) -> ProviderResult<R>
    where
        R: DeserializeOwned,
    {
        let bearer = self.credentials.bearer(&self.http).await?;

        let resp = request
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        if !status.is_success() {
            let err = wire::map_server_error(status, &text);
            tracing::debug!(op, status = %status, code = %err.code, "identity toolkit call failed");
            return Err(err);
        }

        serde_json::from_str(&text)
            .map_err(|e| ProviderError::internal(format!("unexpected response from {op}: {e}")))
    }
}

#[async_trait]
impl IdentityProvider for FirebaseAuth {
    fn backend_name(&self) -> &'static str {
        "firebase"
    }

    async fn verify_id_token(&self, token: &str) -> ProviderResult<VerifiedIdToken> {
        self.verifier.verify(&self.http, token).await
    }

    async fn create_user(&self, user: NewUser) -> ProviderResult<String> {
        let resp: wire::SignUpResponse = self
            .post(
                "accounts",
                &wire::SignUpRequest {
                    email: &user.email,
                    password: &user.password,
                    display_name: &user.display_name,
                },
            )
            .await?;

        Ok(resp.local_id)
    }

    async fn set_custom_user_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> ProviderResult<()> {
        let _: IgnoredAny = self
            .post(
                "accounts:update",
                &wire::SetAccountInfoRequest {
                    local_id: uid,
                    custom_attributes: Some(wire::encode_custom_attributes(claims)?),
                    ..Default::default()
                },
            )
            .await?;

        Ok(())
    }

    async fn list_users(&self) -> ProviderResult<Vec<UserRecord>> {
        let resp: wire::BatchGetResponse = self
            .get(&format!("accounts:batchGet?maxResults={LIST_PAGE_SIZE}"))
            .await?;

        Ok(resp.users.into_iter().map(wire::UserInfo::into_record).collect())
    }

    async fn get_user(&self, uid: &str) -> ProviderResult<UserRecord> {
        let resp: wire::LookupResponse = self
            .post("accounts:lookup", &wire::LookupRequest { local_id: [uid] })
            .await?;

        resp.users
            .into_iter()
            .next()
            .map(wire::UserInfo::into_record)
            .ok_or_else(ProviderError::user_not_found)
    }

    async fn update_user(&self, uid: &str, update: UserUpdate) -> ProviderResult<()> {
        let _: IgnoredAny = self
            .post(
                "accounts:update",
                &wire::SetAccountInfoRequest {
                    local_id: uid,
                    email: Some(&update.email),
                    password: Some(&update.password),
                    display_name: Some(&update.display_name),
                    custom_attributes: None,
                },
            )
            .await?;

        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> ProviderResult<()> {
        let _: IgnoredAny = self
            .post("accounts:delete", &wire::DeleteAccountRequest { local_id: uid })
            .await?;

        Ok(())
    }
}
