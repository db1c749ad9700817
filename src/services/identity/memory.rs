//! In-process identity provider for router tests.
//!
//! Mirrors the provider's error codes for the cases the handlers can hit and
//! counts mutating calls so tests can assert the provider was never reached.
//! `fail_next` makes one named call fail, for partial-failure paths.
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::services::access::Role;
use crate::services::identity::{
    CustomClaims, IdentityProvider, NewUser, ProviderError, ProviderResult, UserMetadata,
    UserRecord, UserUpdate, VerifiedIdToken,
};

#[derive(Debug, Default)]
struct Store {
    users: HashMap<String, UserRecord>,
    /// token -> uid
    sessions: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
    store: RwLock<Store>,
    calls: AtomicUsize,
    /// trait method name -> error returned by its next call
    failures: Mutex<HashMap<&'static str, ProviderError>>,
}

impl MemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user directly and return a bearer token for them.
    pub async fn seed(&self, uid: &str, email: &str, role: Option<Role>) -> String {
        let record = UserRecord {
            uid: uid.to_string(),
            email: Some(email.to_string()),
            display_name: Some(uid.to_string()),
            custom_claims: role.map(CustomClaims::with_role),
            metadata: UserMetadata {
                creation_time: Some(Utc::now()),
                last_sign_in_time: None,
            },
        };

        let token = format!("token-{uid}");
        let mut store = self.store.write().await;
        store.users.insert(uid.to_string(), record);
        store.sessions.insert(token.clone(), uid.to_string());
        token
    }

    /// Number of provider calls made through the trait (token checks excluded).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn user(&self, uid: &str) -> Option<UserRecord> {
        self.store.read().await.users.get(uid).cloned()
    }

    /// Make the next call of `op` (a trait method name) fail with `err`.
    pub fn fail_next(&self, op: &'static str, err: ProviderError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    fn record_call(&self, op: &str) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn check_password(password: &str) -> ProviderResult<()> {
    if password.len() < 6 {
        return Err(ProviderError::new(
            "auth/invalid-password",
            "The password must be a string with at least 6 characters.",
        ));
    }
    Ok(())
}

fn email_taken(store: &Store, email: &str, except: Option<&str>) -> bool {
    store
        .users
        .values()
        .any(|u| u.email.as_deref() == Some(email) && Some(u.uid.as_str()) != except)
}

fn email_exists() -> ProviderError {
    ProviderError::new(
        "auth/email-already-exists",
        "The email address is already in use by another account.",
    )
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn verify_id_token(&self, token: &str) -> ProviderResult<VerifiedIdToken> {
        let store = self.store.read().await;
        let uid = store
            .sessions
            .get(token)
            .ok_or_else(|| ProviderError::invalid_id_token("Decoding Firebase ID token failed."))?;
        let user = store.users.get(uid).ok_or_else(ProviderError::user_not_found)?;

        Ok(VerifiedIdToken {
            uid: user.uid.clone(),
            email: user.email.clone(),
            role: user.role(),
        })
    }

    async fn create_user(&self, user: NewUser) -> ProviderResult<String> {
        self.record_call("create_user")?;
        check_password(&user.password)?;

        let mut store = self.store.write().await;
        if email_taken(&store, &user.email, None) {
            return Err(email_exists());
        }

        let uid = Uuid::new_v4().simple().to_string();
        store.users.insert(
            uid.clone(),
            UserRecord {
                uid: uid.clone(),
                email: Some(user.email),
                display_name: Some(user.display_name),
                custom_claims: None,
                metadata: UserMetadata {
                    creation_time: Some(Utc::now()),
                    last_sign_in_time: None,
                },
            },
        );
        Ok(uid)
    }

    async fn set_custom_user_claims(
        &self,
        uid: &str,
        claims: &CustomClaims,
    ) -> ProviderResult<()> {
        self.record_call("set_custom_user_claims")?;
        let mut store = self.store.write().await;
        let user = store
            .users
            .get_mut(uid)
            .ok_or_else(ProviderError::user_not_found)?;
        user.custom_claims = Some(claims.clone());
        Ok(())
    }

    async fn list_users(&self) -> ProviderResult<Vec<UserRecord>> {
        self.record_call("list_users")?;
        let store = self.store.read().await;
        let mut users: Vec<_> = store.users.values().cloned().collect();
        users.sort_by(|a, b| a.uid.cmp(&b.uid));
        Ok(users)
    }

    async fn get_user(&self, uid: &str) -> ProviderResult<UserRecord> {
        self.record_call("get_user")?;
        self.store
            .read()
            .await
            .users
            .get(uid)
            .cloned()
            .ok_or_else(ProviderError::user_not_found)
    }

    async fn update_user(&self, uid: &str, update: UserUpdate) -> ProviderResult<()> {
        self.record_call("update_user")?;
        check_password(&update.password)?;

        let mut store = self.store.write().await;
        if !store.users.contains_key(uid) {
            return Err(ProviderError::user_not_found());
        }
        if email_taken(&store, &update.email, Some(uid)) {
            return Err(email_exists());
        }
        if let Some(user) = store.users.get_mut(uid) {
            user.email = Some(update.email);
            user.display_name = Some(update.display_name);
        }
        Ok(())
    }

    async fn delete_user(&self, uid: &str) -> ProviderResult<()> {
        self.record_call("delete_user")?;
        let mut store = self.store.write().await;
        store
            .users
            .remove(uid)
            .ok_or_else(ProviderError::user_not_found)?;
        store.sessions.retain(|_, owner| owner != uid);
        Ok(())
    }
}
