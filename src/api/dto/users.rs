/*
 * Responsibility
 * - Users request/response DTOs
 * - validate(): presence checks before any provider call
 * - UserView: the public shape of a provider user record
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::access::Role;
use crate::services::identity::{NewUser, UserRecord, UserUpdate};

pub const MISSING_FIELDS: &str = "Missing fields";
pub const INVALID_ROLE: &str = "Invalid role";

/// Body of `POST /users` and `PATCH /users/{id}`.
///
/// Every field is optional at the serde level so that an incomplete body
/// reaches `validate()` and gets the 400 `Missing fields` answer.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRequest {
    pub display_name: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

pub type CreateUserRequest = UserRequest;
pub type UpdateUserRequest = UserRequest;

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFields {
    pub display_name: String,
    pub password: String,
    pub email: String,
    pub role: Role,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|v| !v.is_empty())
}

impl UserRequest {
    pub fn validate(&self) -> Result<UserFields, &'static str> {
        let (Some(display_name), Some(password), Some(email), Some(role)) = (
            present(&self.display_name),
            present(&self.password),
            present(&self.email),
            present(&self.role),
        ) else {
            return Err(MISSING_FIELDS);
        };

        let role = role.parse::<Role>().map_err(|_| INVALID_ROLE)?;

        Ok(UserFields {
            display_name: display_name.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            role,
        })
    }
}

impl UserFields {
    pub fn into_new_user(self) -> (NewUser, Role) {
        (
            NewUser {
                email: self.email,
                password: self.password,
                display_name: self.display_name,
            },
            self.role,
        )
    }

    pub fn into_update(self) -> (UserUpdate, Role) {
        (
            UserUpdate {
                email: self.email,
                password: self.password,
                display_name: self.display_name,
            },
            self.role,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct CreateUserResponse {
    pub uid: String,
}

/// Public view of a user record. Unset strings render as `""`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub last_sign_in_time: Option<String>,
    pub creation_time: Option<String>,
}

/// `Tue, 19 Oct 2026 06:10:00 GMT`
fn http_date(t: DateTime<Utc>) -> String {
    t.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        let role = user.role().map(|r| r.to_string()).unwrap_or_default();
        Self {
            uid: user.uid,
            email: user.email.unwrap_or_default(),
            display_name: user.display_name.unwrap_or_default(),
            role,
            last_sign_in_time: user.metadata.last_sign_in_time.map(http_date),
            creation_time: user.metadata.creation_time.map(http_date),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: UserView,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserView>,
}
