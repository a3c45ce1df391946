use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::payload::checkbox;
use crate::store::User;

/// Request body for signup.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[serde(default, deserialize_with = "checkbox")]
    pub terms_accepted: bool,
}

/// Request body for login. The email is the login identifier.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: Option<String>,
    pub new_password: String,
    pub confirm_new_password: String,
}

/// Response returned after login. `token` is only present for bearer transport.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub msg: String,
}

impl MessageResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
        }
    }
}

/// Owner-only view of a user record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub terms_accepted: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            terms_accepted: u.terms_accepted,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_request_reads_camel_case() {
        let req: SignupRequest = serde_json::from_str(
            r#"{"username":"ann","email":"ann@x.com","password":"Secret123!",
                "confirmPassword":"Secret123!","termsAccepted":true}"#,
        )
        .unwrap();
        assert_eq!(req.confirm_password, "Secret123!");
        assert!(req.terms_accepted);
    }

    #[test]
    fn login_response_omits_absent_token() {
        let res = LoginResponse {
            token: None,
            user: PublicUser {
                id: Uuid::new_v4(),
                username: "ann".into(),
                email: "ann@x.com".into(),
            },
        };
        let json = serde_json::to_string(&res).unwrap();
        assert!(!json.contains("token"));
        assert!(json.contains("ann@x.com"));
    }
}
