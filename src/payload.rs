use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use tracing::debug;

use crate::error::AppError;

pub const INVALID_BODY_MSG: &str = "Invalid request body";

/// Request body that may arrive as JSON or as a submitted HTML form.
/// Handlers answer forms with redirects and JSON with JSON.
#[derive(Debug)]
pub enum Payload<T> {
    Json(T),
    Form(T),
}

impl<T> Payload<T> {
    pub fn is_form(&self) -> bool {
        matches!(self, Payload::Form(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Payload::Json(v) | Payload::Form(v) => v,
        }
    }
}

#[async_trait]
impl<T, S> FromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        if is_form {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.body_text()))?;
            Ok(Payload::Form(value))
        } else {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| rejected(e.body_text()))?;
            Ok(Payload::Json(value))
        }
    }
}

/// Parser detail goes to the log, the client only learns the body was bad.
fn rejected(detail: String) -> AppError {
    debug!(%detail, "request body rejected");
    AppError::Validation(INVALID_BODY_MSG.into())
}

/// Accepts a JSON boolean or an HTML checkbox value (`"true"`, `"on"`, `"1"`).
pub fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => b,
        Raw::Text(s) => matches!(s.trim(), "true" | "on" | "1"),
    })
}

/// Accepts an identifier sent either as a string or as a bare number.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Int(n) => n.to_string(),
    })
}
