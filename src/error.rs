use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::store::{StoreError, UniqueField};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("You must accept the terms & conditions")]
    TermsNotAccepted,
    #[error("Email already exists")]
    DuplicateEmail,
    #[error("Username already exists")]
    DuplicateUsername,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Authentication required")]
    Unauthorized,
    #[error("Session expired, please log in again")]
    TokenExpired,
    #[error("Not allowed to access this resource")]
    Forbidden,
    #[error("User not found")]
    NotFound,
    #[error("Reset link is invalid or has expired")]
    InvalidResetToken,
    #[error("An error occurred during registration")]
    RegistrationFailed(#[source] StoreError),
    #[error("storage error: {0}")]
    Storage(#[source] StoreError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Body of every error response; the browser client shows `msg`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub msg: String,
    pub code: &'static str,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::PasswordMismatch
            | AppError::TermsNotAccepted
            | AppError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail | AppError::DuplicateUsername => StatusCode::CONFLICT,
            AppError::InvalidCredentials | AppError::Unauthorized | AppError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::RegistrationFailed(_) | AppError::Storage(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PasswordMismatch => "PASSWORD_MISMATCH",
            AppError::TermsNotAccepted => "TERMS_NOT_ACCEPTED",
            AppError::DuplicateEmail => "DUPLICATE_EMAIL",
            AppError::DuplicateUsername => "DUPLICATE_USERNAME",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::NotFound => "NOT_FOUND",
            AppError::InvalidResetToken => "INVALID_RESET_TOKEN",
            AppError::RegistrationFailed(_) => "REGISTRATION_FAILED",
            AppError::Storage(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show a client. Server-side failures never leak detail.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Storage(_) | AppError::Internal(_) => {
                "Something went wrong, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<UniqueField> for AppError {
    fn from(field: UniqueField) -> Self {
        match field {
            UniqueField::Email => AppError::DuplicateEmail,
            UniqueField::Username => AppError::DuplicateUsername,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) => field.into(),
            StoreError::NotFound => AppError::NotFound,
            other => AppError::Storage(other),
        }
    }
}

impl AppError {
    /// Answer for an HTML form post: client errors send the browser back to
    /// the form with `?error=<CODE>`, server errors stay JSON.
    pub fn into_form_response(self, back_to: &str) -> Response {
        if self.status().is_client_error() {
            Redirect::to(&format!("{back_to}?error={}", self.code())).into_response()
        } else {
            self.into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, source = ?std::error::Error::source(&self), "request failed");
        }
        let body = ErrorBody {
            msg: self.public_message(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_do_not_leak_details() {
        let err = AppError::Storage(StoreError::Corrupt("row 42 has item_type=podcast".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("podcast"));
    }

    #[test]
    fn credential_errors_share_one_message() {
        assert_eq!(AppError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InvalidCredentials.public_message(), "Invalid email or password");
    }

    #[test]
    fn store_errors_map_onto_the_taxonomy() {
        assert!(matches!(AppError::from(StoreError::NotFound), AppError::NotFound));
        assert!(matches!(
            AppError::from(StoreError::Duplicate(UniqueField::Email)),
            AppError::DuplicateEmail
        ));
        assert!(matches!(
            AppError::from(StoreError::Corrupt("x".into())),
            AppError::Storage(_)
        ));
    }

    #[test]
    fn duplicate_fields_map_to_conflicts() {
        assert!(matches!(AppError::from(UniqueField::Email), AppError::DuplicateEmail));
        assert_eq!(AppError::from(UniqueField::Username).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn form_errors_redirect_back_with_the_code() {
        let res = AppError::PasswordMismatch.into_form_response("/signup");
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            res.headers()[axum::http::header::LOCATION],
            "/signup?error=PASSWORD_MISMATCH"
        );

        let res = AppError::Internal(anyhow::anyhow!("db down")).into_form_response("/signup");
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
