use lazy_static::lazy_static;
use regex::Regex;
use time::{Duration, OffsetDateTime};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::dto::{LoginRequest, ProfileUpdateRequest, SignupRequest};
use super::password::{hash_password_blocking, verify_password_blocking};
use super::reset;
use crate::error::AppError;
use crate::state::AppState;
use crate::store::{NewUser, StoreError, User};

pub const RESET_REQUESTED_MSG: &str =
    "If that email is registered, a password reset link is on its way.";

const MIN_PASSWORD_LEN: usize = 8;
const MAX_USERNAME_LEN: usize = 50;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email".into()))
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() {
        return Err(AppError::Validation("Username is required".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation("Username is too long".into()));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Creates an account. Checks run in order: field shape, password
/// confirmation, terms, then uniqueness.
pub async fn signup(state: &AppState, req: SignupRequest) -> Result<User, AppError> {
    let username = req.username.trim().to_string();
    let email = normalize_email(&req.email);

    validate_username(&username)?;
    validate_email(&email)?;
    if req.password != req.confirm_password {
        return Err(AppError::PasswordMismatch);
    }
    if !req.terms_accepted {
        return Err(AppError::TermsNotAccepted);
    }
    validate_password(&req.password)?;

    let existing = state
        .store
        .find_by_email(&email)
        .await
        .map_err(AppError::RegistrationFailed)?;
    if existing.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::DuplicateEmail);
    }
    let existing = state
        .store
        .find_by_username(&username)
        .await
        .map_err(AppError::RegistrationFailed)?;
    if existing.is_some() {
        warn!(username = %username, "username already taken");
        return Err(AppError::DuplicateUsername);
    }

    let password_hash = hash_password_blocking(req.password).await?;

    // The store re-checks uniqueness, which covers signups racing past the lookups above.
    let user = state
        .store
        .create(NewUser {
            username,
            email,
            password_hash,
            terms_accepted: true,
        })
        .await
        .map_err(|e| match e {
            StoreError::Duplicate(field) => AppError::from(field),
            other => AppError::RegistrationFailed(other),
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Checks credentials and mints a session token. Unknown email and wrong
/// password fail identically.
pub async fn login(state: &AppState, req: LoginRequest) -> Result<(User, String), AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation("Please enter email and password".into()));
    }

    let user = state.store.find_by_email(&email).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let ok = verify_password_blocking(req.password, stored_hash).await?;

    let user = match (user, ok) {
        (Some(user), true) => user,
        (found, _) => {
            warn!(email = %email, known = found.is_some(), "login failed");
            return Err(AppError::InvalidCredentials);
        }
    };

    let token = state
        .keys
        .issue(user.id, &user.username)
        .map_err(|e| AppError::Internal(e.into()))?;

    info!(user_id = %user.id, "user logged in");
    Ok((user, token))
}

/// Loads the record behind a session; a vanished user counts as unauthenticated.
pub async fn current_user(state: &AppState, user_id: Uuid) -> Result<User, AppError> {
    state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Unauthorized)
}

pub async fn update_profile(
    state: &AppState,
    user_id: Uuid,
    req: ProfileUpdateRequest,
) -> Result<User, AppError> {
    let username = req.name.trim().to_string();
    let email = normalize_email(&req.email);
    if username.is_empty() || email.is_empty() {
        return Err(AppError::Validation("Please fill in all fields".into()));
    }
    validate_username(&username)?;
    validate_email(&email)?;

    let user = state
        .store
        .update_profile(user_id, &username, &email)
        .await
        .map_err(|e| match e {
            StoreError::NotFound => AppError::Unauthorized,
            other => AppError::from(other),
        })?;
    info!(user_id = %user.id, "profile updated");
    Ok(user)
}

/// Starts a reset if the email is registered. Never reports whether it is,
/// and never fails towards the caller. Lookup, storage and dispatch all run
/// detached, so the caller's response time does not depend on the email.
pub fn request_password_reset(state: &AppState, email: String) -> JoinHandle<()> {
    let state = state.clone();
    tokio::spawn(async move { issue_reset(&state, &email).await })
}

async fn issue_reset(state: &AppState, email: &str) {
    let email = normalize_email(email);
    if !is_valid_email(&email) {
        return;
    }

    let user = match state.store.find_by_email(&email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            info!("password reset requested for unknown email");
            return;
        }
        Err(e) => {
            error!(error = %e, "password reset lookup failed");
            return;
        }
    };

    let token = reset::generate_token();
    let expires_at = OffsetDateTime::now_utc() + Duration::minutes(state.config.reset.ttl_minutes);
    if let Err(e) = state
        .store
        .store_reset_token(user.id, &reset::digest(&token), expires_at)
        .await
    {
        error!(error = %e, user_id = %user.id, "storing reset token failed");
        return;
    }

    let link = reset::reset_link(&state.config.reset.public_url, &token);
    if let Err(e) = state.mailer.send_reset_link(&user.email, &link).await {
        error!(error = %e, user_id = %user.id, "sending reset link failed");
        return;
    }
    info!(user_id = %user.id, "password reset issued");
}

/// Sets a new password from a reset token. The token is consumed on success.
pub async fn confirm_password_reset(
    state: &AppState,
    token: &str,
    new_password: String,
    confirm_new_password: &str,
) -> Result<Uuid, AppError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::InvalidResetToken);
    }
    if new_password != confirm_new_password {
        return Err(AppError::PasswordMismatch);
    }
    validate_password(&new_password)?;

    // Cheap lookup first so unknown tokens never cost a hash.
    let token_hash = reset::digest(token);
    if state
        .store
        .reset_token_owner(&token_hash, OffsetDateTime::now_utc())
        .await?
        .is_none()
    {
        return Err(AppError::InvalidResetToken);
    }

    let password_hash = hash_password_blocking(new_password).await?;
    let user_id = state
        .store
        .reset_password(&token_hash, &password_hash, OffsetDateTime::now_utc())
        .await?
        .ok_or(AppError::InvalidResetToken)?;

    info!(user_id = %user_id, "password reset completed");
    Ok(user_id)
}
