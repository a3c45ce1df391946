use axum::{
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::cookie::{clear_session_cookie, session_cookie};
use super::dto::{
    ForgotPasswordRequest, LoginRequest, LoginResponse, MessageResponse, ProfileUpdateRequest,
    PublicUser, ResetPasswordRequest, SignupRequest, UserProfile,
};
use super::extractors::{AuthUser, PageUser};
use super::services::{self, RESET_REQUESTED_MSG};
use crate::{config::SessionTransport, error::AppError, payload::Payload, state::AppState};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/reset-password/:token", post(reset_password_with_path_token))
}

pub fn me_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route("/profile", put(update_profile))
        .route("/dashboard", get(dashboard))
        .route("/:id", get(get_user))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Payload<SignupRequest>,
) -> Result<Response, AppError> {
    let is_form = payload.is_form();
    match services::signup(&state, payload.into_inner()).await {
        Ok(_) if is_form => Ok(Redirect::to("/login").into_response()),
        Ok(user) => Ok(Json(PublicUser::from(user)).into_response()),
        Err(e) if is_form => Ok(e.into_form_response("/signup")),
        Err(e) => Err(e),
    }
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Payload<LoginRequest>,
) -> Result<Response, AppError> {
    let is_form = payload.is_form();
    let (user, token) = match services::login(&state, payload.into_inner()).await {
        Ok(found) => found,
        Err(e) if is_form => return Ok(e.into_form_response("/login")),
        Err(e) => return Err(e),
    };

    match state.config.session.transport {
        SessionTransport::Cookie => {
            let jar = jar.add(session_cookie(token, &state.config.session, state.keys.ttl()));
            if is_form {
                Ok((jar, Redirect::to("/")).into_response())
            } else {
                let body = LoginResponse {
                    token: None,
                    user: user.into(),
                };
                Ok((jar, Json(body)).into_response())
            }
        }
        SessionTransport::Bearer => Ok(Json(LoginResponse {
            token: Some(token),
            user: user.into(),
        })
        .into_response()),
    }
}

/// Clears the cookie client-side. Tokens are stateless, so a copy of the
/// token stays valid until it expires.
#[instrument(skip_all)]
pub async fn logout(jar: CookieJar, user: Option<PageUser>) -> (CookieJar, Redirect) {
    if let Some(PageUser(user)) = user {
        info!(user_id = %user.id, "user logged out");
    }
    (clear_session_cookie(jar), Redirect::to("/login"))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::current_user(&state, auth.id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Payload<ProfileUpdateRequest>,
) -> Result<Json<PublicUser>, AppError> {
    let user = services::update_profile(&state, auth.id, payload.into_inner()).await?;
    Ok(Json(user.into()))
}

/// Page route: greets the user or sends them back to the login page.
#[instrument(skip(state, jar))]
pub async fn dashboard(
    State(state): State<AppState>,
    jar: CookieJar,
    PageUser(auth): PageUser,
) -> Response {
    match services::current_user(&state, auth.id).await {
        Ok(user) => format!("Welcome {}!", user.username).into_response(),
        Err(e) => {
            warn!(error = %e, user_id = %auth.id, "dashboard session has no user");
            (clear_session_cookie(jar), Redirect::to("/login")).into_response()
        }
    }
}

/// Owner-only profile lookup.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, AppError> {
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;
    if id != auth.id {
        warn!(requested = %id, user_id = %auth.id, "profile access denied");
        return Err(AppError::Forbidden);
    }
    let user = state.store.find_by_id(id).await?.ok_or(AppError::NotFound)?;
    Ok(Json(user.into()))
}

/// Always answers with the same message, even for a body it cannot read.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Payload<ForgotPasswordRequest>, AppError>,
) -> Json<MessageResponse> {
    match payload {
        Ok(payload) => {
            services::request_password_reset(&state, payload.into_inner().email);
        }
        Err(e) => debug!(error = %e, "unreadable forgot-password body"),
    }
    Json(MessageResponse::new(RESET_REQUESTED_MSG))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Payload<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = payload.into_inner();
    let token = req.token.unwrap_or_default();
    services::confirm_password_reset(&state, &token, req.new_password, &req.confirm_new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}

#[instrument(skip(state, token, payload))]
pub async fn reset_password_with_path_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    payload: Payload<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let req = payload.into_inner();
    services::confirm_password_reset(&state, &token, req.new_password, &req.confirm_new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}
