use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use tracing::{debug, warn};
use uuid::Uuid;

use super::cookie::{clear_session_cookie, SESSION_COOKIE};
use super::jwt::{JwtError, JwtKeys};
use crate::error::ErrorBody;

/// Identity resolved from a valid session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFailure {
    Missing,
    Invalid,
    Expired,
}

impl SessionFailure {
    fn code(self) -> &'static str {
        match self {
            SessionFailure::Missing => "MISSING_TOKEN",
            SessionFailure::Invalid => "INVALID_TOKEN",
            SessionFailure::Expired => "TOKEN_EXPIRED",
        }
    }

    fn message(self) -> &'static str {
        match self {
            SessionFailure::Missing => "Authentication required",
            SessionFailure::Invalid => "Invalid session, please log in again",
            SessionFailure::Expired => "Session expired, please log in again",
        }
    }
}

/// Why a request was turned away, plus the cookies it came with so a stale
/// session cookie can be cleared in the response.
#[derive(Debug)]
pub struct SessionRejection {
    pub failure: SessionFailure,
    jar: CookieJar,
    from_cookie: bool,
}

impl SessionRejection {
    fn cleanup(self) -> CookieJar {
        if self.from_cookie {
            clear_session_cookie(self.jar)
        } else {
            self.jar
        }
    }
}

/// Cookie `token` wins over `Authorization: Bearer`. Returns the token and
/// whether it came from the cookie.
fn locate_token(headers: &HeaderMap, jar: &CookieJar) -> Option<(String, bool)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some((cookie.value().to_string(), true));
        }
    }
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then(|| (token.to_string(), false))
}

/// The single authorization gate: find the token, verify it, resolve identity.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, SessionRejection> {
    let jar = CookieJar::from_headers(headers);
    let Some((token, from_cookie)) = locate_token(headers, &jar) else {
        debug!("no session token presented");
        return Err(SessionRejection {
            failure: SessionFailure::Missing,
            jar,
            from_cookie: false,
        });
    };

    match keys.verify(&token) {
        Ok(claims) => Ok(AuthUser {
            id: claims.sub,
            username: claims.username,
        }),
        Err(e) => {
            let failure = match e {
                JwtError::Expired => SessionFailure::Expired,
                _ => SessionFailure::Invalid,
            };
            warn!(?failure, from_cookie, "session token rejected");
            Err(SessionRejection {
                failure,
                jar,
                from_cookie,
            })
        }
    }
}

/// Rejection for API routes: `401 { msg, code }`.
pub struct ApiRejection(pub SessionRejection);

impl IntoResponse for ApiRejection {
    fn into_response(self) -> Response {
        let failure = self.0.failure;
        let body = ErrorBody {
            msg: failure.message().to_string(),
            code: failure.code(),
        };
        (StatusCode::UNAUTHORIZED, self.0.cleanup(), Json(body)).into_response()
    }
}

/// Rejection for page routes: back to the login page, silently.
pub struct PageRejection(pub SessionRejection);

impl IntoResponse for PageRejection {
    fn into_response(self) -> Response {
        (self.0.cleanup(), Redirect::to("/login")).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authenticate(&parts.headers, &keys).map_err(ApiRejection)
    }
}

/// Same gate as [`AuthUser`], for routes that render pages.
#[derive(Debug, Clone)]
pub struct PageUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for PageUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = PageRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        authenticate(&parts.headers, &keys)
            .map(PageUser)
            .map_err(PageRejection)
    }
}
