use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use time::Duration;

use crate::config::SessionConfig;

pub const SESSION_COOKIE: &str = "token";

/// httpOnly, sameSite=strict, `Secure` in production, lives as long as the token.
pub fn session_cookie(token: String, cfg: &SessionConfig, ttl: Duration) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .secure(cfg.secure_cookie)
        .same_site(SameSite::Strict)
        .max_age(ttl)
        .build()
}

/// Emits a removal for the session cookie if the request carried one.
pub fn clear_session_cookie(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionTransport;

    #[test]
    fn cookie_flags_follow_config() {
        let dev = SessionConfig {
            transport: SessionTransport::Cookie,
            secure_cookie: false,
        };
        let rendered = session_cookie("abc".into(), &dev, Duration::hours(1)).to_string();
        assert!(rendered.starts_with("token=abc"));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Max-Age=3600"));
        assert!(!rendered.contains("Secure"));

        let prod = SessionConfig {
            secure_cookie: true,
            ..dev
        };
        let rendered = session_cookie("abc".into(), &prod, Duration::hours(1)).to_string();
        assert!(rendered.contains("Secure"));
    }
}
