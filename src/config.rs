use serde::Deserialize;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// How `/login` hands the session token to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionTransport {
    /// httpOnly cookie named `token`; the body never carries the token.
    Cookie,
    /// JSON body `{ token }` for clients that send `Authorization: Bearer`.
    Bearer,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub transport: SessionTransport,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResetConfig {
    pub ttl_minutes: i64,
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
    pub jwt: JwtConfig,
    pub session: SessionConfig,
    pub reset: ResetConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let secret = required("JWT_SECRET")?;
        let database_url = required("DATABASE_URL")?;

        let port = match get("APP_PORT") {
            Some(v) => v.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "APP_PORT",
                reason: e.to_string(),
            })?,
            None => 8080,
        };

        let transport = match get("AUTH_TRANSPORT").as_deref() {
            None | Some("cookie") => SessionTransport::Cookie,
            Some("bearer") => SessionTransport::Bearer,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "AUTH_TRANSPORT",
                    reason: format!("expected `cookie` or `bearer`, got `{other}`"),
                })
            }
        };

        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "reelshelf".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "reelshelf-users".into()),
            ttl_minutes: minutes(get("JWT_TTL_MINUTES"), "JWT_TTL_MINUTES")?,
        };

        Ok(Self {
            database_url,
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            cors_origin: get("CORS_ORIGIN"),
            jwt,
            session: SessionConfig {
                transport,
                secure_cookie: get("APP_ENV").as_deref() == Some("production"),
            },
            reset: ResetConfig {
                ttl_minutes: minutes(get("RESET_TTL_MINUTES"), "RESET_TTL_MINUTES")?,
                public_url: get("APP_PUBLIC_URL")
                    .unwrap_or_else(|| "http://localhost:8080".into())
                    .trim_end_matches('/')
                    .to_string(),
            },
        })
    }
}

fn minutes(raw: Option<String>, name: &'static str) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(60);
    };
    match raw.parse::<i64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a positive number of minutes, got `{raw}`"),
        }),
    }
}
