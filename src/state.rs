use std::sync::Arc;

use crate::auth::jwt::JwtKeys;
use crate::config::AppConfig;
use crate::mail::{LogMailer, ResetMailer};
use crate::store::{self, DynUserStore};

#[derive(Clone)]
pub struct AppState {
    pub store: DynUserStore,
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub mailer: Arc<dyn ResetMailer>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store = store::connect(&config.database_url).await?;
        let mailer = Arc::new(LogMailer) as Arc<dyn ResetMailer>;
        Ok(Self::from_parts(store, Arc::new(config), mailer))
    }

    pub fn from_parts(
        store: DynUserStore,
        config: Arc<AppConfig>,
        mailer: Arc<dyn ResetMailer>,
    ) -> Self {
        let keys = JwtKeys::new(&config.jwt);
        Self {
            store,
            config,
            keys,
            mailer,
        }
    }

    /// In-memory state with a recording mailer, for tests.
    #[cfg(test)]
    pub fn fake() -> (Self, crate::mail::RecordingMailer) {
        Self::fake_with(|_| {})
    }

    #[cfg(test)]
    pub fn fake_with(
        tweak: impl FnOnce(&mut AppConfig),
    ) -> (Self, crate::mail::RecordingMailer) {
        use crate::config::{JwtConfig, ResetConfig, SessionConfig, SessionTransport};
        use crate::mail::RecordingMailer;
        use crate::store::MemoryUserStore;

        let mut config = AppConfig {
            database_url: "memory://".into(),
            host: "127.0.0.1".into(),
            port: 0,
            cors_origin: None,
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 60,
            },
            session: SessionConfig {
                transport: SessionTransport::Cookie,
                secure_cookie: false,
            },
            reset: ResetConfig {
                ttl_minutes: 60,
                public_url: "http://reel.test".into(),
            },
        };
        tweak(&mut config);

        let mailer = RecordingMailer::default();
        let state = Self::from_parts(
            Arc::new(MemoryUserStore::default()),
            Arc::new(config),
            Arc::new(mailer.clone()),
        );
        (state, mailer)
    }
}
