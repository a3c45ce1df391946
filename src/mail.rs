use async_trait::async_trait;
use tracing::info;

/// Outbound channel for password-reset links.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset_link(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

/// Records dispatch in the log only. The link carries a live credential, so
/// only its length is logged.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl ResetMailer for LogMailer {
    async fn send_reset_link(&self, to: &str, link: &str) -> anyhow::Result<()> {
        info!(to = %to, link_len = link.len(), "password reset link dispatched");
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingMailer;


#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_mailer_never_writes_the_token() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter("reelshelf=trace,axum=info,tower_http=info")
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogMailer
            .send_reset_link("ann@x.com", "http://reel.test/reset-password?token=SECRETTOKEN123")
            .await
            .unwrap();

        let out = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(out.contains("password reset link dispatched"));
        assert!(!out.contains("SECRETTOKEN123"));
    }
}
