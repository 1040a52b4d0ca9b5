//! Outbound account mail.
//!
//! Registration hands the activation token to a [`Mailer`]. Delivery runs in
//! the background and failures are logged only; the registration response
//! does not wait for it.

use async_trait::async_trait;
use thiserror::Error;

use crate::data::{Token, User};

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailerError(pub String);

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation(&self, user: &User, token: &Token) -> Result<(), MailerError>;
}

/// Records that an activation mail would have been sent.
///
/// Only the recipient and expiry are logged. The token plaintext belongs to
/// the recipient alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation(&self, user: &User, token: &Token) -> Result<(), MailerError> {
        tracing::info!(
            user_id = user.id,
            email = %user.email,
            expiry = %token.expiry,
            "Activation token issued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use chrono::Utc;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::data::{PasswordHash, Scope, MIN_PASSWORD_COST};

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

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_log_mailer_never_logs_plaintext() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let user = User {
            id: 7,
            created_at: Utc::now(),
            name: "Faith".into(),
            email: "faith@example.com".into(),
            password: PasswordHash::new("pa55word!", MIN_PASSWORD_COST).unwrap(),
            activated: false,
            version: 1,
        };
        let token = Token::generate(user.id, Duration::from_secs(60), Scope::Activation);

        LogMailer.send_activation(&user, &token).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Activation token issued"), "{output}");
        assert!(output.contains("faith@example.com"));
        assert!(!output.contains(&token.plaintext), "{output}");
    }
}
