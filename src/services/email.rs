use async_trait::async_trait;

/// Outgoing mail kinds the auth flows produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailKind {
    Verification,
    PasswordReset,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub kind: EmailKind,
    pub to: String,
    pub subject: String,
    /// Link the recipient follows; embeds the single-use token.
    pub link: String,
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
#[error("Email delivery failed: {0}")]
pub struct EmailError(pub String);

/// Mail transport seam. Delivery itself lives outside this service.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError>;
}

/// Transport used when no mail relay is configured: records the delivery without its token.
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: OutgoingEmail) -> Result<(), EmailError> {
        tracing::info!(
            to = %email.to,
            kind = ?email.kind,
            subject = %email.subject,
            "Email queued for delivery"
        );
        Ok(())
    }
}

pub fn verification_email(app_url: &str, to: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        kind: EmailKind::Verification,
        to: to.to_string(),
        subject: "Verify your email address".to_string(),
        link: format!("{}/verify-email?token={}", app_url.trim_end_matches('/'), token),
        token: token.to_string(),
    }
}

pub fn password_reset_email(app_url: &str, to: &str, token: &str) -> OutgoingEmail {
    OutgoingEmail {
        kind: EmailKind::PasswordReset,
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        link: format!("{}/reset-password?token={}", app_url.trim_end_matches('/'), token),
        token: token.to_string(),
    }
}
