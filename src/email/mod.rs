// Outbound email: verification messages and address checks

pub mod maileroo;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::MailerooConfig;

pub use maileroo::MailerooClient;

/// Email provider failures
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("email provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("email provider rejected the request: {0}")]
    Provider(String),
}

/// Email provider capabilities used during registration
#[async_trait]
pub trait EmailApi: Send + Sync {
    /// Send an HTML message
    async fn send(&self, to: &str, html: &str, subject: &str) -> Result<(), EmailError>;

    /// Whether the address looks deliverable
    async fn check(&self, email: &str) -> Result<bool, EmailError>;
}

/// Mailer used when no provider keys are configured
///
/// Logs instead of sending and accepts every address.
pub struct LogMailer;

#[async_trait]
impl EmailApi for LogMailer {
    async fn send(&self, to: &str, html: &str, subject: &str) -> Result<(), EmailError> {
        tracing::info!("Email to {} [{}]: {}", to, subject, html);
        Ok(())
    }

    async fn check(&self, email: &str) -> Result<bool, EmailError> {
        tracing::debug!("Skipping deliverability check for {}", email);
        Ok(true)
    }
}

/// Pick the provider adapter for this configuration
pub fn mailer_from_config(config: &MailerooConfig) -> Result<Arc<dyn EmailApi>, EmailError> {
    if config.is_configured() {
        tracing::info!("Using Maileroo email provider");
        Ok(Arc::new(MailerooClient::new(config.clone())?))
    } else {
        tracing::warn!("Maileroo API keys not configured, emails will only be logged");
        Ok(Arc::new(LogMailer))
    }
}

/// Body of the verification email
pub fn verification_email(code: &str) -> String {
    format!("Your code is: <b>{}</b>", code)
}
