// Maileroo HTTP API client

use async_trait::async_trait;
use reqwest::multipart::Form;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::config::MailerooConfig;
use crate::email::{EmailApi, EmailError};

const SEND_URL: &str = "https://smtp.maileroo.com/send";
const CHECK_URL: &str = "https://verify.maileroo.net/check";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct CheckData {
    #[serde(default)]
    format_valid: bool,
    #[serde(default)]
    mx_found: bool,
    #[serde(default)]
    disposable: bool,
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    success: bool,
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: CheckData,
}

impl CheckData {
    fn is_deliverable(&self) -> bool {
        self.format_valid && self.mx_found && !self.disposable
    }
}

/// Sends mail and checks addresses through maileroo.com
pub struct MailerooClient {
    client: reqwest::Client,
    config: MailerooConfig,
    send_url: String,
    check_url: String,
}

impl MailerooClient {
    pub fn new(config: MailerooConfig) -> Result<Self, EmailError> {
        Self::with_endpoints(config, SEND_URL, CHECK_URL, REQUEST_TIMEOUT)
    }

    /// Requests that take longer than `timeout` fail with a transport error
    pub fn with_endpoints(
        config: MailerooConfig,
        send_url: &str,
        check_url: &str,
        timeout: Duration,
    ) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            config,
            send_url: send_url.to_string(),
            check_url: check_url.to_string(),
        })
    }
}

#[async_trait]
impl EmailApi for MailerooClient {
    async fn send(&self, to: &str, html: &str, subject: &str) -> Result<(), EmailError> {
        let form = Form::new()
            .text("from", self.config.from_email.clone())
            .text("to", to.to_string())
            .text("subject", subject.to_string())
            .text("html", html.to_string());

        let response: SendResponse = self
            .client
            .post(&self.send_url)
            .header("X-API-Key", self.config.sending_api_key.clone().unwrap_or_default())
            .multipart(form)
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(EmailError::Provider(response.message));
        }

        tracing::debug!("Sent '{}' email to {}", subject, to);
        Ok(())
    }

    async fn check(&self, email: &str) -> Result<bool, EmailError> {
        let response: CheckResponse = self
            .client
            .post(&self.check_url)
            .header(
                "X-API-Key",
                self.config.verification_api_key.clone().unwrap_or_default(),
            )
            .json(&json!({ "email_address": email }))
            .send()
            .await?
            .json()
            .await?;

        if !response.success {
            return Err(EmailError::Provider(format!(
                "{} - {}",
                response.error_code, response.message
            )));
        }

        Ok(response.data.is_deliverable())
    }
}
