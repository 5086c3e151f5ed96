//! Delivery of email validation codes.
//!
//! Providers:
//! - `console`: logs the message (development). The code itself is only
//!   printed when `email.log_codes` is enabled.
//! - `sendgrid`: SendGrid v3 mail API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::config::EmailConfig;

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Errors that can occur while dispatching an email.
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Email provider not configured: {0}")]
    NotConfigured(String),

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Email message to be sent.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
}

/// Outbound dispatcher seam; the orchestrator only sees this trait.
#[async_trait]
pub trait EmailDispatcher: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// Context rendered into a validation-code email.
#[derive(Debug, Clone)]
pub struct ValidationCodeEmail<'a> {
    pub to: &'a str,
    pub form_name: &'a str,
    pub code: &'a str,
    pub expires_at: DateTime<Utc>,
}

/// Renders the validation code message.
pub fn validation_code_message(
    config: &EmailConfig,
    email: &ValidationCodeEmail<'_>,
) -> EmailMessage {
    let subject = format!("Your verification code for {}", email.form_name);
    let expires = email.expires_at.format("%H:%M UTC");

    let body_text = format!(
        "Your verification code for \"{form}\" is:\n\n{code}\n\n\
         The code is valid until {expires}. If you did not fill in this form, \
         you can ignore this message.\n\n{sender}",
        form = email.form_name,
        code = email.code,
        expires = expires,
        sender = config.sender_name,
    );

    let body_html = (config.template_style == "html").then(|| {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{subject}</title></head>
<body style="font-family: Georgia, serif; color: #2b2b2b; max-width: 560px; margin: 0 auto; padding: 24px;">
    <p>Your verification code for <strong>{form}</strong> is:</p>
    <p style="font-size: 28px; letter-spacing: 6px; font-weight: bold; text-align: center;">{code}</p>
    <p style="color: #666; font-size: 14px;">The code is valid until {expires}. If you did not fill in this form, you can ignore this message.</p>
    <p style="color: #999; font-size: 12px;">{sender}</p>
</body>
</html>"#,
            subject = html_escape(&subject),
            form = html_escape(email.form_name),
            code = email.code,
            expires = expires,
            sender = html_escape(&config.sender_name),
        )
    });

    EmailMessage {
        to: email.to.to_string(),
        subject,
        body_text,
        body_html,
    }
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Config-driven dispatcher.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    async fn send_console(&self, message: EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            from = %self.config.sender_email,
            "Email (console provider)"
        );
        if self.config.log_codes {
            info!(body_text = %message.body_text, "Email body (console provider)");
        }
        Ok(())
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), EmailError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(EmailError::NotConfigured(
                "sendgrid_api_key is empty".to_string(),
            ));
        }

        let mut content = vec![serde_json::json!({
            "type": "text/plain",
            "value": message.body_text
        })];
        if let Some(html) = &message.body_html {
            content.push(serde_json::json!({
                "type": "text/html",
                "value": html
            }));
        }

        let body = serde_json::json!({
            "personalizations": [{ "to": [{ "email": message.to }] }],
            "from": {
                "email": self.config.sender_email,
                "name": self.config.sender_name
            },
            "subject": message.subject,
            "content": content
        });

        let response = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmailError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %message.to, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(EmailError::ProviderError(format!(
                "SendGrid returned {}",
                status
            )))
        }
    }
}

#[async_trait]
impl EmailDispatcher for EmailService {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            other => {
                error!(provider = %other, "Unknown email provider");
                Err(EmailError::NotConfigured(format!(
                    "unknown provider '{}'",
                    other
                )))
            }
        }
    }
}
