//! Outbound transactional email
//!
//! Messages are rendered in-process from a small template set and sent
//! through the Resend API. Transient failures are retried with backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

/// Invitation sent on registration. Data: `username`, `activationURL`.
pub const USER_INVITATION_TEMPLATE: &str = "user_invitation";

/// Total delivery attempts, including the first
pub const MAX_ATTEMPTS: usize = 3;

const RESEND_API_BASE: &str = "https://api.resend.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// Notification sender
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Render `template_id` with `data` and deliver it.
    ///
    /// With `sandbox` set the message is rendered but not dispatched.
    async fn send(
        &self,
        template_id: &str,
        recipient_name: &str,
        recipient_email: &str,
        data: &Value,
        sandbox: bool,
    ) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Unknown email template: {0}")]
    UnknownTemplate(String),
    #[error("Template data is missing `{0}`")]
    MissingField(&'static str),
    #[error("Email transport error: {0}")]
    Transport(String),
    #[error("Email provider returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Email delivery failed after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: Box<MailError> },
}

impl MailError {
    /// Worth another attempt: network trouble, rate limiting or provider errors.
    pub fn is_transient(&self) -> bool {
        match self {
            MailError::Transport(_) => true,
            MailError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A rendered message, ready to dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

/// Render a known template against its data
pub fn render_template(
    template_id: &str,
    app_name: &str,
    data: &Value,
) -> Result<RenderedEmail, MailError> {
    match template_id {
        USER_INVITATION_TEMPLATE => {
            let username = field(data, "username")?;
            let activation_url = field(data, "activationURL")?;
            Ok(user_invitation(app_name, &escape_html(username), &escape_html(activation_url)))
        }
        other => Err(MailError::UnknownTemplate(other.to_string())),
    }
}

fn field<'a>(data: &'a Value, name: &'static str) -> Result<&'a str, MailError> {
    data.get(name)
        .and_then(Value::as_str)
        .ok_or(MailError::MissingField(name))
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn user_invitation(app_name: &str, username: &str, activation_url: &str) -> RenderedEmail {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #6366f1;">Welcome to {app_name}, {username}!</h2>
    <p>Thanks for signing up. Confirm your email address to activate your account.</p>
    <p>
        <a href="{activation_url}" style="display: inline-block; padding: 14px 28px; background-color: #6366f1; color: white; text-decoration: none; border-radius: 6px; font-weight: bold; font-size: 16px;">
            Activate Account
        </a>
    </p>
    <p style="color: #666; font-size: 14px;">
        If the button doesn't work, paste this link into your browser:<br>
        {activation_url}
    </p>
    <p style="color: #666; font-size: 14px;">
        If you didn't create an account, you can safely ignore this email.
    </p>
    <hr style="border: none; border-top: 1px solid #eee; margin: 20px 0;">
    <p style="color: #999; font-size: 12px;">{app_name}</p>
</body>
</html>"#,
    );

    RenderedEmail {
        subject: format!("Finish registration with {}", app_name),
        html,
    }
}

/// Email configuration
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Resend API key. Empty means messages are logged only.
    pub resend_api_key: String,
    /// From address for emails
    pub email_from: String,
    /// App name for branding
    pub app_name: String,
    /// Resend endpoint base
    pub api_base: String,
}

impl EmailConfig {
    pub fn new(resend_api_key: String, email_from: String) -> Self {
        Self {
            resend_api_key,
            email_from,
            app_name: "SocialNet".to_string(),
            api_base: RESEND_API_BASE.to_string(),
        }
    }

    /// Check if email sending is enabled
    pub fn is_enabled(&self) -> bool {
        !self.resend_api_key.is_empty()
    }
}

/// Resend-backed notification sender
#[derive(Clone)]
pub struct ResendMailer {
    config: EmailConfig,
    client: reqwest::Client,
}

impl ResendMailer {
    pub fn new(config: EmailConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    /// One delivery attempt
    async fn dispatch(
        &self,
        recipient_name: &str,
        recipient_email: &str,
        email: &RenderedEmail,
    ) -> Result<(), MailError> {
        let body = serde_json::json!({
            "from": self.config.email_from,
            "to": [mailbox(recipient_name, recipient_email)],
            "subject": email.subject,
            "html": email.html,
        });

        let response = self
            .client
            .post(format!("{}/emails", self.config.api_base))
            .bearer_auth(&self.config.resend_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

/// `"Display Name" <address>`, with the name quoted so user-chosen text cannot
/// alter the address list.
fn mailbox(name: &str, email: &str) -> String {
    let mut quoted = String::with_capacity(name.len());
    for c in name.chars().filter(|c| !c.is_control()) {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    if quoted.trim().is_empty() {
        return email.to_string();
    }
    format!("\"{}\" <{}>", quoted, email)
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(
        &self,
        template_id: &str,
        recipient_name: &str,
        recipient_email: &str,
        data: &Value,
        sandbox: bool,
    ) -> Result<(), MailError> {
        let email = render_template(template_id, &self.config.app_name, data)?;

        if sandbox || !self.config.is_enabled() {
            tracing::info!(
                template = %template_id,
                to = %recipient_email,
                subject = %email.subject,
                sandbox,
                "Email not dispatched (sandbox or no API key)"
            );
            return Ok(());
        }

        let strategy = ExponentialBackoff::from_millis(2)
            .factor(250)
            .max_delay(MAX_BACKOFF)
            .map(jitter)
            .take(MAX_ATTEMPTS - 1);

        let mut attempts = 0usize;
        let result = RetryIf::start(
            strategy,
            || {
                attempts += 1;
                self.dispatch(recipient_name, recipient_email, &email)
            },
            |e: &MailError| {
                let retry = e.is_transient();
                if retry {
                    tracing::warn!(error = %e, to = %recipient_email, "Transient email failure - will retry");
                }
                retry
            },
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(template = %template_id, to = %recipient_email, attempts, "Email sent");
                Ok(())
            }
            Err(e) if e.is_transient() => {
                tracing::error!(error = %e, to = %recipient_email, attempts, "Email delivery exhausted retries");
                Err(MailError::Exhausted {
                    attempts,
                    last: Box::new(e),
                })
            }
            Err(e) => {
                tracing::error!(error = %e, to = %recipient_email, "Email delivery failed");
                Err(e)
            }
        }
    }
}
