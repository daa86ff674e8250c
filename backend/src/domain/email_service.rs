//! Outbound mail: delivery of login codes over SMTP.

use anyhow::Context;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            from_email: String::new(),
        }
    }
}

impl EmailConfig {
    /// Credentials present; without them the mailer stays disabled and
    /// logins still work, just without the email leg.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

#[derive(Clone)]
pub struct OtpMailer {
    config: EmailConfig,
    transport: Option<SmtpTransport>,
}

impl OtpMailer {
    pub fn new(config: EmailConfig) -> Result<Self, AppError> {
        let transport = if config.is_configured() {
            info!(
                "initializing SMTP transport for {}:{}",
                config.smtp_server, config.smtp_port
            );
            let tls_params = TlsParameters::new(config.smtp_server.clone())
                .context("failed to create TLS parameters")?;
            Some(
                SmtpTransport::relay(&config.smtp_server)
                    .context("failed to create SMTP relay")?
                    .port(config.smtp_port)
                    .tls(Tls::Required(tls_params))
                    .credentials(Credentials::new(
                        config.username.clone(),
                        config.password.clone(),
                    ))
                    .build(),
            )
        } else {
            info!("SMTP credentials not configured, email delivery disabled");
            None
        };

        Ok(Self { config, transport })
    }

    pub fn is_configured(&self) -> bool {
        self.transport.is_some()
    }

    /// Send the login code. Errors if the mailer is disabled; callers check
    /// `is_configured` first when they want to degrade instead.
    pub async fn send_otp(&self, to_email: &str, to_name: &str, code: &str) -> Result<(), AppError> {
        let transport = self
            .transport
            .as_ref()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("email delivery is not configured")))?
            .clone();

        let body = format!(
            "Hello {to_name}!\n\nYour one-time login code is: {code}\n\nIt expires in 5 minutes. If you did not try to log in, you can ignore this email.\n\nBest regards,\nFinance Advisor"
        );

        let email = Message::builder()
            .from(
                self.config
                    .from_email
                    .parse::<Mailbox>()
                    .context("failed to parse from email")?,
            )
            .to(to_email.parse::<Mailbox>().context("failed to parse recipient email")?)
            .subject("Your Finance Advisor login code")
            .body(body)
            .context("failed to build email")?;

        // SmtpTransport is blocking; keep it off the async workers.
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("email send task failed: {e}")))?
            .context("failed to send email")?;

        info!("login code email sent");
        Ok(())
    }
}
