//! Outgoing mail for verification and password reset codes.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};
use wellzo_config::EmailConfig;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    Verification,
    PasswordReset,
}

impl OtpPurpose {
    fn subject(&self) -> &'static str {
        match self {
            Self::Verification => "Verify your Wellzo account",
            Self::PasswordReset => "Reset your Wellzo password",
        }
    }

    fn intro(&self) -> &'static str {
        match self {
            Self::Verification => "Use this code to verify your email address",
            Self::PasswordReset => "Use this code to reset your password",
        }
    }
}

#[derive(Clone)]
pub enum Mailer {
    Smtp(SmtpMailer),
    /// Writes messages to the log instead of delivering them.
    Log,
}

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn from_config(config: &EmailConfig) -> Result<Self, AuthError> {
        if !config.enabled {
            info!("email delivery disabled, codes will be logged");
            return Ok(Self::Log);
        }

        let builder = if matches!(config.smtp_host.as_str(), "localhost" | "127.0.0.1") {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|err| AuthError::Mail(format!("invalid smtp relay: {err}")))?
        };

        let mut builder = builder.port(config.smtp_port);
        if let (Some(username), Some(password)) =
            (config.smtp_username.clone(), config.smtp_password.clone())
        {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|err| AuthError::Mail(format!("invalid sender address: {err}")))?;

        Ok(Self::Smtp(SmtpMailer {
            transport: builder.build(),
            from,
        }))
    }

    pub async fn send_otp(
        &self,
        to: &str,
        name: &str,
        code: &str,
        purpose: OtpPurpose,
        valid_minutes: i64,
    ) -> Result<(), AuthError> {
        let greeting = if name.trim().is_empty() { "there" } else { name.trim() };
        let body = format!(
            "Hi {greeting},\n\n{}: {code}\n\nThe code expires in {valid_minutes} minutes. \
             If you did not request it you can ignore this email.\n\nThe Wellzo team\n",
            purpose.intro()
        );

        match self {
            Self::Log => {
                info!(to, subject = purpose.subject(), "email delivery disabled, message not sent");
                debug!(to, code, "one-time code");
                Ok(())
            }
            Self::Smtp(smtp) => {
                let recipient = to
                    .parse::<Mailbox>()
                    .map_err(|err| AuthError::Mail(format!("invalid recipient: {err}")))?;

                let message = Message::builder()
                    .from(smtp.from.clone())
                    .to(recipient)
                    .subject(purpose.subject())
                    .header(ContentType::TEXT_PLAIN)
                    .body(body)
                    .map_err(|err| AuthError::Mail(err.to_string()))?;

                smtp.transport
                    .send(message)
                    .await
                    .map_err(|err| AuthError::Mail(err.to_string()))?;

                info!(to, subject = purpose.subject(), "email sent");
                Ok(())
            }
        }
    }
}
