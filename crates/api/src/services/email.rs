//! Email delivery for one-time codes.
//!
//! [`Mailer`] is the seam between the code issuer and the mail transport.
//! [`SmtpMailer`] delivers over SMTP via lettre; [`LogMailer`] writes the
//! message to the log and is only used when SMTP is not configured.

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use storehouse_core::Email;

use crate::config::EmailConfig;

/// HTML template for code emails.
#[derive(Template)]
#[template(path = "email/verification_code.html")]
struct VerificationCodeEmailHtml<'a> {
    subject: &'a str,
    intro: &'a str,
    code: &'a str,
    ttl_minutes: u64,
}

/// Plain text template for code emails.
#[derive(Template)]
#[template(path = "email/verification_code.txt")]
struct VerificationCodeEmailText<'a> {
    intro: &'a str,
    code: &'a str,
    ttl_minutes: u64,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// What a one-time code is for. Decides the email subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePurpose {
    SignIn,
    Verification,
    PasswordReset,
}

impl CodePurpose {
    #[must_use]
    pub const fn subject(self) -> &'static str {
        match self {
            Self::SignIn | Self::Verification => "Verification code",
            Self::PasswordReset => "Forgot password verification code",
        }
    }

    const fn intro(self) -> &'static str {
        match self {
            Self::SignIn => "Use this code to finish signing in:",
            Self::Verification => "Use this code to verify your account:",
            Self::PasswordReset => "Use this code to reset your password:",
        }
    }
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to: Email,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

impl OutgoingMail {
    /// Render a code email.
    ///
    /// # Errors
    ///
    /// Returns `MailError::Template` if a template fails to render.
    pub fn code(
        to: &Email,
        code: &str,
        purpose: CodePurpose,
        ttl: std::time::Duration,
    ) -> Result<Self, MailError> {
        let subject = purpose.subject();
        let intro = purpose.intro();
        let ttl_minutes = ttl.as_secs().div_ceil(60);

        let html_body = VerificationCodeEmailHtml {
            subject,
            intro,
            code,
            ttl_minutes,
        }
        .render()?;
        let text_body = VerificationCodeEmailText {
            intro,
            code,
            ttl_minutes,
        }
        .render()?;

        Ok(Self {
            to: to.clone(),
            subject: subject.to_owned(),
            text_body,
            html_body,
        })
    }
}

/// The transport's answer: which recipients it accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delivery {
    pub accepted: Vec<String>,
}

impl Delivery {
    /// Whether `email` is among the accepted recipients (exact match).
    #[must_use]
    pub fn accepted(&self, email: &Email) -> bool {
        self.accepted.iter().any(|a| a == email.as_str())
    }
}

/// Mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a message and report which recipients were accepted.
    ///
    /// # Errors
    ///
    /// Returns `MailError` if the message cannot be built or sent.
    async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError>;
}

/// SMTP mailer (STARTTLS relay).
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay cannot be configured.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError> {
        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(mail
                .to
                .as_str()
                .parse()
                .map_err(|_| MailError::InvalidAddress(mail.to.to_string()))?)
            .subject(mail.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(mail.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(mail.html_body.clone()),
                    ),
            )?;

        let response = self.transport.send(message).await?;

        if response.is_positive() {
            tracing::info!(to = %mail.to, subject = %mail.subject, "Email sent successfully");
            Ok(Delivery {
                accepted: vec![mail.to.to_string()],
            })
        } else {
            tracing::warn!(
                to = %mail.to,
                code = %response.code(),
                "SMTP server did not accept the message"
            );
            Ok(Delivery::default())
        }
    }
}

/// Development mailer that logs messages instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<Delivery, MailError> {
        tracing::warn!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.text_body,
            "SMTP not configured, email written to log"
        );
        Ok(Delivery {
            accepted: vec![mail.to.to_string()],
        })
    }
}
