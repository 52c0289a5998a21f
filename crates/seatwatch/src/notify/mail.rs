//! Outbound "seat available" email.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport. Configuration is
//! read from the environment; when `SMTP_HOST` is not set,
//! [`MailConfig::from_env`] returns `None` and [`UnconfiguredMailer`] is used
//! instead, failing every send.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

const DEFAULT_FROM_ADDRESS: &str = "noreply@seatwatch.local";
const DEFAULT_FROM_NAME: &str = "Seatwatch";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),

    #[error("Mail delivery is not configured")]
    NotConfigured,
}

/// Sends seat availability notifications.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_seat_available_email(
        &self,
        to: &str,
        course_code: &str,
        section_number: &str,
        available: i64,
    ) -> Result<(), MailError>;
}

pub fn seat_available_subject(course_code: &str, section_number: &str) -> String {
    format!("Seat Available! {course_code} Section {section_number}")
}

fn seat_available_body(course_code: &str, section_number: &str, available: i64) -> String {
    let seats = if available == 1 { "seat" } else { "seats" };
    format!(
        "<div style=\"font-family: sans-serif; max-width: 600px; margin: 0 auto;\">\
         <h2>Seat Alert!</h2>\
         <p>A seat has opened up in a section you are tracking.</p>\
         <p><strong>Course:</strong> {course_code}<br/>\
         <strong>Section:</strong> {section_number}<br/>\
         <strong>Available now:</strong> {available} {seats}</p>\
         <p>Register now before someone else takes it.</p>\
         <p style=\"font-size: 12px; color: #94a3b8;\">You are receiving this because you \
         tracked this section.</p></div>"
    )
}

/// SMTP settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_address: String,
    pub from_name: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl MailConfig {
    /// Loads SMTP settings from the environment.
    ///
    /// | Variable         | Required | Default                   |
    /// |------------------|----------|---------------------------|
    /// | `SMTP_HOST`      | yes      |                           |
    /// | `SMTP_PORT`      | no       | `587`                     |
    /// | `SMTP_FROM`      | no       | `noreply@seatwatch.local` |
    /// | `SMTP_FROM_NAME` | no       | `Seatwatch`               |
    /// | `SMTP_USER`      | no       |                           |
    /// | `SMTP_PASSWORD`  | no       |                           |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            from_name: std::env::var("SMTP_FROM_NAME")
                .unwrap_or_else(|_| DEFAULT_FROM_NAME.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let address: Address = config.from_address.parse()?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);
        if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(
            "SMTP mailer configured for {}:{}",
            config.smtp_host, config.smtp_port
        );

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_seat_available_email(
        &self,
        to: &str,
        course_code: &str,
        section_number: &str,
        available: i64,
    ) -> Result<(), MailError> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(seat_available_subject(course_code, section_number))
            .header(ContentType::TEXT_HTML)
            .body(seat_available_body(course_code, section_number, available))
            .map_err(|e| MailError::Build(e.to_string()))?;

        self.transport.send(email).await?;
        Ok(())
    }
}

/// Stand-in used when SMTP is not configured.
pub struct UnconfiguredMailer;

#[async_trait]
impl Mailer for UnconfiguredMailer {
    async fn send_seat_available_email(
        &self,
        _to: &str,
        _course_code: &str,
        _section_number: &str,
        _available: i64,
    ) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}
