//! Outgoing mail.
//!
//! Delivery is best effort: callers go through [`send_quietly`], which logs
//! failures instead of failing the request that triggered the mail.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor, message::header::ContentType,
    transport::smtp::authentication::Credentials,
};
use model::entities::{loan_application, user};
use model::enums::ApplicationStatus;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("could not build message: {0}")]
    Build(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

/// A rendered plain-text mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), MailError>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self, MailError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| MailError::Transport("no SMTP host configured".to_string()))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        if let (Some(username), Some(password)) = (&config.smtp_username, &config.smtp_password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let message = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| MailError::Address(format!("{}: {e}", self.from)))?,
            )
            .to(email
                .to
                .parse()
                .map_err(|e| MailError::Address(format!("{}: {e}", email.to)))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .map_err(|e| MailError::Build(e.to_string()))?;

        AsyncTransport::send(&self.transport, message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Transport(e.to_string()))
    }
}

/// Writes mail to the log instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        info!(to = %email.to, subject = %email.subject, "Mail not sent (no SMTP configured)");
        debug!("Mail body:\n{}", email.body);
        Ok(())
    }
}

pub async fn send_quietly(mailer: &dyn Mailer, email: Email) {
    let to = email.to.clone();
    match mailer.send(email).await {
        Ok(()) => debug!(%to, "Mail dispatched"),
        Err(e) => warn!(%to, "Failed to send mail: {}", e),
    }
}

pub fn status_update_email(
    application: &loan_application::Model,
    comments: Option<&str>,
) -> Email {
    let headline = match application.status {
        ApplicationStatus::Approved => "has been approved",
        ApplicationStatus::Rejected => "has been rejected",
        ApplicationStatus::UnderReview => "is under review",
        ApplicationStatus::Pending => "is pending",
    };
    let mut body = format!(
        "Dear {},\n\nYour education loan application {} {}.\n",
        application.full_name, application.application_number, headline
    );
    if let Some(comments) = comments.filter(|c| !c.trim().is_empty()) {
        body.push_str(&format!("\nReviewer comments: {comments}\n"));
    }
    body.push_str("\nYou can follow the progress of your application in the portal.\n");

    Email {
        to: application.email.clone(),
        subject: format!(
            "Application {} is now {}",
            application.application_number, application.status
        ),
        body,
    }
}

pub fn assignment_email(dsa: &user::Model, application: &loan_application::Model) -> Email {
    let deadline = application
        .review_deadline
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "not set".to_string());
    Email {
        to: dsa.email.clone(),
        subject: format!("New application assigned: {}", application.application_number),
        body: format!(
            "Hello {},\n\nApplication {} from {} ({} loan of {}) has been assigned to you.\nReview deadline: {}\n",
            dsa.name,
            application.application_number,
            application.full_name,
            application.loan_type,
            application.loan_amount,
            deadline
        ),
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every mail in memory.
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<Email> {
            self.sent.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Email) -> Result<(), MailError> {
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email);
            }
            Ok(())
        }
    }
}
