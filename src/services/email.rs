//! Email delivery for lending notifications

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use super::notifications::Notifier;
use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
    models::{transaction::TransactionRecord, user::UserShort},
};

/// Wrap a plain-text body for the HTML part; user-supplied text is escaped
fn html_body(body: &str) -> String {
    let escaped = body
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!("<html><body><pre>{}</pre></body></html>", escaped)
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn recipient(user: &UserShort) -> AppResult<&str> {
        user.email
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Internal(format!("User {} has no email address", user.username)))
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("BorrowedWords");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Internal(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body(body)),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn mailer(&self) -> AppResult<SmtpTransport> {
        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) = (
            &self.config.smtp_username,
            &self.config.smtp_password,
        ) {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        Ok(mailer_builder.build())
    }

    /// Generic email sending function. The SMTP transport blocks, so it runs
    /// on the blocking pool.
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        let email = self.build_message(to, subject, body)?;
        let mailer = self.mailer()?;

        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Internal(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn book_returned(&self, record: &TransactionRecord) -> AppResult<()> {
        let to = Self::recipient(&record.lender)?;
        let subject = format!("Book returned: {}", record.book.title);
        let body = format!(
            r#"
Hello {lender},

{borrower} has marked "{title}" as returned.

Please confirm the return once the book is back with you to complete the borrow.
"#,
            lender = record.lender.username,
            borrower = record.borrower.username,
            title = record.book.title,
        );

        self.send_email(to, &subject, &body).await
    }

    async fn book_overdue(&self, record: &TransactionRecord) -> AppResult<()> {
        let to = Self::recipient(&record.borrower)?;
        let subject = format!("Overdue Book: {}", record.book.title);
        let due = record
            .transaction
            .due_date
            .map(|d| d.to_string())
            .unwrap_or_default();
        let body = format!(
            r#"
Hello {borrower},

The book "{title}" is overdue. It was due on {due}.

Please return the book as soon as possible.

Thank you,
BorrowedWords Team
"#,
            borrower = record.borrower.username,
            title = record.book.title,
            due = due,
        );

        self.send_email(to, &subject, &body).await
    }
}
