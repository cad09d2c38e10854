use anyhow::{Context, Result};
use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::batch::DownloadedFile;
use crate::config::Config;

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Send one batch email for a course: body lists every file, attachments
    /// carry the ones that downloaded. `part` labels multi-batch deliveries.
    async fn send_course_batch(
        &self,
        course_name: &str,
        files: &[DownloadedFile],
        part: Option<(usize, usize)>,
    ) -> Result<()>;

    async fn send_no_updates(&self, course_count: usize) -> Result<()>;

    async fn send_error_report(&self, summary: &str) -> Result<()>;
}

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    mailbox: Mailbox,
}

impl Mailer {
    pub fn new(config: &Config) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .with_context(|| format!("Failed to configure SMTP relay {}", config.smtp_host))?
            .credentials(Credentials::new(
                config.mail_address.clone(),
                config.mail_app_password.clone(),
            ))
            .build();
        let mailbox: Mailbox = config
            .mail_address
            .parse()
            .with_context(|| format!("Invalid mail address: {}", config.mail_address))?;

        Ok(Self { transport, mailbox })
    }

    async fn send(&self, email: Message, subject: &str) -> Result<()> {
        self.transport
            .send(email)
            .await
            .context("SMTP send failed")?;
        tracing::info!("Email sent: {subject}");
        Ok(())
    }

    async fn send_plain(&self, subject: &str, body: String) -> Result<()> {
        let email = Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("Failed to build email")?;
        self.send(email, subject).await
    }
}

#[async_trait::async_trait]
impl Notifier for Mailer {
    async fn send_course_batch(
        &self,
        course_name: &str,
        files: &[DownloadedFile],
        part: Option<(usize, usize)>,
    ) -> Result<()> {
        let subject = batch_subject(course_name, part);

        let mut multipart = MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(batch_body(course_name, files)),
        );
        for file in files {
            let Some(path) = &file.local_path else {
                continue;
            };
            let payload = match std::fs::read(path) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("Error attaching file {}: {e}", file.display_name);
                    continue;
                }
            };
            let content_type = ContentType::parse("application/octet-stream")
                .context("Invalid attachment content type")?;
            multipart = multipart
                .singlepart(Attachment::new(file.display_name.clone()).body(payload, content_type));
        }

        let email = Message::builder()
            .from(self.mailbox.clone())
            .to(self.mailbox.clone())
            .subject(subject.as_str())
            .multipart(multipart)
            .context("Failed to build email")?;
        self.send(email, &subject).await
    }

    async fn send_no_updates(&self, course_count: usize) -> Result<()> {
        let body = format!(
            "No new files were found across {course_count} active courses.\n\nChecked at: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        self.send_plain("Canvas updates: No new files today", body).await
    }

    async fn send_error_report(&self, summary: &str) -> Result<()> {
        let body = format!(
            "The Canvas file tracker encountered errors during execution at {}.\n\nError details:\n{}\n{summary}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            "=".repeat(50),
        );
        self.send_plain("Canvas file tracker - Error report", body)
            .await
    }
}

fn batch_subject(course_name: &str, part: Option<(usize, usize)>) -> String {
    match part {
        Some((index, total)) => {
            format!("Canvas updates: {course_name} - Part {index} of {total}")
        }
        None => format!("Canvas updates: {course_name}"),
    }
}

fn batch_body(course_name: &str, files: &[DownloadedFile]) -> String {
    let mut body = format!("New files uploaded to {course_name}:\n\n");
    for file in files {
        body.push_str(&format!("- {}\n", file.display_name));
        body.push_str(&format!(
            "  Uploaded: {}\n\n",
            file.created_at.as_deref().unwrap_or("Unknown")
        ));
    }
    body
}
