use anyhow::{Context, Result};
use lettre::message::{header, Mailbox, Message};
use lettre::transport::smtp::{authentication::Credentials, AsyncSmtpTransport};
use lettre::{AsyncTransport, Tokio1Executor};
use std::time::Duration;

use super::format::{digest_body, digest_subject, test_body};
use super::Notifier;
use crate::model::Listing;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub sender: String,
    pub password: String,
    pub recipient: String,
    pub timeout: Duration,
}

fn build_message(from: &Mailbox, to: &Mailbox, subject: String, body: String) -> Result<Message> {
    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject)
        .header(header::ContentType::TEXT_PLAIN)
        .body(body)
        .context("build email")
}

/// SMTP digest sender (implicit TLS relay, e.g. smtp.gmail.com:465).
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    timeout: Duration,
}

impl EmailNotifier {
    pub fn new(cfg: &EmailConfig) -> Result<Self> {
        let from: Mailbox = cfg
            .sender
            .parse()
            .with_context(|| format!("invalid sender address {}", cfg.sender))?;
        let to: Mailbox = cfg
            .recipient
            .parse()
            .with_context(|| format!("invalid recipient address {}", cfg.recipient))?;

        let creds = Credentials::new(cfg.sender.clone(), cfg.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
            .with_context(|| format!("invalid SMTP host {}", cfg.smtp_host))?
            .credentials(creds)
            .timeout(Some(cfg.timeout))
            .build();

        Ok(Self {
            mailer,
            from,
            to,
            timeout: cfg.timeout,
        })
    }

    async fn deliver(&self, msg: Message) -> Result<()> {
        tokio::time::timeout(self.timeout, self.mailer.send(msg))
            .await
            .context("smtp send timed out")?
            .context("send email")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    async fn send_digest(&self, listings: &[Listing]) -> Result<()> {
        let msg = build_message(
            &self.from,
            &self.to,
            digest_subject(listings.len()),
            digest_body(listings),
        )?;
        self.deliver(msg).await?;
        tracing::info!(
            target: "notify",
            to = %self.to,
            listings = listings.len(),
            "digest emailed"
        );
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        let msg = build_message(
            &self.from,
            &self.to,
            "job-tracker setup complete".to_string(),
            test_body(),
        )?;
        self.deliver(msg).await?;
        tracing::info!(target: "notify", to = %self.to, "test email sent");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.test".into(),
            sender: "tracker@example.test".into(),
            password: "app-password".into(),
            recipient: "me@example.test".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn rejects_bad_recipient() {
        let mut c = cfg();
        c.recipient = "not an address".into();
        assert!(EmailNotifier::new(&c).is_err());
    }

    #[test]
    fn builds_plain_text_digest() {
        let c = cfg();
        let from: Mailbox = c.sender.parse().unwrap();
        let to: Mailbox = c.recipient.parse().unwrap();
        let msg = build_message(&from, &to, digest_subject(2), "body".into()).unwrap();
        let raw = String::from_utf8(msg.formatted()).unwrap();
        assert!(raw.contains("Subject: 2 new job posting(s) found"));
        assert!(raw.contains("To: me@example.test"));
    }
}
