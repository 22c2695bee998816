//! Run digests delivered by email and WhatsApp.
//!
//! A failed delivery is logged and never fails the run.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AcceptedRecord;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ConfigError, NotifyError};

pub const TOP_N: usize = 5;

/// Small summary handed to every notifier.
#[derive(Debug, Clone)]
pub struct Digest {
    pub new_count: usize,
    pub total_count: usize,
    pub top: Vec<AcceptedRecord>,
    pub generated_at: DateTime<Utc>,
}

impl Digest {
    pub fn new(new_records: &[AcceptedRecord], total_count: usize) -> Self {
        Self {
            new_count: new_records.len(),
            total_count,
            top: new_records.iter().take(TOP_N).cloned().collect(),
            generated_at: Utc::now(),
        }
    }

    fn subject(&self) -> String {
        format!("🎯 {} New Remote Fresher Jobs Found!", self.new_count)
    }

    pub fn html(&self) -> String {
        let mut body = format!(
            "<html>\n<body>\n<h2>🎯 Remote Fresher Jobs Alert</h2>\n\
             <p>We found <strong>{} new jobs</strong> suitable for freshers.</p>\n\
             <ul>\n<li><strong>Total Jobs:</strong> {}</li>\n<li><strong>Date:</strong> {}</li>\n</ul>\n\
             <h3>🔗 Top Job Highlights:</h3>\n",
            self.new_count,
            self.total_count,
            self.generated_at.format("%B %-d, %Y")
        );

        for job in &self.top {
            body.push_str(&format!(
                "<div style=\"border: 1px solid #ddd; padding: 10px; margin: 10px 0;\">\n\
                 <h4><a href=\"{}\">{}</a></h4>\n\
                 <p><strong>Company:</strong> {}</p>\n\
                 <p><strong>Platform:</strong> {}</p>\n\
                 <p><strong>Salary:</strong> {}</p>\n\
                 <p><strong>Description:</strong> {}</p>\n</div>\n",
                escape_html(&job.record.url),
                escape_html(&job.record.title),
                escape_html(&job.record.company),
                escape_html(job.platform()),
                escape_html(&job.record.salary),
                escape_html(&job.record.description),
            ));
        }

        body.push_str("</body>\n</html>\n");
        body
    }

    pub fn text(&self) -> String {
        let mut message = format!(
            "🎯 *Remote Jobs Alert*\n\nFound *{} new jobs* for freshers!\n\n📊 Total Jobs: {}\n📅 {}\n",
            self.new_count,
            self.total_count,
            self.generated_at.format("%b %-d, %Y")
        );
        for job in &self.top {
            message.push_str(&format!(
                "\n• {} at {} ({})\n  {}",
                job.record.title,
                job.record.company,
                job.platform(),
                job.record.url
            ));
        }
        message
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, digest: &Digest) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub from_email: String,
    pub from_password: String,
    pub to_email: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            from_email: String::new(),
            from_password: String::new(),
            to_email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub to_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enable_email: bool,
    pub enable_whatsapp: bool,
    pub email: EmailConfig,
    pub whatsapp: WhatsAppConfig,
}

impl NotificationConfig {
    /// Every enabled channel must have its credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = |notifier: &'static str, field: &'static str, value: &str| {
            if value.trim().is_empty() {
                Err(ConfigError::MissingCredential { notifier, field })
            } else {
                Ok(())
            }
        };

        if self.enable_email {
            let e = &self.email;
            missing("email", "smtp_host", &e.smtp_host)?;
            missing("email", "from_email", &e.from_email)?;
            missing("email", "from_password", &e.from_password)?;
            missing("email", "to_email", &e.to_email)?;
        }
        if self.enable_whatsapp {
            let w = &self.whatsapp;
            missing("whatsapp", "account_sid", &w.account_sid)?;
            missing("whatsapp", "auth_token", &w.auth_token)?;
            missing("whatsapp", "from_number", &w.from_number)?;
            missing("whatsapp", "to_number", &w.to_number)?;
        }
        Ok(())
    }

    pub fn build(&self) -> Vec<Arc<dyn Notifier>> {
        let mut notifiers: Vec<Arc<dyn Notifier>> = Vec::new();
        if self.enable_email {
            notifiers.push(Arc::new(EmailNotifier::new(self.email.clone())));
        }
        if self.enable_whatsapp {
            notifiers.push(Arc::new(WhatsAppNotifier::new(self.whatsapp.clone())));
        }
        notifiers
    }
}

pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    fn message(&self, digest: &Digest) -> Result<Message, NotifyError> {
        let from = self
            .config
            .from_email
            .parse()
            .map_err(|_| NotifyError::Address(self.config.from_email.clone()))?;
        let to = self
            .config
            .to_email
            .parse()
            .map_err(|_| NotifyError::Address(self.config.to_email.clone()))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(digest.subject())
            .header(ContentType::TEXT_HTML)
            .body(digest.html())
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, digest: &Digest) -> Result<(), NotifyError> {
        let message = self.message(digest)?;
        let config = self.config.clone();

        // lettre's SMTP transport blocks.
        tokio::task::spawn_blocking(move || {
            let mailer = SmtpTransport::starttls_relay(&config.smtp_host)
                .map_err(|e| NotifyError::Smtp(e.to_string()))?
                .port(config.smtp_port)
                .credentials(Credentials::new(
                    config.from_email.clone(),
                    config.from_password.clone(),
                ))
                .build();
            mailer
                .send(&message)
                .map(|_| ())
                .map_err(|e| NotifyError::Smtp(e.to_string()))
        })
        .await
        .map_err(|e| NotifyError::Smtp(format!("mail task failed: {}", e)))??;

        info!("✅ Email notification sent to {}", self.config.to_email);
        Ok(())
    }
}

pub struct WhatsAppNotifier {
    config: WhatsAppConfig,
    client: reqwest::Client,
    api_base: String,
}

impl WhatsAppNotifier {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: "https://api.twilio.com".to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.config.account_sid
        )
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn notify(&self, digest: &Digest) -> Result<(), NotifyError> {
        let form = [
            ("From", whatsapp_address(&self.config.from_number)),
            ("To", whatsapp_address(&self.config.to_number)),
            ("Body", digest.text()),
        ];

        let response = self
            .client
            .post(self.endpoint())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                service: "twilio",
                status: status.as_u16(),
            });
        }

        info!("✅ WhatsApp notification sent to {}", self.config.to_number);
        Ok(())
    }
}

/// Sends the digest through every notifier. Nothing is sent for an empty run.
pub async fn notify_all(notifiers: &[Arc<dyn Notifier>], digest: &Digest) -> usize {
    if digest.new_count == 0 {
        info!("📱 No new jobs found - skipping notifications");
        return 0;
    }

    info!("📨 Sending notifications for {} new jobs...", digest.new_count);
    let mut delivered = 0;
    for notifier in notifiers {
        match notifier.notify(digest).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("❌ {} notification failed: {}", notifier.name(), e),
        }
    }
    delivered
}

fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
