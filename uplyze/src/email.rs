//! Email service for lead-intake notifications.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{config::Config, errors::Error};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    lead_inbox: Option<String>,
    dashboard_url: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            crate::config::EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            crate::config::EmailTransportConfig::File { path } => {
                // Use file transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
            lead_inbox: email_config.lead_inbox.clone(),
            dashboard_url: config.dashboard_url.clone(),
        })
    }

    /// Relay a marketing-form submission to the configured agency inbox.
    ///
    /// A missing `lead_inbox` is not an error: the lead is still recorded in
    /// the database, there is just nobody to notify.
    pub async fn send_lead_notification(
        &self,
        lead_name: &str,
        lead_email: &str,
        platform: Option<&str>,
        message_text: Option<&str>,
    ) -> Result<(), Error> {
        let Some(inbox) = &self.lead_inbox else {
            tracing::debug!("No lead_inbox configured; skipping lead notification email");
            return Ok(());
        };

        let subject = format!("New lead: {lead_name}");
        let body = format!(
            "Name: {lead_name}\nEmail: {lead_email}\nPlatform: {}\n\n{}\n\nReview leads: {}/leads",
            platform.unwrap_or("-"),
            message_text.unwrap_or(""),
            self.dashboard_url,
        );

        self.send_email(inbox, &subject, &body).await
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailTransportConfig;

    fn file_config(dir: &std::path::Path, lead_inbox: Option<&str>) -> Config {
        let mut config = Config::default();
        config.email.transport = EmailTransportConfig::File {
            path: dir.to_string_lossy().to_string(),
        };
        config.email.lead_inbox = lead_inbox.map(String::from);
        config
    }

    #[tokio::test]
    async fn test_lead_notification_written_to_file_transport() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path(), Some("leads@ozagency.example"))).unwrap();

        service
            .send_lead_notification("Jordan", "jordan@example.com", Some("instagram"), Some("Interested in management"))
            .await
            .unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1, "one email file should be written");
    }

    #[tokio::test]
    async fn test_missing_inbox_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path(), None)).unwrap();

        service.send_lead_notification("Jordan", "jordan@example.com", None, None).await.unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(written.is_empty());
    }
}
