use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::{MailConfig, MailTransportKind};

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// Rendered subject and bodies
#[derive(Debug, Clone)]
pub struct EmailTemplate {
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

#[derive(Debug, Clone)]
pub struct LoginContext {
    pub ip: String,
    pub user_agent: String,
    pub time: String,
}

#[derive(Clone)]
enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    /// Writes the message to the log instead of delivering it
    Log,
    Memory(Arc<Mutex<Vec<OutgoingEmail>>>),
}

/// Sends the transactional emails (verification, reset, welcome, login alert)
#[derive(Clone)]
pub struct Mailer {
    transport: MailTransport,
    from_address: String,
    app_url: String,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let transport = match self.transport {
            MailTransport::Smtp(_) => "smtp",
            MailTransport::Log => "log",
            MailTransport::Memory(_) => "memory",
        };
        f.debug_struct("Mailer")
            .field("transport", &transport)
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl Mailer {
    pub fn from_config(config: &MailConfig, app_url: &str) -> Result<Self, EmailError> {
        let transport = match config.transport {
            MailTransportKind::Log => MailTransport::Log,
            MailTransportKind::Smtp => {
                let builder = if config.smtp_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                }
                .port(config.smtp_port);

                let builder = if let (Some(username), Some(password)) =
                    (&config.smtp_username, &config.smtp_password)
                {
                    builder.credentials(Credentials::new(username.clone(), password.clone()))
                } else {
                    builder
                };

                MailTransport::Smtp(builder.build())
            }
        };

        Ok(Self {
            transport,
            from_address: config.from_address.clone(),
            app_url: app_url.trim_end_matches('/').to_string(),
        })
    }

    /// Captures messages in memory; read them back with `sent`
    pub fn memory(app_url: &str) -> Self {
        Self {
            transport: MailTransport::Memory(Arc::new(Mutex::new(Vec::new()))),
            from_address: "VitaFit <noreply@vitafit.online>".to_string(),
            app_url: app_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        match &self.transport {
            MailTransport::Memory(outbox) => outbox
                .lock()
                .map(|messages| messages.clone())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        name: &str,
        code: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let link = format!("{}/verify-email?token={}", self.app_url, token);
        let template = render(
            "Verify Your Email - VitaFit | تأكيد بريدك الإلكتروني",
            include_str!("../templates/email/verification.txt"),
            include_str!("../templates/email/verification.html"),
            &[("name", name), ("code", code), ("link", &link)],
        );
        self.send(to, template).await
    }

    pub async fn send_password_reset_email(&self, to: &str, name: &str, code: &str) -> Result<(), EmailError> {
        let template = render(
            "Reset Your Password - VitaFit | إعادة تعيين كلمة المرور",
            include_str!("../templates/email/password_reset.txt"),
            include_str!("../templates/email/password_reset.html"),
            &[("name", name), ("code", code)],
        );
        self.send(to, template).await
    }

    pub async fn send_welcome_email(&self, to: &str, name: &str) -> Result<(), EmailError> {
        let template = render(
            "Welcome to VitaFit! | مرحباً بك في VitaFit!",
            include_str!("../templates/email/welcome.txt"),
            include_str!("../templates/email/welcome.html"),
            &[("name", name), ("app_url", &self.app_url)],
        );
        self.send(to, template).await
    }

    pub async fn send_login_alert(&self, to: &str, name: &str, context: &LoginContext) -> Result<(), EmailError> {
        let template = render(
            "New sign-in to your VitaFit account | تسجيل دخول جديد",
            include_str!("../templates/email/login_alert.txt"),
            include_str!("../templates/email/login_alert.html"),
            &[
                ("name", name),
                ("ip", &context.ip),
                ("user_agent", &context.user_agent),
                ("time", &context.time),
            ],
        );
        self.send(to, template).await
    }

    pub async fn send(&self, to: &str, template: EmailTemplate) -> Result<(), EmailError> {
        match &self.transport {
            MailTransport::Memory(outbox) => {
                if let Ok(mut messages) = outbox.lock() {
                    messages.push(OutgoingEmail {
                        to: to.to_string(),
                        subject: template.subject,
                        text_body: template.text_body,
                        html_body: template.html_body,
                    });
                }
                Ok(())
            }
            MailTransport::Log => {
                tracing::info!(to = %to, subject = %template.subject, "Email (log transport)");
                tracing::debug!(body = %template.text_body, "Email body");
                Ok(())
            }
            MailTransport::Smtp(mailer) => {
                let from: Mailbox = self
                    .from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?;
                let recipient: Mailbox = to
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(to.to_string()))?;

                let email = Message::builder()
                    .from(from)
                    .to(recipient)
                    .subject(template.subject.clone())
                    .multipart(
                        MultiPart::alternative()
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_PLAIN)
                                    .body(template.text_body),
                            )
                            .singlepart(
                                SinglePart::builder()
                                    .header(ContentType::TEXT_HTML)
                                    .body(template.html_body),
                            ),
                    )?;

                mailer.send(email).await?;
                tracing::info!(to = %to, subject = %template.subject, "Email sent successfully");
                Ok(())
            }
        }
    }
}

fn render(subject: &str, text: &str, html: &str, vars: &[(&str, &str)]) -> EmailTemplate {
    let mut text_body = text.to_string();
    let mut html_body = html.to_string();
    for (key, value) in vars {
        let placeholder = format!("{{{{{}}}}}", key);
        text_body = text_body.replace(&placeholder, value);
        html_body = html_body.replace(&placeholder, &escape_html(value));
    }
    EmailTemplate {
        subject: subject.to_string(),
        text_body,
        html_body,
    }
}

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_transport_captures_verification() {
        let mailer = Mailer::memory("https://vitafit.online/");
        mailer
            .send_verification_email("maha@example.com", "Maha", "482913", "tok123")
            .await
            .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "maha@example.com");
        assert!(sent[0].text_body.contains("482913"));
        assert!(sent[0].text_body.contains("https://vitafit.online/verify-email?token=tok123"));
        assert!(sent[0].html_body.contains("Hello Maha"));
        assert!(!sent[0].text_body.contains("{{"));
    }

    #[tokio::test]
    async fn test_reset_email_has_code_but_no_link() {
        let mailer = Mailer::memory("https://vitafit.online");
        mailer
            .send_password_reset_email("maha@example.com", "Maha", "111222")
            .await
            .unwrap();

        let email = &mailer.sent()[0];
        assert!(email.subject.starts_with("Reset Your Password"));
        assert!(email.text_body.contains("111222"));
        assert!(email.text_body.contains("1 hour"));
    }

    #[test]
    fn test_html_values_are_escaped() {
        let template = render("s", "{{name}}", "<p>{{name}}</p>", &[("name", "<script>")]);
        assert_eq!(template.text_body, "<script>");
        assert_eq!(template.html_body, "<p>&lt;script&gt;</p>");
    }

    #[tokio::test]
    async fn test_log_transport_sends_nothing() {
        let mailer = Mailer::from_config(&MailConfig::default(), "http://localhost").unwrap();
        mailer.send_welcome_email("a@b.co", "A").await.unwrap();
        assert!(mailer.sent().is_empty());
    }
}
