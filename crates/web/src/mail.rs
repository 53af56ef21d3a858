//! Verification email delivery.

use askama::Template;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use es4c_core::config::MailConfig;
use es4c_core::error::{Es4cError, Result};
use es4c_core::models::account::Account;

/// A rendered message ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}

#[derive(Template)]
#[template(path = "email/verification.html")]
struct VerificationEmailTemplate<'a> {
    name: &'a str,
    link: &'a str,
    token: &'a str,
}

/// Link that verifies `token` on the public host.
pub fn verification_link(host_fqdn: &str, token: &str) -> String {
    format!("https://{host_fqdn}/verify-email/{token}/")
}

/// Build the verification email for a freshly registered account.
pub fn verification_mail(account: &Account, host_fqdn: &str) -> Result<OutgoingMail> {
    let name = account.full_name();
    let link = verification_link(host_fqdn, &account.verification_token);
    let html_body = VerificationEmailTemplate {
        name: &name,
        link: &link,
        token: &account.verification_token,
    }
    .render()
    .map_err(|e| Es4cError::Template(e.to_string()))?;

    Ok(OutgoingMail {
        to: account.email.clone(),
        subject: format!("ES4C Email Verification: {name}, please verify your email"),
        html_body,
    })
}

/// SMTP delivery over STARTTLS with login credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let sender: Mailbox = config
            .sender
            .parse()
            .map_err(|e| Es4cError::Config(format!("invalid mail.sender: {e}")))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)
            .map_err(|e| Es4cError::Mail(e.to_string()))?
            .port(config.smtp_port);
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| Es4cError::Mail(format!("invalid recipient {}: {e}", mail.to)))?;
        let message = Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(mail.html_body.clone())
            .map_err(|e| Es4cError::Mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Es4cError::Mail(e.to_string()))?;
        info!(to = %mail.to, subject = %mail.subject, "email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them. Used when mail is disabled.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, "mail delivery disabled, message logged");
        debug!(body = %mail.html_body, "message body");
        Ok(())
    }
}

/// Pick the mailer the configuration asks for.
pub fn mailer_from_config(config: &MailConfig) -> Result<Box<dyn Mailer>> {
    if config.enabled {
        Ok(Box::new(SmtpMailer::from_config(config)?))
    } else {
        Ok(Box::new(LogMailer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account() -> Account {
        Account {
            id: 1,
            username: "jdoe".into(),
            email: "jdoe@example.edu".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            password_hash: String::new(),
            verification_token: "01234567".into(),
            is_verified: false,
            is_admin: false,
            is_staff: false,
            is_superuser: false,
            is_active: true,
            date_joined: Utc::now(),
        }
    }

    #[test]
    fn verification_mail_contents() {
        let mail = verification_mail(&account(), "accounts.example.edu").unwrap();
        assert_eq!(mail.to, "jdoe@example.edu");
        assert_eq!(
            mail.subject,
            "ES4C Email Verification: Jane Doe, please verify your email"
        );
        assert!(mail.html_body.contains("Hello Jane Doe"));
        assert!(mail
            .html_body
            .contains("https://accounts.example.edu/verify-email/01234567/"));
        assert!(mail.html_body.contains("01234567"));
    }

    #[test]
    fn names_are_escaped_in_body() {
        let mut a = account();
        a.first_name = "<b>Jane</b>".into();
        let mail = verification_mail(&a, "accounts.example.edu").unwrap();
        assert!(!mail.html_body.contains("<b>Jane</b>"));
    }

    #[test]
    fn disabled_mail_uses_log_mailer() {
        assert!(mailer_from_config(&MailConfig::default()).is_ok());
    }

    #[test]
    fn smtp_mailer_rejects_bad_sender() {
        let config = MailConfig {
            enabled: true,
            smtp_server: "smtp.example.edu".into(),
            sender: "not an address".into(),
            ..MailConfig::default()
        };
        assert!(matches!(
            SmtpMailer::from_config(&config),
            Err(Es4cError::Config(_))
        ));
    }

    #[tokio::test]
    async fn log_mailer_accepts_everything() {
        let mail = verification_mail(&account(), "accounts.example.edu").unwrap();
        LogMailer.send(&mail).await.unwrap();
    }
}
