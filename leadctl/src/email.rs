//! Outbound mail: credentials for approved guests and appointment confirmations.

use chrono::{DateTime, Utc};
use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use minijinja::{Environment, context};
use std::path::Path;
use tracing::{debug, instrument};

use crate::{
    config::{Config, EmailTransportConfig},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    login_url: String,
    templates: Environment<'static>,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// An appointment as presented to the guest.
pub struct AppointmentNotice<'a> {
    pub topic: &'a str,
    pub starts_at: DateTime<Utc>,
    pub duration_minutes: i64,
    pub join_url: Option<&'a str>,
}

impl EmailService {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let email_config = &config.email;

        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
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
            EmailTransportConfig::File { path } => {
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
            login_url: email_config.login_url.clone(),
            templates: build_templates()?,
        })
    }

    /// Mail the generated password to a newly approved guest.
    #[instrument(skip(self, password), err)]
    pub async fn send_credentials(&self, to_email: &str, to_name: &str, password: &str) -> Result<(), Error> {
        let body = self.credentials_body(to_name, to_email, password)?;
        self.send_email(to_email, Some(to_name), "Your account has been approved", &body)
            .await
    }

    #[instrument(skip(self, notice), err)]
    pub async fn send_appointment_confirmation(
        &self,
        to_email: &str,
        to_name: &str,
        notice: &AppointmentNotice<'_>,
    ) -> Result<(), Error> {
        let body = self.appointment_body(to_name, notice)?;
        self.send_email(to_email, Some(to_name), &format!("Appointment confirmed: {}", notice.topic), &body)
            .await
    }

    async fn send_email(&self, to_email: &str, to_name: Option<&str>, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let address = to_email.parse::<Address>().map_err(|e| Error::BadRequest {
            message: format!("Invalid recipient address: {e}"),
        })?;
        let to = Mailbox::new(to_name.map(str::to_string), address);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
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

        debug!(subject, "Email sent");
        Ok(())
    }

    fn credentials_body(&self, to_name: &str, login: &str, password: &str) -> Result<String, Error> {
        self.render(
            CREDENTIALS_TEMPLATE,
            context! {
                to_name,
                login,
                password,
                login_url => &self.login_url,
            },
        )
    }

    fn appointment_body(&self, to_name: &str, notice: &AppointmentNotice<'_>) -> Result<String, Error> {
        self.render(
            APPOINTMENT_TEMPLATE,
            context! {
                to_name,
                topic => notice.topic,
                when => notice.starts_at.format("%A %d %B %Y, %H:%M UTC").to_string(),
                minutes => notice.duration_minutes,
                join_url => notice.join_url,
            },
        )
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String, Error> {
        self.templates
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .map_err(|e| Error::Internal {
                operation: format!("render email template {name}: {e}"),
            })
    }
}

const CREDENTIALS_TEMPLATE: &str = "credentials.html";
const APPOINTMENT_TEMPLATE: &str = "appointment.html";

/// Templates ending in `.html` get minijinja's HTML auto-escaping.
fn build_templates() -> Result<Environment<'static>, Error> {
    let mut env = Environment::new();
    for (name, source) in [
        (
            CREDENTIALS_TEMPLATE,
            r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>Welcome aboard</h2>
    <p>Hello {{ to_name }},</p>
    <p>Your request has been approved and an account was created for you.</p>
    <p>Login: <strong>{{ login }}</strong><br>Password: <strong>{{ password }}</strong></p>
    <p>Sign in at <a href="{{ login_url }}">{{ login_url }}</a> and change your password after the first login.</p>
    <p style="font-size: 12px; color: #666;">This is an automated message, please do not reply to this email.</p>
</body>
</html>"#,
        ),
        (
            APPOINTMENT_TEMPLATE,
            r#"<!DOCTYPE html>
<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>Appointment confirmed</h2>
    <p>Hello {{ to_name }},</p>
    <p>Your appointment <strong>{{ topic }}</strong> is booked for {{ when }} ({{ minutes }} minutes).</p>
    {% if join_url %}<p>Join the meeting: <a href="{{ join_url }}">{{ join_url }}</a></p>
    {% else %}<p>The meeting link will follow in a separate message.</p>
    {% endif %}
</body>
</html>"#,
        ),
    ] {
        env.add_template(name, source).map_err(|e| Error::Internal {
            operation: format!("load email template {name}: {e}"),
        })?;
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use chrono::TimeZone;

    fn file_config(dir: &Path) -> Config {
        Config {
            email: EmailConfig {
                transport: EmailTransportConfig::File {
                    path: dir.to_string_lossy().to_string(),
                },
                login_url: "https://app.leadctl.example/login".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn notice(join_url: Option<&str>) -> AppointmentNotice<'_> {
        AppointmentNotice {
            topic: "Onboarding call",
            starts_at: Utc.with_ymd_and_hms(2030, 3, 4, 9, 30, 0).unwrap(),
            duration_minutes: 30,
            join_url,
        }
    }

    #[test]
    fn test_credentials_body() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        let body = service.credentials_body("Grace", "grace@acme.example", "s3cr3t-value").unwrap();

        assert!(body.contains("Hello Grace,"));
        assert!(body.contains("grace@acme.example"));
        assert!(body.contains("s3cr3t-value"));
        assert!(body.contains("app.leadctl.example"));
    }

    #[test]
    fn test_credentials_body_escapes_contact_name() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        let body = service
            .credentials_body(r#"<img src=x onerror="alert(1)">"#, "grace@acme.example", "pw")
            .unwrap();

        assert!(!body.contains("<img"));
        assert!(body.contains("&lt;img"));
    }

    #[test]
    fn test_appointment_body_without_link() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        let body = service.appointment_body("Linus", &notice(None)).unwrap();
        assert!(body.contains("Onboarding call"));
        assert!(body.contains("09:30 UTC"));
        assert!(body.contains("(30 minutes)"));
        assert!(body.contains("separate message"));
        assert!(!body.contains("Join the meeting"));
    }

    #[test]
    fn test_appointment_body_with_link() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        let body = service
            .appointment_body("Linus", &notice(Some("https://meet.example/j/123")))
            .unwrap();
        assert!(body.contains("Join the meeting"));
        assert!(body.contains("meet.example"));
        assert!(!body.contains("separate message"));
    }

    #[test]
    fn test_appointment_body_escapes_guest_input() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        let notice = AppointmentNotice {
            topic: "<script>steal()</script>",
            ..notice(None)
        };
        let body = service.appointment_body("Tom & Jerry", &notice).unwrap();

        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;"));
        assert!(body.contains("Tom &amp; Jerry"));
    }

    #[tokio::test]
    async fn test_display_name_with_comma_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        service
            .send_credentials("grace@acme.example", "Hopper, Grace", "pw")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();

        service
            .send_credentials("grace@acme.example", "Grace", "pw")
            .await
            .unwrap();

        let mut entries = std::fs::read_dir(dir.path()).unwrap();
        let written = entries.next().unwrap().unwrap().path();
        let content = std::fs::read_to_string(written).unwrap();
        assert!(content.contains("grace@acme.example"));
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let service = EmailService::new(&file_config(dir.path())).unwrap();
        let result = service.send_credentials("not an address", "X", "pw").await;
        assert!(matches!(result, Err(Error::BadRequest { .. })));
    }
}
