use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use notification_queue::NotificationJob;
use tracing::debug;

use super::{NotificationSender, SendError, SenderIdentity};

/// SMTP reply code for rejected credentials
const AUTH_FAILED: &str = "535";

/// How the SMTP session is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (usually port 587)
    StartTls,
    /// TLS from the first byte (usually port 465)
    Implicit,
    /// No TLS, for local relays only
    None,
}

/// SMTP delivery settings
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// Relay host
    pub host: String,
    /// Relay port
    pub port: u16,
    /// Session security
    pub tls: SmtpTls,
    /// Username and password, if the relay requires authentication
    pub credentials: Option<(String, String)>,
    /// From mailbox
    pub identity: SenderIdentity,
    /// Upper bound for one whole session
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .field("identity", &self.identity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Sends each notification over its own SMTP session
pub struct SmtpSender {
    config: SmtpConfig,
    from: Mailbox,
}

impl SmtpSender {
    /// Creates a new SMTP sender
    ///
    /// # Errors
    ///
    /// Returns `SendError::InvalidAddress` if the configured sender address
    /// cannot be parsed
    pub fn new(config: SmtpConfig) -> Result<Self, SendError> {
        let from = mailbox(&config.identity.name, &config.identity.email)?;
        Ok(Self { config, from })
    }

    /// Builds a transport for a single session
    ///
    /// The transport is built without a connection pool, so each send opens
    /// and closes its own connection.
    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
        let builder = match self.config.tls {
            SmtpTls::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                    .map_err(|e| SendError::Connection(e.to_string()))?
            }
            SmtpTls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
                .map_err(|e| SendError::Connection(e.to_string()))?,
            SmtpTls::None => {
                AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(self.config.host.as_str())
            }
        };

        let mut builder = builder
            .port(self.config.port)
            .timeout(Some(self.config.timeout));
        if let Some((username, password)) = &self.config.credentials {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    fn message(&self, job: &NotificationJob) -> Result<Message, SendError> {
        let to = mailbox(&job.recipient_display_name, &job.recipient_address)?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(job.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(job.rendered_body.clone())
            .map_err(|e| SendError::InvalidMessage(e.to_string()))
    }

    fn classify(&self, err: &lettre::transport::smtp::Error) -> SendError {
        if err.is_timeout() {
            return SendError::Timeout(self.config.timeout);
        }

        let status = err.status().map(|code| code.to_string());
        if err.is_permanent() {
            if status.as_deref() == Some(AUTH_FAILED) {
                return SendError::Authentication(err.to_string());
            }
            return SendError::Rejected {
                permanent: true,
                reason: err.to_string(),
            };
        }
        if err.is_transient() {
            return SendError::Rejected {
                permanent: false,
                reason: err.to_string(),
            };
        }

        SendError::Connection(err.to_string())
    }
}

#[async_trait]
impl NotificationSender for SmtpSender {
    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        let message = self.message(job)?;
        let transport = self.transport()?;

        debug!(
            job_id = %job.job_id,
            host = %self.config.host,
            port = self.config.port,
            "Opening SMTP session"
        );

        match tokio::time::timeout(self.config.timeout, transport.send(message)).await {
            Ok(Ok(response)) => {
                debug!(job_id = %job.job_id, code = %response.code(), "SMTP relay accepted message");
                Ok(())
            }
            Ok(Err(e)) => Err(self.classify(&e)),
            Err(_) => Err(SendError::Timeout(self.config.timeout)),
        }
    }

    fn channel(&self) -> &'static str {
        "smtp"
    }
}

fn mailbox(name: &str, email: &str) -> Result<Mailbox, SendError> {
    let address = email
        .parse::<Address>()
        .map_err(|e| SendError::InvalidAddress(format!("{email}: {e}")))?;
    let name = Some(name.to_string()).filter(|n| !n.is_empty());
    Ok(Mailbox::new(name, address))
}
