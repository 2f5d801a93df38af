//! Notification delivery channels
//!
//! A sender performs exactly one delivery attempt per call over a fresh
//! connection. It never retries; the dispatch worker owns the retry policy.

mod error;
mod http_api;
mod logging;
mod smtp;

use std::sync::Arc;

use async_trait::async_trait;
use notification_queue::NotificationJob;

pub use error::SendError;
pub use http_api::{HttpApiConfig, HttpApiSender, CORRELATION_HEADER};
pub use logging::LogSender;
pub use smtp::{SmtpConfig, SmtpSender, SmtpTls};

/// One delivery attempt over an external channel
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// Delivers the job's rendered content to its recipient
    ///
    /// # Errors
    ///
    /// Returns `SendError` for any network, authentication or channel
    /// rejection failure
    async fn send(&self, job: &NotificationJob) -> Result<(), SendError>;

    /// Short channel name for logs
    fn channel(&self) -> &'static str;
}

/// Mailbox notifications are sent from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// Delivery channel selected at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// SMTP session per message
    Smtp(SmtpConfig),
    /// HTTPS email API call per message
    HttpApi(HttpApiConfig),
    /// Write messages to the log (development)
    Log,
}

impl DeliveryChannel {
    /// Channel name, safe to log
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Smtp(_) => "smtp",
            Self::HttpApi(_) => "http",
            Self::Log => "log",
        }
    }
}

/// Builds the sender for a delivery channel
///
/// # Errors
///
/// Returns `SendError` if the channel configuration is unusable, e.g. an
/// unparsable sender address
pub fn build_sender(channel: DeliveryChannel) -> Result<Arc<dyn NotificationSender>, SendError> {
    let sender: Arc<dyn NotificationSender> = match channel {
        DeliveryChannel::Smtp(config) => Arc::new(SmtpSender::new(config)?),
        DeliveryChannel::HttpApi(config) => Arc::new(HttpApiSender::new(config)?),
        DeliveryChannel::Log => Arc::new(LogSender),
    };
    Ok(sender)
}
