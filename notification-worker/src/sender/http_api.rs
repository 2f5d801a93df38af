use std::time::Duration;

use async_trait::async_trait;
use notification_queue::NotificationJob;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{NotificationSender, SendError, SenderIdentity};

/// Header carrying the job's correlation id to the email provider
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// HTTPS email API settings
#[derive(Clone, PartialEq, Eq)]
pub struct HttpApiConfig {
    /// Full URL of the provider's send endpoint
    pub endpoint: String,
    /// Bearer token for the provider
    pub api_key: String,
    /// From mailbox
    pub identity: SenderIdentity,
    /// Request timeout, connection included
    pub timeout: Duration,
}

impl std::fmt::Debug for HttpApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpApiConfig")
            .field("endpoint", &self.endpoint)
            .field("identity", &self.identity)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Email address with optional display name, as sent to the provider
#[derive(Debug, Serialize)]
struct ApiMailbox<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    name: &'a str,
}

/// Request body for the provider's send endpoint
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailRequest<'a> {
    from: ApiMailbox<'a>,
    to: Vec<ApiMailbox<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

/// Sends each notification with one HTTPS call to an email API
pub struct HttpApiSender {
    client: Client,
    config: HttpApiConfig,
}

impl HttpApiSender {
    /// Creates a new HTTP API sender
    ///
    /// Idle connections are not kept, so every send opens a new connection.
    ///
    /// # Errors
    ///
    /// Returns `SendError::Connection` if the HTTP client cannot be built
    pub fn new(config: HttpApiConfig) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| SendError::Connection(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn classify_status(&self, status: StatusCode, body: String) -> SendError {
        let reason = format!("{status}: {body}");
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SendError::Authentication(reason),
            StatusCode::REQUEST_TIMEOUT => SendError::Timeout(self.config.timeout),
            StatusCode::TOO_MANY_REQUESTS => SendError::Rejected {
                permanent: false,
                reason,
            },
            s if s.is_server_error() => SendError::Rejected {
                permanent: false,
                reason,
            },
            _ => SendError::Rejected {
                permanent: true,
                reason,
            },
        }
    }
}

#[async_trait]
impl NotificationSender for HttpApiSender {
    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        let request = SendEmailRequest {
            from: ApiMailbox {
                email: &self.config.identity.email,
                name: &self.config.identity.name,
            },
            to: vec![ApiMailbox {
                email: &job.recipient_address,
                name: &job.recipient_display_name,
            }],
            subject: &job.subject,
            html_content: &job.rendered_body,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .header(CORRELATION_HEADER, &job.correlation_id)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SendError::Timeout(self.config.timeout)
                } else {
                    SendError::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(job_id = %job.job_id, %status, "Email API accepted message");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(self.classify_status(status, body))
    }

    fn channel(&self) -> &'static str {
        "http"
    }
}
