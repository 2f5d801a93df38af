use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// What a notification job is about, used for log correlation
#[derive(Debug, Clone, Copy, Default, Display, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    /// Order confirmation sent to the customer
    CustomerConfirmation,
    /// New-order alert sent to the store admin
    AdminAlert,
    /// Any other notification enqueued by a collaborator
    #[default]
    Generic,
}

/// A single notification to be delivered to a single recipient
///
/// Content is rendered before enqueue and owned by the job, so later changes
/// to the order it came from do not alter what gets delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationJob {
    /// Identifier shared by every attempt of this job
    pub job_id: Uuid,
    /// Kind of notification
    pub kind: NotificationKind,
    /// Recipient email address, validated upstream
    pub recipient_address: String,
    /// Recipient display name
    pub recipient_display_name: String,
    /// Rendered subject line
    pub subject: String,
    /// Rendered HTML body
    pub rendered_body: String,
    /// Number of failed delivery attempts so far
    pub attempt_count: u32,
    /// When the job was first enqueued (observability only)
    pub enqueued_at: DateTime<Utc>,
    /// Opaque identifier for log correlation, e.g. the order number
    pub correlation_id: String,
}

impl NotificationJob {
    /// Creates a new `generic` job with no attempts recorded
    #[must_use]
    pub fn new(
        recipient_address: impl Into<String>,
        recipient_display_name: impl Into<String>,
        subject: impl Into<String>,
        rendered_body: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            kind: NotificationKind::Generic,
            recipient_address: recipient_address.into(),
            recipient_display_name: recipient_display_name.into(),
            subject: subject.into(),
            rendered_body: rendered_body.into(),
            attempt_count: 0,
            enqueued_at: Utc::now(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Sets the notification kind
    #[must_use]
    pub const fn with_kind(mut self, kind: NotificationKind) -> Self {
        self.kind = kind;
        self
    }
}
