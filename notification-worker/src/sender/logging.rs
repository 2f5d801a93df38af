use async_trait::async_trait;
use notification_queue::NotificationJob;
use tracing::info;

use super::{NotificationSender, SendError};

/// Development sender that writes each message to the log
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        info!(
            job_id = %job.job_id,
            correlation_id = %job.correlation_id,
            to = %job.recipient_address,
            subject = %job.subject,
            body_len = job.rendered_body.len(),
            "Email (log channel)"
        );
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "log"
    }
}
