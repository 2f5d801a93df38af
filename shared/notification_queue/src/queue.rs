//! Notification queue operations
//!
//! An unbounded, thread-safe FIFO of pending notification jobs. Any number of
//! checkout paths may enqueue concurrently; a single dispatch worker drains it.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tracing::{error, info};
use uuid::Uuid;

use crate::types::NotificationJob;

/// Queue of pending notification jobs
///
/// The queue owns both ends of an unbounded channel, so a send can only fail
/// if the queue itself is being dropped.
pub struct NotificationQueue {
    tx: flume::Sender<NotificationJob>,
    rx: flume::Receiver<NotificationJob>,
    enqueued_total: AtomicU64,
}

impl NotificationQueue {
    /// Creates a new empty queue
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            tx,
            rx,
            enqueued_total: AtomicU64::new(0),
        }
    }

    /// Adds a job at the tail of the queue
    ///
    /// Never blocks and never performs I/O, so it is safe to call from the
    /// request path right after the order is committed.
    pub fn enqueue(&self, job: NotificationJob) {
        let job_id = job.job_id;
        let correlation_id = job.correlation_id.clone();
        let kind = job.kind;

        if let Err(e) = self.tx.send(job) {
            error!(%job_id, %correlation_id, "Failed to enqueue notification: {}", e);
            return;
        }

        self.enqueued_total.fetch_add(1, Ordering::Relaxed);
        counter!("notification_enqueued").increment(1);
        info!(
            %job_id,
            %correlation_id,
            %kind,
            depth = self.len(),
            "Notification enqueued"
        );
    }

    /// Builds a job from rendered content and enqueues it
    ///
    /// # Returns
    ///
    /// The id of the enqueued job
    pub fn enqueue_notification(
        &self,
        recipient_address: &str,
        recipient_display_name: &str,
        subject: &str,
        rendered_body: &str,
        correlation_id: &str,
    ) -> Uuid {
        let job = NotificationJob::new(
            recipient_address,
            recipient_display_name,
            subject,
            rendered_body,
            correlation_id,
        );
        let job_id = job.job_id;
        self.enqueue(job);
        job_id
    }

    /// Takes the job at the head of the queue, if any, without waiting
    #[must_use]
    pub fn try_dequeue(&self) -> Option<NotificationJob> {
        self.rx.try_recv().ok()
    }

    /// Puts a job that failed delivery back at the tail of the queue
    pub fn requeue(&self, job: NotificationJob) {
        let job_id = job.job_id;
        if let Err(e) = self.tx.send(job) {
            error!(%job_id, "Failed to requeue notification: {}", e);
        }
    }

    /// Number of jobs waiting in the queue
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no jobs are waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Number of jobs enqueued since the queue was created, retries excluded
    #[must_use]
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total.load(Ordering::Relaxed)
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}
