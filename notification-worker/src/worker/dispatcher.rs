use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use metrics::counter;
use notification_queue::{NotificationJob, NotificationQueue};
use thiserror::Error;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::config::WorkerConfig;
use crate::sender::{NotificationSender, SendError};

/// Faults in a dispatch cycle that are not ordinary delivery failures
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The sender panicked while delivering a job
    #[error("Sender panicked while delivering job {job_id}: {message}")]
    SenderPanicked {
        /// Job being delivered
        job_id: Uuid,
        /// Panic payload, if it was a string
        message: String,
    },

    /// Something other than the sender panicked during a cycle
    #[error("Dispatch cycle panicked: {message}")]
    CyclePanicked {
        /// Panic payload, if it was a string
        message: String,
    },
}

/// What a single dispatch cycle did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Queue was empty
    Idle,
    /// Job delivered and discarded
    Delivered,
    /// Job failed and was put back at the tail of the queue
    Retried,
    /// Job failed for the last time and was discarded
    Dropped,
}

/// Single consumer that drains the queue into a sender
pub struct Dispatcher {
    queue: Arc<NotificationQueue>,
    sender: Arc<dyn NotificationSender>,
    config: WorkerConfig,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`
    #[must_use]
    pub const fn new(
        queue: Arc<NotificationQueue>,
        sender: Arc<dyn NotificationSender>,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            queue,
            sender,
            config,
            shutdown,
        }
    }

    /// Runs dispatch cycles until the shutdown token is cancelled
    ///
    /// Never returns early because of a job: delivery failures go through the
    /// retry policy, and any fault or panic inside a cycle is followed by a
    /// cooldown.
    pub async fn run(self) {
        info!(
            channel = self.sender.channel(),
            max_attempts = self.config.retry.max_attempts,
            "Dispatch worker started"
        );

        if self.pause(self.config.startup_delay).await {
            while !self.shutdown.is_cancelled() {
                let outcome = AssertUnwindSafe(self.run_cycle())
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|payload| {
                        Err(DispatchError::CyclePanicked {
                            message: panic_message(payload.as_ref()),
                        })
                    });

                let keep_running = match outcome {
                    Ok(CycleOutcome::Idle) => self.pause(self.config.idle_interval).await,
                    Ok(_) => true,
                    Err(e) => {
                        counter!("notification_worker_faults").increment(1);
                        error!(
                            error = %e,
                            cooldown_ms = millis(self.config.fault_cooldown),
                            "Dispatch cycle failed, cooling down"
                        );
                        self.pause(self.config.fault_cooldown).await
                    }
                };

                if !keep_running {
                    break;
                }
            }
        }

        info!("Dispatch worker stopped");
    }

    /// Dequeues at most one job and makes one delivery attempt
    ///
    /// # Errors
    ///
    /// Returns `DispatchError` if the sender panicked; the job has already
    /// been requeued or dropped according to the retry policy
    pub async fn run_cycle(&self) -> Result<CycleOutcome, DispatchError> {
        let Some(job) = self.queue.try_dequeue() else {
            return Ok(CycleOutcome::Idle);
        };

        self.process(job).await
    }

    #[instrument(
        skip(self, job),
        fields(job_id = %job.job_id, correlation_id = %job.correlation_id, kind = %job.kind)
    )]
    async fn process(&self, mut job: NotificationJob) -> Result<CycleOutcome, DispatchError> {
        let max_attempts = self.config.retry.max_attempts;
        info!(
            attempt = job.attempt_count + 1,
            max_attempts,
            channel = self.sender.channel(),
            "Attempting notification delivery"
        );

        let result = AssertUnwindSafe(self.sender.send(&job))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => {
                counter!("notification_delivered").increment(1);
                info!(
                    attempt = job.attempt_count + 1,
                    max_attempts,
                    queued_ms = (Utc::now() - job.enqueued_at).num_milliseconds(),
                    "Notification delivered"
                );
                Ok(CycleOutcome::Delivered)
            }
            Ok(Err(e)) => {
                job.attempt_count += 1;
                Ok(self.handle_failure(job, &e).await)
            }
            Err(payload) => {
                job.attempt_count += 1;
                let job_id = job.job_id;
                let message = panic_message(payload.as_ref());
                // The fault cooldown that follows stands in for the retry delay
                if self.config.retry.should_retry(job.attempt_count) {
                    self.queue.requeue(job);
                } else {
                    self.drop_job(&job, &message);
                }
                Err(DispatchError::SenderPanicked { job_id, message })
            }
        }
    }

    async fn handle_failure(&self, job: NotificationJob, err: &SendError) -> CycleOutcome {
        let max_attempts = self.config.retry.max_attempts;

        if !self.config.retry.should_retry(job.attempt_count) {
            self.drop_job(&job, &err.to_string());
            return CycleOutcome::Dropped;
        }

        counter!("notification_retried").increment(1);
        warn!(
            attempt = job.attempt_count,
            max_attempts,
            error = %err,
            permanent = err.is_permanent(),
            retry_in_ms = millis(self.config.retry.retry_delay),
            "Notification delivery failed, will retry"
        );

        if !self.pause(self.config.retry.retry_delay).await {
            info!("Shutdown during retry delay, returning job to queue");
        }
        self.queue.requeue(job);
        CycleOutcome::Retried
    }

    fn drop_job(&self, job: &NotificationJob, reason: &str) {
        counter!("notification_dropped").increment(1);
        error!(
            attempts = job.attempt_count,
            max_attempts = self.config.retry.max_attempts,
            recipient = %job.recipient_address,
            error = %reason,
            "Notification dropped after exhausting retries"
        );
    }

    /// Sleeps for `duration` unless shutdown is requested first
    ///
    /// Returns `false` if the sleep was interrupted by shutdown.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.shutdown.is_cancelled();
        }

        tokio::select! {
            () = self.shutdown.cancelled() => false,
            () = sleep(duration) => true,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
