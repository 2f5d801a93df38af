pub mod config;
pub mod dispatcher;

use std::sync::Arc;

use notification_queue::NotificationQueue;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::sender::NotificationSender;

use self::config::WorkerConfig;
use self::dispatcher::Dispatcher;

pub use self::config::RetryPolicy;
pub use self::dispatcher::{CycleOutcome, DispatchError};

/// Notification worker that owns the single dispatch loop
pub struct NotificationWorker {
    queue: Arc<NotificationQueue>,
    sender: Arc<dyn NotificationSender>,
    config: WorkerConfig,
    shutdown_token: CancellationToken,
}

impl NotificationWorker {
    /// Creates a new notification worker with its own shutdown token
    #[must_use]
    pub fn new(
        queue: Arc<NotificationQueue>,
        sender: Arc<dyn NotificationSender>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            sender,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Uses an externally owned shutdown token, e.g. the process-wide one
    #[must_use]
    pub fn with_shutdown_token(mut self, shutdown_token: CancellationToken) -> Self {
        self.shutdown_token = shutdown_token;
        self
    }

    /// Returns a clone of the shutdown token for external control
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Spawns the dispatch loop as a background task
    #[must_use]
    pub fn spawn(self) -> WorkerHandle {
        let shutdown_token = self.shutdown_token.clone();
        let queue = Arc::clone(&self.queue);
        let dispatcher =
            Dispatcher::new(self.queue, self.sender, self.config, self.shutdown_token);

        let task = tokio::spawn(async move {
            dispatcher.run().await;
        });

        WorkerHandle {
            queue,
            shutdown_token,
            task,
        }
    }
}

/// Handle to a spawned notification worker
pub struct WorkerHandle {
    queue: Arc<NotificationQueue>,
    shutdown_token: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Returns a clone of the worker's shutdown token
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Whether the dispatch loop has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signals shutdown and waits for the dispatch loop to exit
    ///
    /// Jobs still queued are not delivered; their count is logged.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task panicked or was aborted
    pub async fn shutdown(self) -> anyhow::Result<()> {
        self.shutdown_token.cancel();
        info!("Notification worker shutdown initiated");
        self.join().await
    }

    /// Waits for the dispatch loop to exit without signalling it
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task panicked or was aborted
    pub async fn join(self) -> anyhow::Result<()> {
        if let Err(e) = self.task.await {
            error!("Notification worker task error: {}", e);
            return Err(e.into());
        }

        let abandoned = self.queue.len();
        if abandoned > 0 {
            info!(abandoned, "Notification worker stopped with undelivered jobs");
        } else {
            info!("Notification worker stopped");
        }
        Ok(())
    }
}
