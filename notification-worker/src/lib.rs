#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

pub mod health;
pub mod sender;
pub mod types;
pub mod worker;

use std::sync::Arc;

use notification_queue::{NotificationQueue, OrderNotifier};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::sender::{build_sender, DeliveryChannel, SendError};
use crate::types::environment::Environment;
use crate::worker::{NotificationWorker, WorkerHandle};

/// Running notification pipeline
///
/// The storefront keeps `notifier` for its checkout path; the worker drains
/// `queue` until the shutdown token passed to [`start`] is cancelled.
pub struct NotificationService {
    /// Queue shared by the notifier and the worker
    pub queue: Arc<NotificationQueue>,
    /// Producer for order-placed notifications
    pub notifier: OrderNotifier,
    /// Handle to the dispatch worker
    pub worker: WorkerHandle,
}

/// Builds the delivery channel for `env` and starts the dispatch worker
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns `SendError` if the configured channel is unusable, e.g. an
/// unparsable sender address
///
/// # Panics
///
/// Panics if required configuration is missing, see [`Environment`]
pub fn start(
    env: &Environment,
    shutdown_token: CancellationToken,
) -> Result<NotificationService, SendError> {
    let channel = env.delivery_channel();
    log_channel(&channel);
    let sender = build_sender(channel)?;

    let worker_config = env.worker_config();
    info!(
        idle_interval = ?worker_config.idle_interval,
        retry_delay = ?worker_config.retry.retry_delay,
        max_attempts = worker_config.retry.max_attempts,
        shutdown_bound = ?worker_config.longest_sleep(),
        "Dispatch policy"
    );

    let queue = Arc::new(NotificationQueue::new());
    let settings = env.order_notification_settings();
    info!(
        store = %settings.store_name,
        admin = %settings.admin_email,
        "Order notifications enabled"
    );
    let notifier = OrderNotifier::new(Arc::clone(&queue), settings);

    let worker = NotificationWorker::new(Arc::clone(&queue), sender, worker_config)
        .with_shutdown_token(shutdown_token)
        .spawn();

    Ok(NotificationService {
        queue,
        notifier,
        worker,
    })
}

fn log_channel(channel: &DeliveryChannel) {
    match channel {
        DeliveryChannel::Smtp(config) => info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            authenticated = config.credentials.is_some(),
            from = %config.identity.email,
            "Email channel: SMTP"
        ),
        DeliveryChannel::HttpApi(config) => info!(
            endpoint = %config.endpoint,
            from = %config.identity.email,
            "Email channel: HTTP API"
        ),
        DeliveryChannel::Log => info!("Email channel: log only"),
    }
}
