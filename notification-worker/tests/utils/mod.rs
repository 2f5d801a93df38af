#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use notification_queue::{NotificationJob, NotificationQueue};
use notification_worker::sender::{NotificationSender, SendError};
use notification_worker::worker::config::WorkerConfig;
use notification_worker::worker::{NotificationWorker, RetryPolicy, WorkerHandle};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Setup test environment variables and tracing
pub fn setup_test_env() {
    dotenvy::from_path(".env.example").ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Default dispatch policy with no startup pause, so tests start draining immediately
pub fn test_config() -> WorkerConfig {
    WorkerConfig {
        startup_delay: Duration::ZERO,
        ..WorkerConfig::default()
    }
}

/// Fast polling policy for tests that run on wall-clock time
pub fn fast_config() -> WorkerConfig {
    WorkerConfig {
        idle_interval: Duration::from_millis(5),
        retry: RetryPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(5),
        },
        fault_cooldown: Duration::from_millis(5),
        startup_delay: Duration::ZERO,
    }
}

/// Enqueues a job whose correlation id doubles as its test label
pub fn enqueue_labelled(queue: &NotificationQueue, label: &str) {
    queue.enqueue_notification(
        &format!("{label}@example.com"),
        label,
        &format!("Subject {label}"),
        &format!("<p>{label}</p>"),
        label,
    );
}

/// Spawns a worker over `queue` and `sender`
pub fn spawn_worker(
    queue: &Arc<NotificationQueue>,
    sender: Arc<dyn NotificationSender>,
    config: WorkerConfig,
) -> WorkerHandle {
    NotificationWorker::new(Arc::clone(queue), sender, config).spawn()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    Failed,
    Panicked,
}

/// One recorded call into the sender
#[derive(Debug, Clone)]
pub struct Attempt {
    pub label: String,
    pub recipient: String,
    /// Failed attempts the job carried when it was handed to the sender
    pub prior_failures: u32,
    pub outcome: Outcome,
    pub started: Instant,
    pub finished: Instant,
}

/// Sender that records every call and fails or panics for chosen labels
#[derive(Default)]
pub struct RecordingSender {
    attempts: Mutex<Vec<Attempt>>,
    always_failing: HashSet<String>,
    panicking: HashSet<String>,
    remaining_failures: Mutex<HashMap<String, u32>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always_failing(mut self, label: &str) -> Self {
        self.always_failing.insert(label.to_string());
        self
    }

    pub fn failing_first(self, label: &str, failures: u32) -> Self {
        self.remaining_failures
            .lock()
            .unwrap()
            .insert(label.to_string(), failures);
        self
    }

    pub fn panicking(mut self, label: &str) -> Self {
        self.panicking.insert(label.to_string());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.attempts.lock().unwrap().clone()
    }

    /// `label:outcome` pairs in call order
    pub fn trace(&self) -> Vec<String> {
        self.attempts()
            .iter()
            .map(|a| format!("{}:{:?}", a.label, a.outcome))
            .collect()
    }

    pub fn attempts_for(&self, label: &str) -> Vec<Attempt> {
        self.attempts()
            .into_iter()
            .filter(|a| a.label == label)
            .collect()
    }

    pub fn delivered_count(&self) -> usize {
        self.attempts()
            .iter()
            .filter(|a| a.outcome == Outcome::Delivered)
            .count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn decide(&self, label: &str) -> Outcome {
        if self.panicking.contains(label) {
            return Outcome::Panicked;
        }
        if self.always_failing.contains(label) {
            return Outcome::Failed;
        }
        let mut remaining = self.remaining_failures.lock().unwrap();
        match remaining.get_mut(label) {
            Some(left) if *left > 0 => {
                *left -= 1;
                Outcome::Failed
            }
            _ => Outcome::Delivered,
        }
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        let started = Instant::now();
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let outcome = self.decide(&job.correlation_id);
        self.attempts.lock().unwrap().push(Attempt {
            label: job.correlation_id.clone(),
            recipient: job.recipient_address.clone(),
            prior_failures: job.attempt_count,
            outcome,
            started,
            finished: Instant::now(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Outcome::Delivered => Ok(()),
            Outcome::Failed => Err(SendError::Connection("connection refused".to_string())),
            Outcome::Panicked => panic!("sender exploded on {}", job.correlation_id),
        }
    }

    fn channel(&self) -> &'static str {
        "recording"
    }
}

/// Sender whose first call never completes
#[derive(Default)]
pub struct StuckSender {
    pub entered: Notify,
    calls: AtomicUsize,
}

impl StuckSender {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSender for StuckSender {
    async fn send(&self, _job: &NotificationJob) -> Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        std::future::pending::<()>().await;
        Ok(())
    }

    fn channel(&self) -> &'static str {
        "stuck"
    }
}

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// Tracing layer that panics the first time it sees a given log message
///
/// Lets tests fail a dispatch cycle outside the sender.
pub struct PanicOnMessage {
    message: &'static str,
    fired: AtomicBool,
}

impl PanicOnMessage {
    pub const fn new(message: &'static str) -> Self {
        Self {
            message,
            fired: AtomicBool::new(false),
        }
    }
}

impl<S: Subscriber> Layer<S> for PanicOnMessage {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.0 == self.message && !self.fired.swap(true, Ordering::SeqCst) {
            panic!("log sink failed on {:?}", self.message);
        }
    }
}
