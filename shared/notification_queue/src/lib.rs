//! In-process notification queue for the storefront
//!
//! This crate holds the order-notification job model, the unbounded FIFO the
//! checkout path enqueues into, and the builder that turns a committed order
//! into its customer and admin notification jobs.

#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

/// Order-placed notification builder
pub mod order;
/// Job queue shared between producers and the dispatch worker
pub mod queue;
/// Job model
pub mod types;

pub use order::{OrderLine, OrderNotificationSettings, OrderNotifier, PlacedOrder};
pub use queue::NotificationQueue;
pub use types::{NotificationJob, NotificationKind};
