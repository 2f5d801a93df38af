//! Order-placed notifications
//!
//! Called by the checkout flow once the order row is committed. Builds the
//! customer confirmation and the admin alert and hands both to the queue.

use std::fmt::Write as _;
use std::sync::Arc;

use uuid::Uuid;

use crate::queue::NotificationQueue;
use crate::types::{NotificationJob, NotificationKind};

/// One line of a committed order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    /// Product name as shown to the customer
    pub product_name: String,
    /// Quantity ordered
    pub quantity: u32,
    /// Unit price in minor currency units
    pub unit_price_minor: u64,
    /// Selected size, if the product has sizes
    pub size: Option<String>,
}

/// A committed order, as seen by the notification builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    /// Order number
    pub order_id: i64,
    /// Public tracking code
    pub tracking_id: String,
    /// Customer name
    pub customer_name: String,
    /// Customer email, validated by the checkout form
    pub customer_email: String,
    /// Payment method chosen at checkout
    pub payment_method: String,
    /// Ordered lines
    pub lines: Vec<OrderLine>,
    /// Order total in minor currency units
    pub total_minor: u64,
}

/// Static settings for order notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderNotificationSettings {
    /// Store name used in subjects
    pub store_name: String,
    /// Display name of the admin recipient
    pub admin_name: String,
    /// Admin mailbox receiving new-order alerts
    pub admin_email: String,
}

/// Turns committed orders into queued notification jobs
pub struct OrderNotifier {
    queue: Arc<NotificationQueue>,
    settings: OrderNotificationSettings,
}

impl OrderNotifier {
    /// Creates a new order notifier
    #[must_use]
    pub const fn new(queue: Arc<NotificationQueue>, settings: OrderNotificationSettings) -> Self {
        Self { queue, settings }
    }

    /// Enqueues the customer confirmation and then the admin alert
    ///
    /// Must only be called after the order is durably committed. Returns
    /// before any delivery is attempted.
    ///
    /// # Returns
    ///
    /// The ids of the enqueued jobs, customer confirmation first
    pub fn order_placed(&self, order: &PlacedOrder) -> Vec<Uuid> {
        [
            customer_confirmation(order, &self.settings),
            admin_alert(order, &self.settings),
        ]
        .into_iter()
        .map(|job| {
            let job_id = job.job_id;
            self.queue.enqueue(job);
            job_id
        })
        .collect()
    }
}

/// Builds the confirmation sent to the customer
#[must_use]
pub fn customer_confirmation(
    order: &PlacedOrder,
    settings: &OrderNotificationSettings,
) -> NotificationJob {
    let mut body = format!(
        "<h2>Thank you {}</h2><p>Your order #{} is confirmed.</p>",
        escape_html(&order.customer_name),
        order.order_id
    );
    push_lines(&mut body, order);
    let _ = write!(
        body,
        "<p>Tracking ID: <strong>{}</strong></p>",
        escape_html(&order.tracking_id)
    );

    NotificationJob::new(
        order.customer_email.as_str(),
        order.customer_name.as_str(),
        format!("Order Confirmed - {} #{}", settings.store_name, order.order_id),
        body,
        order.order_id.to_string(),
    )
    .with_kind(NotificationKind::CustomerConfirmation)
}

/// Builds the new-order alert sent to the store admin
#[must_use]
pub fn admin_alert(order: &PlacedOrder, settings: &OrderNotificationSettings) -> NotificationJob {
    let mut body = format!(
        "<h2>New Order</h2><p>Order #{} by {} ({})</p><p>Payment: {}</p>",
        order.order_id,
        escape_html(&order.customer_name),
        escape_html(&order.customer_email),
        escape_html(&order.payment_method)
    );
    push_lines(&mut body, order);

    NotificationJob::new(
        settings.admin_email.as_str(),
        settings.admin_name.as_str(),
        format!("New Order #{}", order.order_id),
        body,
        order.order_id.to_string(),
    )
    .with_kind(NotificationKind::AdminAlert)
}

fn push_lines(body: &mut String, order: &PlacedOrder) {
    body.push_str("<ul>");
    for line in &order.lines {
        let size = line
            .size
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!(" ({})", escape_html(s)))
            .unwrap_or_default();
        let _ = write!(
            body,
            "<li>{}{} &times; {} @ {}</li>",
            escape_html(&line.product_name),
            size,
            line.quantity,
            format_minor(line.unit_price_minor)
        );
    }
    let _ = write!(
        body,
        "</ul><p>Total: {}</p>",
        format_minor(order.total_minor)
    );
}

fn format_minor(amount: u64) -> String {
    format!("{}.{:02}", amount / 100, amount % 100)
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
