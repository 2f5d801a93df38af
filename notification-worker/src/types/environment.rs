//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use notification_queue::OrderNotificationSettings;

use crate::sender::{DeliveryChannel, HttpApiConfig, SenderIdentity, SmtpConfig, SmtpTls};
use crate::worker::config::{RetryPolicy, WorkerConfig};

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (emails are written to the log by default)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Returns the delivery channel configured for this environment
    ///
    /// # Panics
    ///
    /// Panics if `EMAIL_CHANNEL` is invalid, or if the selected channel's
    /// credentials are missing outside development
    #[must_use]
    pub fn delivery_channel(&self) -> DeliveryChannel {
        let default_channel = match self {
            Self::Production | Self::Staging => "smtp",
            Self::Development => "log",
        };
        let channel = env::var("EMAIL_CHANNEL")
            .unwrap_or_else(|_| default_channel.to_string())
            .trim()
            .to_lowercase();

        match channel.as_str() {
            "smtp" => DeliveryChannel::Smtp(self.smtp_config()),
            "http" => DeliveryChannel::HttpApi(self.http_api_config()),
            "log" => DeliveryChannel::Log,
            _ => panic!("Invalid email channel: {channel}"),
        }
    }

    /// SMTP settings, read once at startup
    ///
    /// # Panics
    ///
    /// Panics if `EMAIL_USER` or `EMAIL_PASS` is unset outside development,
    /// or if `SMTP_TLS` is invalid
    #[must_use]
    pub fn smtp_config(&self) -> SmtpConfig {
        let username = self.required_outside_development("EMAIL_USER");
        let password = self.required_outside_development("EMAIL_PASS");
        let credentials = if username.is_empty() {
            None
        } else {
            Some((username, password))
        };

        SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            port: parse_var("SMTP_PORT", 587),
            tls: Self::smtp_tls(),
            credentials,
            identity: self.sender_identity(),
            timeout: self.send_timeout(),
        }
    }

    /// HTTP email API settings, read once at startup
    ///
    /// # Panics
    ///
    /// Panics if `EMAIL_API_URL` or `EMAIL_API_KEY` is unset
    #[must_use]
    pub fn http_api_config(&self) -> HttpApiConfig {
        HttpApiConfig {
            endpoint: env::var("EMAIL_API_URL")
                .expect("EMAIL_API_URL environment variable is not set"),
            api_key: env::var("EMAIL_API_KEY")
                .expect("EMAIL_API_KEY environment variable is not set"),
            identity: self.sender_identity(),
            timeout: self.send_timeout(),
        }
    }

    /// Sender mailbox used on every outgoing notification
    #[must_use]
    pub fn sender_identity(&self) -> SenderIdentity {
        let email = env::var("FROM_EMAIL")
            .or_else(|_| env::var("EMAIL_USER"))
            .unwrap_or_else(|_| "info.bazario.store@gmail.com".to_string());

        SenderIdentity {
            name: env::var("FROM_NAME").unwrap_or_else(|_| "BAZARIO".to_string()),
            email,
        }
    }

    /// Order notification settings for the checkout flow
    #[must_use]
    pub fn order_notification_settings(&self) -> OrderNotificationSettings {
        OrderNotificationSettings {
            store_name: env::var("STORE_NAME").unwrap_or_else(|_| "BAZARIO".to_string()),
            admin_name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Admin".to_string()),
            admin_email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| self.sender_identity().email),
        }
    }

    /// Connection timeout applied by every delivery channel
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(parse_var("EMAIL_SEND_TIMEOUT_SECS", 30))
    }

    /// Dispatch worker timings and retry policy
    #[must_use]
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::from_environment(self)
    }

    /// Retry ceiling and delay between attempts
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: parse_var::<u32>("NOTIFY_MAX_ATTEMPTS", 3).max(1),
            retry_delay: Duration::from_millis(parse_var("NOTIFY_RETRY_DELAY_MS", 5000)),
        }
    }

    /// Sleep between polls of an empty queue
    #[must_use]
    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(parse_var("NOTIFY_IDLE_INTERVAL_MS", 2000))
    }

    /// Cooldown after an unexpected fault in a dispatch cycle
    #[must_use]
    pub fn fault_cooldown(&self) -> Duration {
        Duration::from_millis(parse_var("NOTIFY_FAULT_COOLDOWN_MS", 5000))
    }

    /// Delay before the worker first polls the queue
    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(parse_var("NOTIFY_STARTUP_DELAY_MS", 3000))
    }

    /// DogStatsD agent address, if metrics should be exported
    ///
    /// Read from `DD_AGENT_HOST` and `DD_DOGSTATSD_PORT` (default 8125).
    #[must_use]
    pub fn metrics_agent_address(&self) -> Option<String> {
        let host = env::var("DD_AGENT_HOST").ok().filter(|h| !h.trim().is_empty())?;
        let port: u16 = parse_var("DD_DOGSTATSD_PORT", 8125);
        Some(format!("{}:{port}", host.trim()))
    }

    /// Port for the health check server
    #[must_use]
    pub fn health_port(&self) -> u16 {
        parse_var("PORT", 8001)
    }

    fn smtp_tls() -> SmtpTls {
        let tls = env::var("SMTP_TLS")
            .unwrap_or_else(|_| "starttls".to_string())
            .trim()
            .to_lowercase();

        match tls.as_str() {
            "starttls" => SmtpTls::StartTls,
            "tls" => SmtpTls::Implicit,
            "none" => SmtpTls::None,
            _ => panic!("Invalid SMTP TLS mode: {tls}"),
        }
    }

    fn required_outside_development(&self, key: &str) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is not set"))
            }
            Self::Development => env::var(key).unwrap_or_default(),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Production => write!(f, "production"),
            Self::Staging => write!(f, "staging"),
            Self::Development => write!(f, "development"),
        }
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
