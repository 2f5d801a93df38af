use std::time::Duration;

use thiserror::Error;

/// Error types for a single delivery attempt
#[derive(Error, Debug)]
pub enum SendError {
    /// Sender or recipient address could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Message could not be built from the job
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Channel could not be reached or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// Channel refused our credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Channel did not answer within the connection timeout
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Channel accepted the connection but rejected the message
    #[error("Rejected by channel: {reason}")]
    Rejected {
        /// Whether the channel reported the rejection as permanent
        permanent: bool,
        /// Channel-provided reason
        reason: String,
    },
}

impl SendError {
    /// Whether the failure looks permanent
    ///
    /// Only reported in logs; permanent and transient failures consume the
    /// same retry budget.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        match self {
            Self::InvalidAddress(_) | Self::InvalidMessage(_) | Self::Authentication(_) => true,
            Self::Rejected { permanent, .. } => *permanent,
            Self::Connection(_) | Self::Timeout(_) => false,
        }
    }
}
