//! Error types shared across the dashboard.
//!
//! Transport failures from the order service are [`ApiError`]; everything the
//! staff-facing layer can observe is folded into [`DashboardError`].

use thiserror::Error;

/// Failure talking to the order service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Cannot reach order service at {0}")]
    Unreachable(String),
    #[error("Connection to {0} timed out")]
    Timeout(String),
    #[error("{detail} (HTTP {status})")]
    Status { status: u16, detail: String },
    #[error("Invalid JSON from order service: {0}")]
    Decode(String),
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Client-side validation failure on a new-order draft. Raised before any
/// request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Member ID is required for member orders")]
    MissingMemberId,
    #[error("Items are required")]
    MissingItems,
    #[error("Amount must be a positive whole number, got {0:?}")]
    InvalidAmount(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DashboardError {
    /// A polling fetch failed. Never shown to staff; the snapshot stays stale.
    #[error("Failed to fetch orders: {0}")]
    TransientFetchFailure(#[source] ApiError),
    /// A create/complete command was rejected or could not be delivered.
    #[error("{notice}")]
    CommandFailure {
        notice: String,
        #[source]
        source: ApiError,
    },
    #[error(transparent)]
    MalformedInput(#[from] ValidationError),
    #[error("Order {0} is already being completed")]
    CompletionInFlight(String),
    /// `done` on an order the current snapshot shows as completed or cancelled.
    #[error("Order {0} is not active")]
    NotActive(String),
    #[error("Order {0} not found")]
    UnknownOrder(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DashboardError {
    /// Text suitable for the blocking notice shown to staff.
    pub fn notice(&self) -> String {
        match self {
            DashboardError::CommandFailure { notice, .. } => notice.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_notice_hides_transport_detail() {
        let err = DashboardError::CommandFailure {
            notice: "Failed to place order. Check ID or Balance.".into(),
            source: ApiError::Status {
                status: 400,
                detail: "Insufficient member balance".into(),
            },
        };
        assert_eq!(err.notice(), "Failed to place order. Check ID or Balance.");
        assert_eq!(
            std::error::Error::source(&err).map(|s| s.to_string()),
            Some("Insufficient member balance (HTTP 400)".to_string())
        );
    }

    #[test]
    fn test_validation_error_converts_to_malformed_input() {
        let err: DashboardError = ValidationError::MissingItems.into();
        assert_eq!(err, DashboardError::MalformedInput(ValidationError::MissingItems));
        assert_eq!(err.notice(), "Items are required");
    }
}
