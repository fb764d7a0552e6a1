//! Error Types

use thiserror::Error;

/// Result type alias for reconciliation operations
pub type Result<T> = std::result::Result<T, EnrollError>;

/// Reconciliation error taxonomy
///
/// The split between [`EnrollError::UpstreamUnavailable`] and
/// [`EnrollError::UpstreamRejected`] matters: the former is safe to retry by
/// re-running the whole reconciliation (tag application is idempotent), the
/// latter is not.
#[derive(Error, Debug)]
pub enum EnrollError {
    /// Missing or malformed required fields — user-correctable
    #[error("Validation error: {0}")]
    Validation(String),

    /// Webhook token mismatch; the request is not processed further
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Payment received for an email with no prior lead registration
    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    /// CRM unreachable, timed out, or answered 5xx
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// CRM rejected the request with a 4xx
    #[error("Upstream rejected request ({status}): {message}")]
    UpstreamRejected { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl EnrollError {
    /// Check if re-running the operation can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, EnrollError::UpstreamUnavailable(_))
    }

    /// Convert to a support-friendly message
    pub fn user_message(&self) -> String {
        match self {
            EnrollError::Validation(msg) => format!("Invalid request: {}", msg),
            EnrollError::Auth(_) => "Authentication failed.".into(),
            EnrollError::ContactNotFound(_) => {
                "We couldn't find your registration. Please contact support.".into()
            }
            EnrollError::UpstreamUnavailable(_) => {
                "Our registration system is temporarily unavailable. Please try again.".into()
            }
            EnrollError::UpstreamRejected { .. } => {
                "Your registration could not be updated. Please contact support.".into()
            }
            EnrollError::Config(_) => "Service configuration error.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for EnrollError {
    fn from(err: anyhow::Error) -> Self {
        EnrollError::Other(err.to_string())
    }
}
