//! Payment Error Types

use thiserror::Error;

use enroll_core::EnrollError;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Payment-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Provider unreachable, timed out, or answered 5xx
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider rejected the request with a 4xx
    #[error("Provider rejected request ({status}): {message}")]
    ProviderRejected { status: u16, message: String },

    /// Webhook callback token missing or mismatched
    #[error("Webhook token invalid: {0}")]
    WebhookToken(String),

    /// Webhook payload could not be parsed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Request body failed validation
    #[error("Invalid request: {0}")]
    Invalid(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, PaymentError::Provider(_))
    }
}

impl From<PaymentError> for EnrollError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Provider(msg) => EnrollError::UpstreamUnavailable(msg),
            PaymentError::ProviderRejected { status, message } => {
                EnrollError::UpstreamRejected { status, message }
            }
            PaymentError::WebhookToken(msg) => EnrollError::Auth(msg),
            PaymentError::WebhookParse(msg) | PaymentError::Invalid(msg) => {
                EnrollError::Validation(msg)
            }
            PaymentError::Config(msg) => EnrollError::Config(msg),
        }
    }
}
