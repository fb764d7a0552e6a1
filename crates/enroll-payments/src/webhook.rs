//! Webhook Verification
//!
//! Xendit authenticates each delivery with a shared callback token in a
//! request header. Verification is an exact string comparison against the
//! configured secret, performed on the raw request before any parsing; a
//! mismatch stops processing entirely.

use crate::error::{PaymentError, Result};

/// Header carrying the provider's shared callback token
pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";

/// Verify the presented callback token against the configured secret.
///
/// An empty configured secret rejects everything — a deployment without the
/// secret must not accept webhooks.
pub fn verify_callback_token(presented: Option<&str>, expected: &str) -> Result<()> {
    if expected.is_empty() {
        return Err(PaymentError::WebhookToken(
            "no webhook token configured".into(),
        ));
    }

    match presented {
        Some(token) if token == expected => Ok(()),
        Some(_) => Err(PaymentError::WebhookToken("token mismatch".into())),
        None => Err(PaymentError::WebhookToken(
            "missing callback token header".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_token_accepted() {
        assert!(verify_callback_token(Some("s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn test_mismatch_rejected() {
        let err = verify_callback_token(Some("wrong"), "s3cret").unwrap_err();
        assert!(matches!(err, PaymentError::WebhookToken(_)));
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(verify_callback_token(None, "s3cret").is_err());
    }

    #[test]
    fn test_unconfigured_secret_rejects_everything() {
        assert!(verify_callback_token(Some(""), "").is_err());
        assert!(verify_callback_token(Some("anything"), "").is_err());
    }
}
