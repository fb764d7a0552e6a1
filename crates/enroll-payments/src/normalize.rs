//! Payment Event Normalization
//!
//! Collapses the two trigger payload shapes — provider webhook JSON and the
//! browser's confirmation body — into one canonical
//! [`PaymentEvent`](enroll_core::PaymentEvent).
//!
//! Webhook payloads are messy: fields sit at the top level or under `data`
//! depending on event type, and the participant list round-trips through
//! invoice metadata as a JSON-encoded string. Normalization tolerates all of
//! that; a malformed participant list degrades to an empty one with a
//! warning rather than failing the event.

use serde::Deserialize;
use serde_json::Value;

use enroll_core::event::{MAX_PARTICIPANTS, PaymentEvent, Role};

use crate::error::{PaymentError, Result};

/// Normalization configuration
///
/// One threshold, applied uniformly: any amount at or below it reads as a
/// student payment when no explicit role is attached.
#[derive(Clone, Debug)]
pub struct NormalizerConfig {
    /// Upper bound (minor units, inclusive) for the student-price heuristic
    pub student_price_max_minor: i64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            student_price_max_minor: 500,
        }
    }
}

impl NormalizerConfig {
    /// Read `PRICE_STUDENT_MAX` from the environment
    pub fn from_env() -> Self {
        let student_price_max_minor = std::env::var("PRICE_STUDENT_MAX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        Self {
            student_price_max_minor,
        }
    }
}

/// Resolve the registrant role for a payment.
///
/// Precedence, first match wins:
/// 1. explicit `metadata.role` (set by our own invoice creation)
/// 2. amount at or below the configured student threshold
/// 3. description mentioning "student" (case-insensitive)
/// 4. professional
pub fn resolve_role(
    metadata_role: Option<&str>,
    amount_minor: Option<i64>,
    description: Option<&str>,
    config: &NormalizerConfig,
) -> Role {
    if let Some(raw) = metadata_role {
        match Role::parse(raw) {
            Ok(role) => return role,
            Err(_) => {
                tracing::warn!(role = %raw, "unparseable metadata role; falling back to heuristics");
            }
        }
    }

    if let Some(amount) = amount_minor {
        if amount <= config.student_price_max_minor {
            return Role::Student;
        }
    }

    if let Some(description) = description {
        if description.to_ascii_lowercase().contains("student") {
            return Role::Student;
        }
    }

    Role::Professional
}

/// Normalize a raw webhook body.
///
/// Returns `Ok(None)` for deliveries that carry no actionable payment — a
/// non-`PAID` status, or a paid event missing the payer email — so the
/// adapter can acknowledge them without touching the CRM. Unparseable JSON
/// is an error: the provider never sends non-JSON bodies, so that indicates
/// a broken delivery worth logging loudly.
pub fn normalize_webhook(raw: &[u8], config: &NormalizerConfig) -> Result<Option<PaymentEvent>> {
    let event: Value = serde_json::from_slice(raw)
        .map_err(|e| PaymentError::WebhookParse(format!("invalid JSON body: {}", e)))?;

    let status = pick_str(&event, "status");
    if status != Some("PAID") {
        tracing::debug!(status = ?status, "ignoring webhook with non-paid status");
        return Ok(None);
    }

    let Some(payer_email) = payer_email(&event) else {
        tracing::warn!("paid webhook event carried no payer email; skipping");
        return Ok(None);
    };

    let amount_minor = pick(&event, "amount").and_then(Value::as_i64);
    let currency = pick_str(&event, "currency").map(str::to_string);
    let description = pick_str(&event, "description");
    let metadata = pick(&event, "metadata");

    let metadata_role = metadata.and_then(|m| m.get("role")).and_then(Value::as_str);
    let role = resolve_role(metadata_role, amount_minor, description, config);

    Ok(Some(PaymentEvent {
        payer_email: payer_email.to_string(),
        role,
        amount_minor,
        currency,
        organization: metadata_str(metadata, "organization"),
        year_in_college: metadata_str(metadata, "yearInCollege"),
        participant_emails: parse_participants(metadata),
    }))
}

/// Client confirmation body, as POSTed by the browser after the user
/// self-reports completing payment
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub year_in_college: Option<String>,

    #[serde(default)]
    pub participant_emails: Vec<String>,
}

/// Normalize a client confirmation. `email` and `role` are required; the
/// participant list is native JSON and capped at [`MAX_PARTICIPANTS`].
pub fn normalize_confirmation(req: &ConfirmationRequest) -> Result<PaymentEvent> {
    if req.email.trim().is_empty() {
        return Err(PaymentError::Invalid("missing email".into()));
    }
    let role =
        Role::parse(&req.role).map_err(|_| PaymentError::Invalid("missing or unknown role".into()))?;

    let mut participant_emails = req.participant_emails.clone();
    if participant_emails.len() > MAX_PARTICIPANTS {
        tracing::warn!(
            count = participant_emails.len(),
            max = MAX_PARTICIPANTS,
            "truncating oversized participant list"
        );
        participant_emails.truncate(MAX_PARTICIPANTS);
    }

    Ok(PaymentEvent {
        payer_email: req.email.clone(),
        role,
        amount_minor: None,
        currency: None,
        organization: req.organization.clone().filter(|s| !s.trim().is_empty()),
        year_in_college: req.year_in_college.clone().filter(|s| !s.trim().is_empty()),
        participant_emails,
    })
}

/// Read `key` from the event, falling back to `data.{key}` — the provider
/// nests fields for some event types and not others.
fn pick<'a>(event: &'a Value, key: &str) -> Option<&'a Value> {
    event
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| event.get("data").and_then(|d| d.get(key)).filter(|v| !v.is_null()))
}

fn pick_str<'a>(event: &'a Value, key: &str) -> Option<&'a str> {
    pick(event, key).and_then(Value::as_str)
}

fn payer_email(event: &Value) -> Option<&str> {
    pick_str(event, "payer_email")
        .or_else(|| pick(event, "payer").and_then(|p| p.get("email")).and_then(Value::as_str))
}

fn metadata_str(metadata: Option<&Value>, key: &str) -> Option<String> {
    metadata
        .and_then(|m| m.get(key))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Participant emails arrive JSON-encoded inside the flat metadata map when
/// sourced from a webhook. A parse failure is a warning and an empty list,
/// never a fatal error.
fn parse_participants(metadata: Option<&Value>) -> Vec<String> {
    let Some(raw) = metadata.and_then(|m| m.get("participantEmails")) else {
        return Vec::new();
    };

    match raw {
        Value::String(serialized) => match serde_json::from_str::<Vec<String>>(serialized) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "malformed participantEmails metadata; treating as empty");
                Vec::new()
            }
        },
        // Tolerate a native array, in case the metadata was written unserialized
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        other => {
            tracing::warn!(value = %other, "unexpected participantEmails shape; treating as empty");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> NormalizerConfig {
        NormalizerConfig::default()
    }

    #[test]
    fn test_metadata_role_wins_over_amount() {
        let role = resolve_role(Some("student"), Some(1000), None, &config());
        assert_eq!(role, Role::Student);

        let role = resolve_role(Some("professional"), Some(100), None, &config());
        assert_eq!(role, Role::Professional);
    }

    #[test]
    fn test_amount_heuristic_uses_single_threshold() {
        assert_eq!(resolve_role(None, Some(500), None, &config()), Role::Student);
        assert_eq!(resolve_role(None, Some(501), None, &config()), Role::Professional);
    }

    #[test]
    fn test_description_promotes_to_student() {
        let role = resolve_role(None, Some(1000), Some("Workshop - Student Registration"), &config());
        assert_eq!(role, Role::Student);
    }

    #[test]
    fn test_default_is_professional() {
        assert_eq!(resolve_role(None, None, None, &config()), Role::Professional);
        assert_eq!(
            resolve_role(Some("vip"), None, Some("Registration"), &config()),
            Role::Professional
        );
    }

    #[test]
    fn test_webhook_flat_shape() {
        let raw = br#"{
            "status": "PAID",
            "payer_email": "jane@x.com",
            "amount": 500,
            "currency": "PHP",
            "description": "Workshop - Student Registration"
        }"#;

        let event = normalize_webhook(raw, &config()).unwrap().unwrap();
        assert_eq!(event.payer_email, "jane@x.com");
        assert_eq!(event.role, Role::Student);
        assert_eq!(event.amount_minor, Some(500));
        assert!(event.participant_emails.is_empty());
    }

    #[test]
    fn test_webhook_nested_shape_with_metadata() {
        let raw = br#"{
            "data": {
                "status": "PAID",
                "payer": {"email": "jane@x.com"},
                "amount": 1000,
                "metadata": {
                    "role": "student",
                    "organization": "U.P. Diliman!",
                    "yearInCollege": "1st Year College",
                    "participantEmails": "[\"amy@x.com\",\"cal@x.com\"]"
                }
            }
        }"#;

        let event = normalize_webhook(raw, &config()).unwrap().unwrap();
        assert_eq!(event.role, Role::Student);
        assert_eq!(event.organization.as_deref(), Some("U.P. Diliman!"));
        assert_eq!(event.year_in_college.as_deref(), Some("1st Year College"));
        assert_eq!(event.participant_emails, vec!["amy@x.com", "cal@x.com"]);
    }

    #[test]
    fn test_non_paid_status_yields_no_event() {
        let raw = br#"{"status": "EXPIRED", "payer_email": "jane@x.com"}"#;
        assert!(normalize_webhook(raw, &config()).unwrap().is_none());

        let raw = br#"{"payer_email": "jane@x.com"}"#;
        assert!(normalize_webhook(raw, &config()).unwrap().is_none());
    }

    #[test]
    fn test_paid_without_email_yields_no_event() {
        let raw = br#"{"status": "PAID", "amount": 500}"#;
        assert!(normalize_webhook(raw, &config()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(normalize_webhook(b"not json", &config()).is_err());
    }

    #[test]
    fn test_malformed_participant_metadata_degrades_to_empty() {
        let raw = br#"{
            "status": "PAID",
            "payer_email": "jane@x.com",
            "metadata": {"role": "student", "participantEmails": "[not valid json"}
        }"#;

        let event = normalize_webhook(raw, &config()).unwrap().unwrap();
        assert!(event.participant_emails.is_empty());
    }

    #[test]
    fn test_native_participant_array_tolerated() {
        let raw = br#"{
            "status": "PAID",
            "payer_email": "jane@x.com",
            "metadata": {"role": "student", "participantEmails": ["amy@x.com"]}
        }"#;

        let event = normalize_webhook(raw, &config()).unwrap().unwrap();
        assert_eq!(event.participant_emails, vec!["amy@x.com"]);
    }

    #[test]
    fn test_confirmation_requires_email_and_role() {
        let mut req = ConfirmationRequest {
            email: String::new(),
            role: "student".into(),
            organization: None,
            year_in_college: None,
            participant_emails: vec![],
        };
        assert!(normalize_confirmation(&req).is_err());

        req.email = "jane@x.com".into();
        req.role = String::new();
        assert!(normalize_confirmation(&req).is_err());

        req.role = "student".into();
        let event = normalize_confirmation(&req).unwrap();
        assert_eq!(event.role, Role::Student);
    }

    #[test]
    fn test_confirmation_caps_participants() {
        let req = ConfirmationRequest {
            email: "jane@x.com".into(),
            role: "student".into(),
            organization: None,
            year_in_college: None,
            participant_emails: (0..6).map(|i| format!("p{}@x.com", i)).collect(),
        };

        let event = normalize_confirmation(&req).unwrap();
        assert_eq!(event.participant_emails.len(), MAX_PARTICIPANTS);
    }
}
