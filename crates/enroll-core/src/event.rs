//! Payment Events
//!
//! The canonical record extracted from either trigger source (provider
//! webhook or client-side confirmation). Ephemeral — never persisted.

use serde::{Deserialize, Serialize};

use crate::error::{EnrollError, Result};

/// Most participants a single student registration may carry
pub const MAX_PARTICIPANTS: usize = 4;

/// Registrant role, priced and tagged differently
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Professional,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professional => "professional",
        }
    }

    /// Case-insensitive parse; unknown values are a validation error
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "professional" => Ok(Role::Professional),
            other => Err(EnrollError::Validation(format!("unknown role: {}", other))),
        }
    }

    /// The payment tag this role earns on confirmation
    pub fn paid_tag(&self) -> &'static str {
        match self {
            Role::Student => "students-paid",
            Role::Professional => "professionals-paid",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which adapter produced a payment event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerSource {
    /// Provider webhook: asynchronous, at-least-once
    Webhook,
    /// Browser POST after the user self-reports paying: synchronous
    ClientConfirmation,
}

impl TriggerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::Webhook => "webhook",
            TriggerSource::ClientConfirmation => "client-confirmation",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Canonical payment record, normalized from a raw trigger payload
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    pub payer_email: String,

    pub role: Role,

    /// Amount in minor currency units, when the trigger carried one
    pub amount_minor: Option<i64>,

    pub currency: Option<String>,

    /// Free-text organization, slugged into an `org:` tag
    pub organization: Option<String>,

    /// Free-text year, slugged into a `year:` tag
    pub year_in_college: Option<String>,

    /// Registered participant emails (students only, 0..4)
    #[serde(default)]
    pub participant_emails: Vec<String>,
}

impl PaymentEvent {
    /// Minimal event with just payer and role; the rest default to empty
    pub fn new(payer_email: impl Into<String>, role: Role) -> Self {
        Self {
            payer_email: payer_email.into(),
            role,
            amount_minor: None,
            currency: None,
            organization: None,
            year_in_college: None,
            participant_emails: Vec::new(),
        }
    }
}
