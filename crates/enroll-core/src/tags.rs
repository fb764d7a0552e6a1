//! Tag Derivation
//!
//! Computes the tag set a payment event implies. Tags are free-text labels
//! owned by the CRM; applying one that already exists succeeds as a no-op,
//! which is what makes blind retry of a whole reconciliation safe.

use crate::event::{PaymentEvent, Role};

/// Applied to every contact created by the public site
pub const LEAD_TAG: &str = "MBA Lead";

/// Marks a contact registered as someone else's participant
pub const PARTICIPANT_TAG: &str = "participant";

/// Applied to each participant of a paid student registration
pub const PARTICIPANTS_PAID_TAG: &str = "participants-paid";

/// Slugify free text for use inside a tag: lowercase, non-alphanumerics
/// stripped, separator runs collapsed to a single hyphen.
///
/// Deterministic and idempotent: `slugify(slugify(x)) == slugify(x)`.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_separator = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('-');
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    out
}

/// Tags for a lead-stage registrant
pub fn lead_tags(role: Role) -> Vec<String> {
    vec![LEAD_TAG.into(), role.as_str().into()]
}

/// Tags for a participant created at lead time alongside a student registrant
pub fn participant_lead_tags() -> Vec<String> {
    vec![LEAD_TAG.into(), Role::Student.as_str().into(), PARTICIPANT_TAG.into()]
}

/// The full tag set a payment event implies for the primary registrant
pub fn payment_tags(event: &PaymentEvent) -> Vec<String> {
    let mut tags = vec![
        LEAD_TAG.to_string(),
        event.role.as_str().to_string(),
        event.role.paid_tag().to_string(),
    ];

    if let Some(org) = event.organization.as_deref() {
        let slug = slugify(org);
        if !slug.is_empty() {
            tags.push(format!("org:{}", slug));
        }
    }

    if let Some(year) = event.year_in_college.as_deref() {
        let slug = slugify(year);
        if !slug.is_empty() {
            tags.push(format!("year:{}", slug));
        }
    }

    tags
}
