//! Tag Reconciliation
//!
//! Applies the tag set a payment event implies to the primary registrant and
//! each registered participant. The flow is a linear sequence of fallible
//! steps; every step after the primary lookup is blind-retry safe because
//! resolution never duplicates contacts and tag application is a set union.

use std::sync::Arc;

use serde::Serialize;

use crate::contact::{ContactId, is_valid_email, normalize_email};
use crate::directory::ContactDirectory;
use crate::error::{EnrollError, Result};
use crate::event::{PaymentEvent, Role, TriggerSource};
use crate::resolver::ContactResolver;
use crate::tags::{self, PARTICIPANTS_PAID_TAG};

/// Outcome of tagging one participant
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantResult {
    pub email: String,

    /// The participant's contact id when resolution found one
    pub contact_id: Option<ContactId>,

    /// Whether `participants-paid` was applied
    pub applied: bool,
}

/// Outcome of reconciling one payment event
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub primary_contact_id: ContactId,

    pub participant_results: Vec<ParticipantResult>,
}

impl ReconciliationResult {
    /// Count of participants that actually received the tag
    pub fn participants_tagged(&self) -> usize {
        self.participant_results.iter().filter(|p| p.applied).count()
    }

    /// True when at least one participant could not be resolved or tagged
    pub fn has_participant_failures(&self) -> bool {
        self.participant_results.iter().any(|p| !p.applied)
    }
}

/// Reconciles payment events against the contact directory
pub struct TagReconciler {
    directory: Arc<dyn ContactDirectory>,
    resolver: ContactResolver,
}

impl TagReconciler {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            resolver: ContactResolver::new(directory.clone()),
            directory,
        }
    }

    /// Apply a payment event: tag the primary registrant, then each
    /// participant independently.
    ///
    /// The primary payer must already exist as a lead — a payment for an
    /// unregistered email fails with
    /// [`EnrollError::ContactNotFound`] rather than minting a bare contact.
    /// Participant failures never abort the pass: each is recorded in the
    /// result and the loop continues.
    ///
    /// Idempotent: applying the same event twice converges on the same tag
    /// state and creates no contacts.
    pub async fn apply_payment(
        &self,
        event: &PaymentEvent,
        source: TriggerSource,
    ) -> Result<ReconciliationResult> {
        let payer = normalize_email(&event.payer_email);
        tracing::info!(
            email = %payer,
            role = %event.role,
            source = %source,
            participants = event.participant_emails.len(),
            "reconciling payment event"
        );

        let primary = self
            .resolver
            .resolve_existing(&payer)
            .await?
            .ok_or_else(|| EnrollError::ContactNotFound(payer.clone()))?;

        let payment_tags = tags::payment_tags(event);
        self.directory.add_tags(&primary, &payment_tags).await?;
        tracing::info!(contact = %primary, tags = ?payment_tags, "tagged primary registrant");

        let participant_results = match event.role {
            Role::Student => self.tag_participants(&event.participant_emails).await,
            Role::Professional => {
                if !event.participant_emails.is_empty() {
                    tracing::debug!(
                        count = event.participant_emails.len(),
                        "ignoring participants on a professional payment"
                    );
                }
                Vec::new()
            }
        };

        Ok(ReconciliationResult {
            primary_contact_id: primary,
            participant_results,
        })
    }

    /// Tag each participant with `participants-paid`, find-only.
    ///
    /// A missing or failing participant must never block the rest, so every
    /// error is absorbed into its own `ParticipantResult`.
    async fn tag_participants(&self, emails: &[String]) -> Vec<ParticipantResult> {
        let mut results = Vec::new();

        for raw in emails {
            let email = normalize_email(raw);
            if email.is_empty() {
                continue;
            }
            if !is_valid_email(&email) {
                tracing::warn!(email = %email, "skipping malformed participant email");
                results.push(ParticipantResult {
                    email,
                    contact_id: None,
                    applied: false,
                });
                continue;
            }
            results.push(self.tag_participant(email).await);
        }

        results
    }

    async fn tag_participant(&self, email: String) -> ParticipantResult {
        match self.resolver.resolve_existing(&email).await {
            Ok(Some(id)) => {
                let tag = vec![PARTICIPANTS_PAID_TAG.to_string()];
                match self.directory.add_tags(&id, &tag).await {
                    Ok(()) => {
                        tracing::info!(email = %email, contact = %id, "tagged participant");
                        ParticipantResult {
                            email,
                            contact_id: Some(id),
                            applied: true,
                        }
                    }
                    Err(e) => {
                        tracing::warn!(email = %email, contact = %id, error = %e, "failed to tag participant");
                        ParticipantResult {
                            email,
                            contact_id: Some(id),
                            applied: false,
                        }
                    }
                }
            }
            Ok(None) => {
                tracing::warn!(email = %email, "participant has no lead contact; skipping");
                ParticipantResult {
                    email,
                    contact_id: None,
                    applied: false,
                }
            }
            Err(e) => {
                tracing::warn!(email = %email, error = %e, "participant lookup failed; continuing");
                ParticipantResult {
                    email,
                    contact_id: None,
                    applied: false,
                }
            }
        }
    }
}
