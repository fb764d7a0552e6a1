//! HTTP Handlers
//!
//! Trigger adapters for the reconciliation flow plus the supporting lead,
//! invoice and session endpoints. Error propagation differs by path: the
//! client-confirmation endpoint surfaces structured failures to the browser,
//! while the webhook endpoint acknowledges every authenticated delivery with
//! 200 and leaves failures in the logs — non-200s would only provoke the
//! provider's retry storm.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use enroll_core::contact::{NewContact, is_valid_email, normalize_email};
use enroll_core::error::EnrollError;
use enroll_core::event::{MAX_PARTICIPANTS, Role, TriggerSource};
use enroll_core::reconcile::ParticipantResult;
use enroll_core::session::CheckoutSession;
use enroll_core::tags::{lead_tags, participant_lead_tags};
use enroll_payments::{
    CALLBACK_TOKEN_HEADER, ConfirmationRequest, InvoiceRequest, normalize_confirmation,
    normalize_webhook, verify_callback_token,
};

use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub crm: String,
    pub payments_configured: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub year_in_college: Option<String>,

    #[serde(default)]
    pub utms: HashMap<String, String>,

    #[serde(default)]
    pub participants: Vec<LeadParticipant>,
}

#[derive(Debug, Deserialize)]
pub struct LeadParticipant {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub created: bool,
    pub contact_id: String,
    pub redirect_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessResponse {
    pub success: bool,
    pub contact_id: String,
    pub participants_tagged: usize,
    pub participant_results: Vec<ParticipantResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub name: String,

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

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub success: bool,
    pub invoice_id: String,
    pub invoice_url: String,
    pub external_id: String,
    pub amount: i64,
    pub status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPutRequest {
    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub role: String,

    #[serde(default)]
    pub organization: Option<String>,

    #[serde(default)]
    pub year_in_college: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPutResponse {
    pub success: bool,
    pub session_id: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_response(err: &EnrollError) -> HandlerError {
    let (status, code) = match err {
        EnrollError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
        EnrollError::Auth(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        EnrollError::ContactNotFound(_) => (StatusCode::NOT_FOUND, "CONTACT_NOT_FOUND"),
        EnrollError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
        EnrollError::UpstreamRejected { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_REJECTED"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    };

    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            code: code.into(),
        }),
    )
}

fn validation(message: &str) -> HandlerError {
    error_response(&EnrollError::Validation(message.into()))
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        crm: state.directory.name().to_string(),
        payments_configured: state.xendit.is_some(),
    })
}

/// Lead intake: find-or-create the registrant as a lead-stage contact and
/// hand back the checkout redirect.
///
/// Student leads may carry up to four participants; each well-formed one is
/// find-or-created as a lead too. Participant failures are logged, never
/// fatal — losing a participant lead must not lose the primary lead.
pub async fn create_lead(
    State(state): State<AppState>,
    Json(payload): Json<LeadRequest>,
) -> Result<Json<LeadResponse>, HandlerError> {
    if payload.name.trim().is_empty() {
        return Err(validation("missing name"));
    }
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(validation("missing or malformed email"));
    }
    let role = Role::parse(&payload.role).map_err(|e| error_response(&e))?;

    let contact_id = state
        .resolver
        .resolve(&email, NewContact::lead(&payload.name, &email, lead_tags(role)))
        .await
        .map_err(|e| {
            tracing::error!(email = %email, error = %e, "lead resolution failed");
            error_response(&e)
        })?;

    if role == Role::Student {
        for participant in payload.participants.iter().take(MAX_PARTICIPANTS) {
            let p_email = normalize_email(&participant.email);
            if participant.name.trim().is_empty() || !is_valid_email(&p_email) {
                continue;
            }
            let new = NewContact::lead(&participant.name, &p_email, participant_lead_tags());
            if let Err(e) = state.resolver.resolve(&p_email, new).await {
                tracing::warn!(email = %p_email, error = %e, "participant lead registration failed");
            }
        }
    }

    let redirect_url = state.checkout_links.redirect_for(role, &email, &payload.utms);

    tracing::info!(email = %email, contact = %contact_id, role = %role, "lead registered");

    Ok(Json(LeadResponse {
        created: true,
        contact_id: contact_id.to_string(),
        redirect_url,
    }))
}

/// Client confirmation: the user self-reported completing payment on the
/// provider's hosted page. Synchronous — the result (or failure) goes
/// straight back to the UI.
pub async fn payment_success(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmationRequest>,
) -> Result<Json<PaymentSuccessResponse>, HandlerError> {
    let event =
        normalize_confirmation(&payload).map_err(|e| error_response(&EnrollError::from(e)))?;

    let result = state
        .reconciler
        .apply_payment(&event, TriggerSource::ClientConfirmation)
        .await
        .map_err(|e| {
            tracing::error!(email = %event.payer_email, error = %e, "confirmation reconciliation failed");
            error_response(&e)
        })?;

    Ok(Json(PaymentSuccessResponse {
        success: true,
        contact_id: result.primary_contact_id.to_string(),
        participants_tagged: result.participants_tagged(),
        participant_results: result.participant_results,
    }))
}

/// Payment webhook: token-authenticated, at-least-once.
///
/// Runs on the raw body — token verification and JSON parsing both need the
/// untouched bytes. Once the token checks out the provider always gets 200;
/// reconciliation failures are an operator concern, not a delivery failure.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, HandlerError> {
    let presented = headers
        .get(CALLBACK_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());

    if let Err(e) = verify_callback_token(presented, &state.webhook_token) {
        tracing::warn!(error = %e, "rejected webhook delivery");
        return Err(error_response(&EnrollError::from(e)));
    }

    match normalize_webhook(&body, &state.normalizer) {
        Ok(Some(event)) => {
            match state
                .reconciler
                .apply_payment(&event, TriggerSource::Webhook)
                .await
            {
                Ok(result) => {
                    tracing::info!(
                        contact = %result.primary_contact_id,
                        participants_tagged = result.participants_tagged(),
                        "webhook reconciled"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        email = %event.payer_email,
                        role = %event.role,
                        error = %e,
                        retryable = e.is_retryable(),
                        "webhook reconciliation failed"
                    );
                }
            }
        }
        Ok(None) => {
            tracing::debug!("webhook carried no actionable payment");
        }
        Err(e) => {
            tracing::error!(error = %e, "webhook body unparseable");
        }
    }

    Ok("ok")
}

/// Create a Xendit invoice for one registrant
pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<Json<InvoiceResponse>, HandlerError> {
    let xendit = state.xendit.as_ref().ok_or_else(|| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Payments not configured".into(),
                code: "PAYMENTS_DISABLED".into(),
            }),
        )
    })?;

    if payload.name.trim().is_empty() {
        return Err(validation("missing name"));
    }
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(validation("missing or malformed email"));
    }
    let role = Role::parse(&payload.role).map_err(|e| error_response(&e))?;

    let invoice = xendit
        .create_invoice(&InvoiceRequest {
            name: payload.name,
            email,
            role,
            organization: payload.organization,
            year_in_college: payload.year_in_college,
            participant_emails: payload.participant_emails,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "invoice creation failed");
            error_response(&EnrollError::from(e))
        })?;

    Ok(Json(InvoiceResponse {
        success: true,
        invoice_id: invoice.id,
        invoice_url: invoice.invoice_url,
        external_id: invoice.external_id,
        amount: invoice.amount,
        status: invoice.status,
    }))
}

/// Park checkout details for the redirect round trip
pub async fn put_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionPutRequest>,
) -> Result<Json<SessionPutResponse>, HandlerError> {
    if payload.session_id.trim().is_empty() {
        return Err(validation("missing sessionId"));
    }
    let email = normalize_email(&payload.email);
    if !is_valid_email(&email) {
        return Err(validation("missing or malformed email"));
    }
    let role = Role::parse(&payload.role).map_err(|e| error_response(&e))?;

    let session = CheckoutSession::new(email, role, payload.organization, payload.year_in_college);
    state
        .sessions
        .put(&payload.session_id, session)
        .map_err(|e| error_response(&e))?;

    Ok(Json(SessionPutResponse {
        success: true,
        session_id: payload.session_id,
    }))
}

/// Fetch parked checkout details; 404 once expired
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutSession>, HandlerError> {
    match state.sessions.get(&id) {
        Ok(Some(session)) => Ok(Json(session)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "Session not found".into(),
                code: "SESSION_NOT_FOUND".into(),
            }),
        )),
        Err(e) => Err(error_response(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use enroll_core::directory::MemoryDirectory;
    use enroll_core::reconcile::TagReconciler;
    use enroll_core::resolver::ContactResolver;
    use enroll_core::session::MemorySessionStore;
    use enroll_payments::{CheckoutLinks, NormalizerConfig};

    fn test_state(directory: Arc<MemoryDirectory>) -> AppState {
        AppState {
            directory: directory.clone(),
            resolver: Arc::new(ContactResolver::new(directory.clone())),
            reconciler: Arc::new(TagReconciler::new(directory)),
            sessions: Arc::new(MemorySessionStore::default()),
            xendit: None,
            checkout_links: CheckoutLinks {
                student: Some("https://checkout.test/od/student".into()),
                professional: None,
            },
            normalizer: NormalizerConfig::default(),
            webhook_token: "s3cret".into(),
        }
    }

    fn lead_request(name: &str, email: &str, role: &str) -> LeadRequest {
        LeadRequest {
            name: name.into(),
            email: email.into(),
            role: role.into(),
            organization: None,
            year_in_college: None,
            utms: HashMap::new(),
            participants: Vec::new(),
        }
    }

    fn webhook_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CALLBACK_TOKEN_HEADER, token.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn test_lead_then_confirmation_happy_path() {
        let dir = Arc::new(MemoryDirectory::new());
        let state = test_state(dir.clone());

        let lead = create_lead(
            State(state.clone()),
            Json(lead_request("Jane", "jane@x.com", "student")),
        )
        .await
        .unwrap();
        assert!(lead.0.created);
        assert!(lead.0.redirect_url.as_deref().unwrap().contains("email=jane%40x.com"));
        assert_eq!(dir.tags_of("jane@x.com").unwrap(), vec!["MBA Lead", "student"]);

        let confirmation = payment_success(
            State(state),
            Json(ConfirmationRequest {
                email: "jane@x.com".into(),
                role: "student".into(),
                organization: None,
                year_in_college: None,
                participant_emails: vec![],
            }),
        )
        .await
        .unwrap();

        assert!(confirmation.0.success);
        assert!(dir.tags_of("jane@x.com").unwrap().contains(&"students-paid".to_string()));
    }

    #[tokio::test]
    async fn test_lead_registers_participants_once() {
        let dir = Arc::new(MemoryDirectory::new());
        let state = test_state(dir.clone());

        let mut request = lead_request("Jane", "jane@x.com", "student");
        request.participants = vec![
            LeadParticipant {
                name: "Amy A".into(),
                email: "amy@x.com".into(),
            },
            LeadParticipant {
                name: String::new(),
                email: "nameless@x.com".into(),
            },
        ];
        create_lead(State(state.clone()), Json(request)).await.unwrap();

        assert_eq!(
            dir.tags_of("amy@x.com").unwrap(),
            vec!["MBA Lead", "student", "participant"]
        );
        assert!(dir.tags_of("nameless@x.com").is_none());
        let creates_after_first = dir.create_count();

        // Resubmission must not duplicate anyone
        let mut resubmit = lead_request("Jane", "jane@x.com", "student");
        resubmit.participants = vec![LeadParticipant {
            name: "Amy A".into(),
            email: "amy@x.com".into(),
        }];
        create_lead(State(state), Json(resubmit)).await.unwrap();
        assert_eq!(dir.create_count(), creates_after_first);
    }

    #[tokio::test]
    async fn test_lead_validation() {
        let state = test_state(Arc::new(MemoryDirectory::new()));

        let missing_role = create_lead(
            State(state.clone()),
            Json(lead_request("Jane", "jane@x.com", "")),
        )
        .await
        .unwrap_err();
        assert_eq!(missing_role.0, StatusCode::BAD_REQUEST);

        let bad_email = create_lead(State(state), Json(lead_request("Jane", "nope", "student")))
            .await
            .unwrap_err();
        assert_eq!(bad_email.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_confirmation_for_unregistered_email_is_404() {
        let state = test_state(Arc::new(MemoryDirectory::new()));

        let err = payment_success(
            State(state),
            Json(ConfirmationRequest {
                email: "ghost@x.com".into(),
                role: "student".into(),
                organization: None,
                year_in_college: None,
                participant_emails: vec![],
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_bad_token_makes_no_crm_calls() {
        let dir = Arc::new(MemoryDirectory::new());
        let state = test_state(dir.clone());

        let body = Bytes::from_static(br#"{"status":"PAID","payer_email":"jane@x.com"}"#);
        let err = payment_webhook(State(state), webhook_headers("wrong"), body)
            .await
            .unwrap_err();

        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
        assert_eq!(dir.search_count(), 0);
        assert_eq!(dir.create_count(), 0);
    }

    #[tokio::test]
    async fn test_webhook_reconciles_and_acknowledges() {
        let dir = Arc::new(MemoryDirectory::new());
        let state = test_state(dir.clone());

        create_lead(
            State(state.clone()),
            Json(lead_request("Jane", "jane@x.com", "student")),
        )
        .await
        .unwrap();

        let body = Bytes::from_static(
            br#"{"status":"PAID","payer_email":"jane@x.com","amount":500,"metadata":{"role":"student"}}"#,
        );
        let ack = payment_webhook(State(state), webhook_headers("s3cret"), body)
            .await
            .unwrap();

        assert_eq!(ack, "ok");
        assert!(dir.tags_of("jane@x.com").unwrap().contains(&"students-paid".to_string()));
    }

    #[tokio::test]
    async fn test_webhook_downstream_failure_still_acknowledged() {
        let dir = Arc::new(MemoryDirectory::new());
        let state = test_state(dir);

        // PAID payment for an email with no lead: reconciliation fails, but
        // the provider must still get its 200
        let body = Bytes::from_static(br#"{"status":"PAID","payer_email":"ghost@x.com"}"#);
        let ack = payment_webhook(State(state), webhook_headers("s3cret"), body)
            .await
            .unwrap();
        assert_eq!(ack, "ok");
    }

    #[tokio::test]
    async fn test_invoice_unconfigured_is_503() {
        let state = test_state(Arc::new(MemoryDirectory::new()));

        let err = create_invoice(
            State(state),
            Json(CreateInvoiceRequest {
                name: "Jane".into(),
                email: "jane@x.com".into(),
                role: "student".into(),
                organization: None,
                year_in_college: None,
                participant_emails: vec![],
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_responses_use_camel_case_keys() {
        let lead = LeadResponse {
            created: true,
            contact_id: "c1".into(),
            redirect_url: None,
        };
        let json = serde_json::to_value(&lead).unwrap();
        assert!(json.get("contactId").is_some());
        assert!(json.get("redirectUrl").is_some());

        let success = PaymentSuccessResponse {
            success: true,
            contact_id: "c1".into(),
            participants_tagged: 0,
            participant_results: vec![],
        };
        let json = serde_json::to_value(&success).unwrap();
        assert!(json.get("participantsTagged").is_some());
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let state = test_state(Arc::new(MemoryDirectory::new()));

        put_session(
            State(state.clone()),
            Json(SessionPutRequest {
                session_id: "s1".into(),
                email: "jane@x.com".into(),
                role: "student".into(),
                organization: Some("Acme U".into()),
                year_in_college: None,
            }),
        )
        .await
        .unwrap();

        let session = get_session(State(state.clone()), Path("s1".into())).await.unwrap();
        assert_eq!(session.0.email, "jane@x.com");

        let missing = get_session(State(state), Path("unknown".into())).await.unwrap_err();
        assert_eq!(missing.0, StatusCode::NOT_FOUND);
    }
}
