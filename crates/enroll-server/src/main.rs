//! enroll HTTP Server
//!
//! Axum-based server wiring the reconciliation flow to its trigger sources:
//! lead intake, client payment confirmation, and the provider webhook.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use enroll_core::reconcile::TagReconciler;
use enroll_core::resolver::ContactResolver;
use enroll_core::session::MemorySessionStore;
use enroll_crm::GhlClient;
use enroll_payments::{CheckoutLinks, NormalizerConfig, XenditClient};

use crate::handlers::{
    create_invoice, create_lead, get_session, health_check, payment_success, payment_webhook,
    put_session,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // CRM is mandatory: without it the whole flow is inert
    let directory = Arc::new(
        GhlClient::from_env()
            .map_err(|e| anyhow::anyhow!("GHL configuration: {}", e))?,
    );
    tracing::info!("✓ GHL configured");

    // Payments are optional: without Xendit, static checkout links still work
    let xendit = match XenditClient::from_env() {
        Ok(client) => {
            tracing::info!("✓ Xendit configured");
            Some(Arc::new(client))
        }
        Err(_) => {
            tracing::warn!("⚠ Xendit not configured - dynamic invoices disabled");
            tracing::warn!("  Set XENDIT_SECRET_KEY in .env to enable them");
            None
        }
    };

    let webhook_token = std::env::var("XENDIT_WEBHOOK_TOKEN").unwrap_or_default();
    if webhook_token.is_empty() {
        tracing::warn!("⚠ XENDIT_WEBHOOK_TOKEN not set - all webhook deliveries will be rejected");
    }

    let checkout_links = CheckoutLinks::from_env();
    if checkout_links.student.is_none() && checkout_links.professional.is_none() {
        tracing::warn!("⚠ No static checkout links configured - lead responses carry no redirect");
    }

    // Build application state
    let state = AppState {
        directory: directory.clone(),
        resolver: Arc::new(ContactResolver::new(directory.clone())),
        reconciler: Arc::new(TagReconciler::new(directory)),
        sessions: Arc::new(MemorySessionStore::default()),
        xendit,
        checkout_links,
        normalizer: NormalizerConfig::from_env(),
        webhook_token,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health & info
        .route("/health", get(health_check))
        // Registration flow
        .route("/api/lead", post(create_lead))
        .route("/api/invoice", post(create_invoice))
        .route("/api/session", post(put_session))
        .route("/api/session/{id}", get(get_session))
        // Payment confirmation triggers
        .route("/api/payment-success", post(payment_success))
        .route("/api/webhooks/payment", post(payment_webhook))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 enroll server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  POST /api/lead             - Register a lead");
    tracing::info!("  POST /api/invoice          - Create a payment invoice");
    tracing::info!("  POST /api/session          - Park checkout details");
    tracing::info!("  GET  /api/session/{{id}}     - Fetch checkout details");
    tracing::info!("  POST /api/payment-success  - Client payment confirmation");
    tracing::info!("  POST /api/webhooks/payment - Provider payment webhook");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
