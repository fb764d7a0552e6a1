//! Application State

use std::sync::Arc;

use enroll_core::directory::ContactDirectory;
use enroll_core::reconcile::TagReconciler;
use enroll_core::resolver::ContactResolver;
use enroll_core::session::SessionStore;
use enroll_payments::{CheckoutLinks, NormalizerConfig, XenditClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// CRM contact directory (GHL in production, in-memory in tests)
    pub directory: Arc<dyn ContactDirectory>,

    /// Find-or-create resolution for the lead flow
    pub resolver: Arc<ContactResolver>,

    /// Payment-event reconciliation
    pub reconciler: Arc<TagReconciler>,

    /// Checkout session store
    pub sessions: Arc<dyn SessionStore>,

    /// Xendit client (None when not configured — static links still work)
    pub xendit: Option<Arc<XenditClient>>,

    /// Static per-role checkout links
    pub checkout_links: CheckoutLinks,

    /// Role-resolution configuration for webhook normalization
    pub normalizer: NormalizerConfig,

    /// Shared secret expected in the webhook callback-token header
    pub webhook_token: String,
}
