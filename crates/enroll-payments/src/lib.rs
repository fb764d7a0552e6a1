//! # enroll-payments
//!
//! Xendit integration for enroll.
//!
//! ## Payment flow
//!
//! ```text
//! ┌─────────────┐     ┌──────────────────┐     ┌─────────────┐
//! │  Your Site  │────▶│  Xendit Hosted   │────▶│  Your Site  │
//! │  (lead form)│     │  Invoice Page    │     │  (e-ticket) │
//! └─────────────┘     └──────────────────┘     └─────────────┘
//!                              │
//!                              ▼ webhook (at-least-once)
//!                     ┌──────────────────┐
//!                     │  Reconciliation  │
//!                     └──────────────────┘
//! ```
//!
//! Three concerns live here:
//!
//! - **Invoices** — create a per-registrant hosted invoice with the role,
//!   organization and participant list parked in invoice metadata, so the
//!   webhook can reconstruct the full payment event later. Static per-role
//!   checkout links serve as a fallback when dynamic invoicing is not
//!   configured.
//! - **Webhook verification** — Xendit authenticates deliveries with a
//!   shared callback token header compared for equality; anything else is
//!   rejected before parsing.
//! - **Normalization** — collapse a webhook payload (flat or nested, with a
//!   JSON-string participant list) or a client confirmation body into one
//!   canonical [`PaymentEvent`](enroll_core::PaymentEvent), resolving the
//!   role by a fixed precedence: explicit metadata, then the configured
//!   price threshold, then description text, then the professional default.

mod error;
mod invoice;
mod normalize;
mod webhook;

pub use error::{PaymentError, Result};
pub use invoice::{CheckoutLinks, Invoice, InvoiceRequest, PriceTable, XenditClient, XenditConfig};
pub use normalize::{ConfirmationRequest, NormalizerConfig, normalize_confirmation, normalize_webhook, resolve_role};
pub use webhook::{CALLBACK_TOKEN_HEADER, verify_callback_token};
