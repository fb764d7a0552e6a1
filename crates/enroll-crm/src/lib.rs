//! # enroll-crm
//!
//! GHL ("LeadConnector") implementation of the
//! [`ContactDirectory`](enroll_core::ContactDirectory) seam.
//!
//! Wraps the CRM's contact search/create/tag endpoints over `reqwest` with
//! uniform error mapping: transport failures, timeouts and 5xx responses
//! surface as `UpstreamUnavailable` (retryable), 4xx as `UpstreamRejected`
//! (not retryable). No caching — contact state belongs to the CRM.

pub mod ghl;

pub use ghl::{GhlClient, GhlConfig};
