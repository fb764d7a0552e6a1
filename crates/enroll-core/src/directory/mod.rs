//! Contact Directory
//!
//! Abstraction over the CRM's contact API, plus an in-memory implementation
//! for tests and development.

mod memory;

pub use memory::MemoryDirectory;

use async_trait::async_trait;

use crate::contact::{Contact, ContactId, NewContact};
use crate::error::Result;

/// CRM contact operations consumed by the reconciliation flow
/// (Strategy pattern — implement per CRM vendor)
///
/// Every call is a live query or mutation against the external system.
/// Contact state can change behind this service's back (manual edits in the
/// CRM UI), so implementations must not cache.
///
/// Error mapping contract: network errors, timeouts and 5xx responses map to
/// [`EnrollError::UpstreamUnavailable`](crate::EnrollError::UpstreamUnavailable)
/// (retryable); 4xx responses map to
/// [`EnrollError::UpstreamRejected`](crate::EnrollError::UpstreamRejected)
/// (not retryable).
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Look up a contact by email. `Ok(None)` when nothing matches.
    ///
    /// Implementations receive the email already normalized (trimmed,
    /// lowercased) by the resolver.
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>>;

    /// Create a contact and return it with its CRM-assigned id.
    async fn create_contact(&self, new: NewContact) -> Result<Contact>;

    /// Add tags to an existing contact.
    ///
    /// The CRM treats tags as a set: adding a tag the contact already
    /// carries succeeds as a no-op.
    async fn add_tags(&self, id: &ContactId, tags: &[String]) -> Result<()>;

    /// Directory name for logs
    fn name(&self) -> &str;
}
