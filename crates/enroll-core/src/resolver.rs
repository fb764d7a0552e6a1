//! Idempotent Contact Resolution
//!
//! Search-before-create, always. An unconditional upsert duplicates contacts
//! when a webhook retry races a slow client confirmation, or when a payer
//! appears in their own participant list — so the resolver never creates
//! without a failed lookup first.
//!
//! The CRM's own create is not atomic, so two racing resolves can still mint
//! two contacts for one email. That case is tolerated: the resolver keeps a
//! small memo of ids it has handed out and logs when a later lookup
//! disagrees, continuing with the freshly observed id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::contact::{ContactId, NewContact, normalize_email};
use crate::directory::ContactDirectory;
use crate::error::Result;

/// Resolves emails to CRM contact ids without ever duplicating contacts
pub struct ContactResolver {
    directory: Arc<dyn ContactDirectory>,

    /// Ids already believed resolved this process, keyed by normalized email
    resolved: RwLock<HashMap<String, ContactId>>,
}

impl ContactResolver {
    pub fn new(directory: Arc<dyn ContactDirectory>) -> Self {
        Self {
            directory,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// Find a contact by email, creating it from `new` only when the lookup
    /// comes back empty. Never re-creates an existing contact.
    pub async fn resolve(&self, email: &str, new: NewContact) -> Result<ContactId> {
        let key = normalize_email(email);

        if let Some(contact) = self.directory.find_by_email(&key).await? {
            return Ok(self.remember(&key, contact.id));
        }

        let created = self.directory.create_contact(new).await?;
        tracing::info!(email = %key, contact = %created.id, "created contact");
        Ok(self.remember(&key, created.id))
    }

    /// Find-only resolution; never creates. Used at payment time, where an
    /// unknown email is a data problem to surface rather than paper over.
    pub async fn resolve_existing(&self, email: &str) -> Result<Option<ContactId>> {
        let key = normalize_email(email);

        match self.directory.find_by_email(&key).await? {
            Some(contact) => Ok(Some(self.remember(&key, contact.id))),
            None => Ok(None),
        }
    }

    /// Memoize an observed id. A divergent second id for the same email is
    /// logged, not fatal — convergence here is best-effort.
    fn remember(&self, key: &str, id: ContactId) -> ContactId {
        let mut resolved = self.resolved.write().unwrap();
        if let Some(previous) = resolved.get(key) {
            if *previous != id {
                tracing::warn!(
                    email = %key,
                    previous = %previous,
                    observed = %id,
                    "email resolved to a second contact id; continuing with the latest"
                );
            }
        }
        resolved.insert(key.to_string(), id.clone());
        id
    }
}
