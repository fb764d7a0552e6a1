//! In-Memory Directory
//!
//! For testing and development. Mirrors the CRM's observable behavior:
//! contacts keyed by id with an email index, tag-set semantics, and a
//! non-atomic create (two creates for one email mint two contacts, as the
//! real CRM can under concurrency).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use uuid::Uuid;

use super::ContactDirectory;
use crate::contact::{Contact, ContactId, NewContact, normalize_email};
use crate::error::{EnrollError, Result};

/// In-memory contact directory
pub struct MemoryDirectory {
    contacts: RwLock<HashMap<ContactId, Contact>>,
    by_email: RwLock<HashMap<String, ContactId>>,

    /// Emails whose operations fail with `UpstreamUnavailable` (for
    /// exercising partial-failure paths)
    failing: HashSet<String>,

    searches: AtomicUsize,
    creates: AtomicUsize,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self {
            contacts: RwLock::new(HashMap::new()),
            by_email: RwLock::new(HashMap::new()),
            failing: HashSet::new(),
            searches: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    /// Create a directory where every operation touching one of `emails`
    /// fails with `UpstreamUnavailable`
    pub fn with_failing<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dir = Self::new();
        dir.failing = emails.into_iter().map(|e| normalize_email(&e.into())).collect();
        dir
    }

    /// Number of `find_by_email` calls made so far
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Number of `create_contact` calls made so far
    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Current tags of the contact indexed under `email`, if any
    pub fn tags_of(&self, email: &str) -> Option<Vec<String>> {
        let by_email = self.by_email.read().unwrap();
        let contacts = self.contacts.read().unwrap();
        by_email
            .get(&normalize_email(email))
            .and_then(|id| contacts.get(id))
            .map(|c| c.tags.clone())
    }

    fn check_available(&self, email: &str) -> Result<()> {
        if self.failing.contains(email) {
            return Err(EnrollError::UpstreamUnavailable(format!(
                "injected failure for {}",
                email
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContactDirectory for MemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let email = normalize_email(email);
        self.check_available(&email)?;

        let by_email = self.by_email.read().unwrap();
        let contacts = self.contacts.read().unwrap();
        Ok(by_email.get(&email).and_then(|id| contacts.get(id)).cloned())
    }

    async fn create_contact(&self, new: NewContact) -> Result<Contact> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let email = normalize_email(&new.email);
        self.check_available(&email)?;

        let contact = Contact {
            id: ContactId::from_string(Uuid::new_v4().to_string()),
            email: email.clone(),
            tags: new.tags,
        };

        let mut contacts = self.contacts.write().unwrap();
        let mut by_email = self.by_email.write().unwrap();
        contacts.insert(contact.id.clone(), contact.clone());
        // Latest create wins the index, as with the real CRM's search
        by_email.insert(email, contact.id.clone());

        Ok(contact)
    }

    async fn add_tags(&self, id: &ContactId, tags: &[String]) -> Result<()> {
        let mut contacts = self.contacts.write().unwrap();
        let Some(contact) = contacts.get_mut(id) else {
            return Err(EnrollError::UpstreamRejected {
                status: 404,
                message: format!("no contact with id {}", id),
            });
        };
        self.check_available(&normalize_email(&contact.email))?;

        for tag in tags {
            if !contact.tags.contains(tag) {
                contact.tags.push(tag.clone());
            }
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "MemoryDirectory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tag_set_semantics() {
        let dir = MemoryDirectory::new();
        let contact = dir
            .create_contact(NewContact::lead("Jane", "jane@x.com", vec!["MBA Lead".into()]))
            .await
            .unwrap();

        dir.add_tags(&contact.id, &["students-paid".into()]).await.unwrap();
        dir.add_tags(&contact.id, &["students-paid".into()]).await.unwrap();

        let tags = dir.tags_of("jane@x.com").unwrap();
        assert_eq!(tags.iter().filter(|t| *t == "students-paid").count(), 1);
    }

    #[tokio::test]
    async fn test_lookup_is_case_insensitive() {
        let dir = MemoryDirectory::new();
        dir.create_contact(NewContact::lead("Jane", "Jane@X.com", vec![])).await.unwrap();

        let found = dir.find_by_email("  JANE@x.COM ").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let dir = MemoryDirectory::with_failing(["down@x.com"]);
        let err = dir.find_by_email("down@x.com").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_add_tags_unknown_id_rejected() {
        let dir = MemoryDirectory::new();
        let err = dir
            .add_tags(&ContactId::from_string("nope"), &["x".into()])
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollError::UpstreamRejected { status: 404, .. }));
    }
}
