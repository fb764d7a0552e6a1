//! Contact Types
//!
//! Contacts are owned by the CRM; these types are a read/write view over its
//! API, never a local cache.

use serde::{Deserialize, Serialize};

/// Opaque CRM-assigned contact identifier, immutable once created
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(String);

impl ContactId {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Snapshot of a CRM contact at lookup time
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,

    pub email: String,

    /// Free-text labels; the CRM treats them as a set
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Payload for creating a contact
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewContact {
    pub name: Option<String>,

    pub first_name: Option<String>,

    pub last_name: Option<String>,

    pub email: String,

    /// Attribution source recorded on the CRM contact
    pub source: String,

    /// Initial tags
    pub tags: Vec<String>,
}

impl NewContact {
    /// Build a lead-stage contact from a display name and email.
    ///
    /// The display name is split on the first space into first/last name,
    /// matching what the CRM expects on its create endpoint.
    pub fn lead(name: &str, email: &str, tags: Vec<String>) -> Self {
        let name = name.trim();
        let (first, last) = match name.split_once(' ') {
            Some((f, l)) => (f.to_string(), Some(l.trim().to_string()).filter(|s| !s.is_empty())),
            None => (name.to_string(), None),
        };

        Self {
            name: Some(name.to_string()).filter(|s| !s.is_empty()),
            first_name: Some(first).filter(|s| !s.is_empty()),
            last_name: last,
            email: normalize_email(email),
            source: "public api".into(),
            tags,
        }
    }
}

/// Normalize an email for comparison: trim and lowercase.
///
/// Two lookups for emails differing only in case or surrounding whitespace
/// must resolve to the same contact.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Basic email-shape check: local part, `@`, dotted domain.
///
/// Not RFC validation — just enough to reject blanks and obvious typos
/// before spending a CRM round trip on them.
pub fn is_valid_email(s: &str) -> bool {
    let s = s.trim();
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.len() < 3 {
        return false;
    }
    match domain.split_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
