//! Checkout Sessions
//!
//! Short-lived keyed storage bridging the hosted-checkout redirect: the UI
//! stores the registrant's details before handing off to the provider's
//! payment page and reads them back on return. Entries expire after a TTL.
//!
//! The store is injected behind a trait so the in-memory implementation can
//! be swapped for an external one in multi-instance deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::event::Role;

/// Registrant details parked across the checkout redirect
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub email: String,

    pub role: Role,

    pub organization: Option<String>,

    pub year_in_college: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub fn new(
        email: impl Into<String>,
        role: Role,
        organization: Option<String>,
        year_in_college: Option<String>,
    ) -> Self {
        Self {
            email: email.into(),
            role,
            organization,
            year_in_college,
            created_at: Utc::now(),
        }
    }
}

/// Session storage trait
pub trait SessionStore: Send + Sync {
    /// Store a session under `id`, replacing any previous entry
    fn put(&self, id: &str, session: CheckoutSession) -> Result<()>;

    /// Fetch a session; `None` when absent or expired
    fn get(&self, id: &str) -> Result<Option<CheckoutSession>>;

    /// Drop a session
    fn remove(&self, id: &str) -> Result<()>;
}

/// In-memory session store with TTL expiry
///
/// Expired entries are ignored on read and swept on every write, bounding
/// the map without a background task.
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, CheckoutSession>>,
    ttl: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(1))
    }
}

impl MemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, session: &CheckoutSession) -> bool {
        session.created_at + self.ttl < Utc::now()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, id: &str, session: CheckoutSession) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.retain(|_, s| s.created_at + self.ttl >= Utc::now());
        sessions.insert(id.to_string(), session);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<CheckoutSession>> {
        let sessions = self.sessions.read().unwrap();
        Ok(sessions
            .get(id)
            .filter(|s| !self.is_expired(s))
            .cloned())
    }

    fn remove(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap();
        sessions.remove(id);
        Ok(())
    }
}
