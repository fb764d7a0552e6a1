//! GHL Contact Client
//!
//! Implementation of `ContactDirectory` over the LeadConnector REST API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use enroll_core::contact::{Contact, ContactId, NewContact, normalize_email};
use enroll_core::directory::ContactDirectory;
use enroll_core::error::{EnrollError, Result};

/// API version header required by the CRM
const GHL_API_VERSION: &str = "2021-07-28";

const DEFAULT_API_BASE: &str = "https://services.leadconnectorhq.com";

/// GHL client configuration
#[derive(Clone, Debug)]
pub struct GhlConfig {
    /// API base URL, without trailing slash
    pub api_base: String,

    /// Bearer token
    pub token: String,

    /// Location (tenant) id scoping every contact operation
    pub location_id: String,

    /// Bound on every outbound call
    pub timeout: Duration,
}

impl GhlConfig {
    pub fn new(token: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            token: token.into(),
            location_id: location_id.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Override the API base (testing against a stub server)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Read configuration from `GHL_API_BASE`, `GHL_TOKEN` (fallback
    /// `GHL_API_KEY`) and `GHL_LOCATION_ID`
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GHL_TOKEN")
            .or_else(|_| std::env::var("GHL_API_KEY"))
            .map_err(|_| EnrollError::Config("GHL_TOKEN not set".into()))?;
        let location_id = std::env::var("GHL_LOCATION_ID")
            .map_err(|_| EnrollError::Config("GHL_LOCATION_ID not set".into()))?;

        let mut config = Self::new(token, location_id);
        if let Ok(base) = std::env::var("GHL_API_BASE") {
            config = config.with_api_base(base);
        }
        Ok(config)
    }
}

/// GHL contact directory client
pub struct GhlClient {
    http: reqwest::Client,
    config: GhlConfig,
}

impl GhlClient {
    pub fn new(config: GhlConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("Version", HeaderValue::from_static(GHL_API_VERSION));

        let auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| EnrollError::Config("GHL token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| EnrollError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GhlConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base, path)
    }

    /// Map a transport-level failure (DNS, connect, timeout) — always
    /// retryable
    fn transport_error(context: &str, err: &reqwest::Error) -> EnrollError {
        EnrollError::UpstreamUnavailable(format!("{}: {}", context, err))
    }

    /// Map a non-2xx response per the directory contract
    async fn response_error(context: &str, response: reqwest::Response) -> EnrollError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail: String = body.chars().take(500).collect();

        if status.is_client_error() {
            EnrollError::UpstreamRejected {
                status: status.as_u16(),
                message: format!("{}: {}", context, detail),
            }
        } else {
            EnrollError::UpstreamUnavailable(format!("{}: {}: {}", context, status, detail))
        }
    }
}

#[async_trait]
impl ContactDirectory for GhlClient {
    async fn find_by_email(&self, email: &str) -> Result<Option<Contact>> {
        let response = self
            .http
            .get(self.url("/contacts/"))
            .query(&[("email", email), ("locationId", &self.config.location_id)])
            .send()
            .await
            .map_err(|e| Self::transport_error("contact search", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("contact search", response).await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Self::transport_error("contact search decode", &e))?;

        Ok(body.contacts.into_iter().next().map(|c| c.into_contact(email)))
    }

    async fn create_contact(&self, new: NewContact) -> Result<Contact> {
        let email = normalize_email(&new.email);
        let body = CreateContactBody::from_new(&new, &self.config.location_id);

        let response = self
            .http
            .post(self.url("/contacts/"))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::transport_error("contact create", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("contact create", response).await);
        }

        let created: CreateResponse = response
            .json()
            .await
            .map_err(|e| Self::transport_error("contact create decode", &e))?;

        let id = created.into_contact_id().ok_or_else(|| {
            EnrollError::Other("contact create response carried no contact id".into())
        })?;

        tracing::debug!(email = %email, contact = %id, "created CRM contact");

        Ok(Contact {
            id: ContactId::from_string(id),
            email,
            tags: new.tags,
        })
    }

    async fn add_tags(&self, id: &ContactId, tags: &[String]) -> Result<()> {
        let response = self
            .http
            .post(self.url(&format!("/contacts/{}/tags", id)))
            .json(&TagsBody { tags })
            .send()
            .await
            .map_err(|e| Self::transport_error("add tags", &e))?;

        if !response.status().is_success() {
            return Err(Self::response_error("add tags", response).await);
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "GHL"
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateContactBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,

    email: &'a str,

    location_id: &'a str,

    source: &'a str,

    tags: &'a [String],
}

impl<'a> CreateContactBody<'a> {
    fn from_new(new: &'a NewContact, location_id: &'a str) -> Self {
        Self {
            name: new.name.as_deref(),
            first_name: new.first_name.as_deref(),
            last_name: new.last_name.as_deref(),
            email: &new.email,
            location_id,
            source: &new.source,
            tags: &new.tags,
        }
    }
}

#[derive(Debug, Serialize)]
struct TagsBody<'a> {
    tags: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    contacts: Vec<WireContact>,
}

#[derive(Debug, Deserialize)]
struct WireContact {
    id: String,

    email: Option<String>,

    #[serde(default)]
    tags: Vec<String>,
}

impl WireContact {
    fn into_contact(self, queried_email: &str) -> Contact {
        Contact {
            id: ContactId::from_string(self.id),
            email: normalize_email(self.email.as_deref().unwrap_or(queried_email)),
            tags: self.tags,
        }
    }
}

/// The create endpoint has shipped the new id under three different keys
/// over the API's lifetime; accept any of them.
#[derive(Debug, Deserialize)]
struct CreateResponse {
    contact: Option<WireContact>,

    id: Option<String>,

    #[serde(rename = "contactId")]
    contact_id: Option<String>,
}

impl CreateResponse {
    fn into_contact_id(self) -> Option<String> {
        self.contact
            .map(|c| c.id)
            .or(self.id)
            .or(self.contact_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_trailing_slash_trimmed() {
        let config = GhlConfig::new("tok", "loc").with_api_base("https://ghl.test/");
        assert_eq!(config.api_base, "https://ghl.test");
    }

    #[test]
    fn test_search_response_shapes() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"contacts":[{"id":"c1","email":"Jane@X.com","tags":["MBA Lead"]}]}"#,
        )
        .unwrap();
        let contact = body.contacts.into_iter().next().unwrap().into_contact("jane@x.com");
        assert_eq!(contact.id.as_str(), "c1");
        assert_eq!(contact.email, "jane@x.com");
        assert_eq!(contact.tags, vec!["MBA Lead".to_string()]);

        let empty: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.contacts.is_empty());
    }

    #[test]
    fn test_create_response_id_under_any_key() {
        let nested: CreateResponse =
            serde_json::from_str(r#"{"contact":{"id":"c1"}}"#).unwrap();
        assert_eq!(nested.into_contact_id().as_deref(), Some("c1"));

        let flat: CreateResponse = serde_json::from_str(r#"{"id":"c2"}"#).unwrap();
        assert_eq!(flat.into_contact_id().as_deref(), Some("c2"));

        let alt: CreateResponse = serde_json::from_str(r#"{"contactId":"c3"}"#).unwrap();
        assert_eq!(alt.into_contact_id().as_deref(), Some("c3"));

        let none: CreateResponse = serde_json::from_str("{}").unwrap();
        assert!(none.into_contact_id().is_none());
    }

    #[test]
    fn test_create_body_skips_absent_names() {
        let new = NewContact::lead("Jane", "jane@x.com", vec!["MBA Lead".into()]);
        let body = CreateContactBody::from_new(&new, "loc123");
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["email"], "jane@x.com");
        assert_eq!(json["locationId"], "loc123");
        assert_eq!(json["source"], "public api");
        assert!(json.get("lastName").is_none());
    }
}
