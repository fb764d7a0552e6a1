//! Xendit Invoices
//!
//! Implements the hosted-invoice approach: each registrant gets a unique
//! payment link with their details pre-filled, and the role, organization
//! and participant list parked in invoice metadata so the payment webhook
//! can reconstruct the full event without any local state.
//!
//! When dynamic invoicing is not configured, [`CheckoutLinks`] provides the
//! static per-role hosted links the lead flow falls back to.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use enroll_core::event::Role;

use crate::error::{PaymentError, Result};

const DEFAULT_API_BASE: &str = "https://api.xendit.co";

/// Hosted invoices stay payable for 24 hours
const INVOICE_DURATION_SECS: u64 = 86_400;

/// Per-role workshop pricing in minor currency units
#[derive(Clone, Debug)]
pub struct PriceTable {
    pub student_minor: i64,
    pub professional_minor: i64,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            student_minor: 500,
            professional_minor: 1000,
        }
    }
}

impl PriceTable {
    /// Read `PRICE_STUDENT` / `PRICE_PROFESSIONAL` from the environment
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            student_minor: env_i64("PRICE_STUDENT").unwrap_or(defaults.student_minor),
            professional_minor: env_i64("PRICE_PROFESSIONAL")
                .unwrap_or(defaults.professional_minor),
        }
    }

    pub fn amount_for(&self, role: Role) -> i64 {
        match role {
            Role::Student => self.student_minor,
            Role::Professional => self.professional_minor,
        }
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn description_for(role: Role) -> &'static str {
    match role {
        Role::Student => "Millennial Business Academy - Student Registration",
        Role::Professional => "Millennial Business Academy - Professional Registration",
    }
}

/// Static per-role hosted checkout links (fallback when dynamic invoicing
/// is unavailable)
#[derive(Clone, Debug, Default)]
pub struct CheckoutLinks {
    pub student: Option<String>,
    pub professional: Option<String>,
}

impl CheckoutLinks {
    /// Read `XENDIT_STUDENT_LINK` / `XENDIT_PROFESSIONAL_LINK` from the
    /// environment
    pub fn from_env() -> Self {
        Self {
            student: std::env::var("XENDIT_STUDENT_LINK").ok().filter(|s| !s.is_empty()),
            professional: std::env::var("XENDIT_PROFESSIONAL_LINK")
                .ok()
                .filter(|s| !s.is_empty()),
        }
    }

    pub fn link_for(&self, role: Role) -> Option<&str> {
        match role {
            Role::Student => self.student.as_deref(),
            Role::Professional => self.professional.as_deref(),
        }
    }

    /// Build the checkout redirect for a lead: the role's static link with
    /// UTM parameters, role and email appended for post-payment tracking.
    ///
    /// `None` when no link is configured for the role or the configured
    /// link is not a valid URL.
    pub fn redirect_for(
        &self,
        role: Role,
        email: &str,
        utms: &HashMap<String, String>,
    ) -> Option<String> {
        let link = self.link_for(role)?;
        let mut url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(role = %role, error = %e, "configured checkout link is not a valid URL");
                return None;
            }
        };

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in utms {
                if !value.is_empty() {
                    pairs.append_pair(key, value);
                }
            }
            pairs.append_pair("r", role.as_str());
            pairs.append_pair("email", email);
        }

        Some(url.into())
    }
}

/// Xendit client configuration
#[derive(Clone, Debug)]
pub struct XenditConfig {
    /// API secret key, sent as the basic-auth username with empty password
    pub secret_key: String,

    /// API base URL, without trailing slash
    pub api_base: String,

    /// Public base URL of the site, for post-payment redirects
    pub site_base: String,

    /// Bound on every outbound call
    pub timeout: Duration,
}

impl XenditConfig {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.into(),
            site_base: "http://localhost:3000".into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Read `XENDIT_SECRET_KEY` (required) and `PRODUCTION_URL` from the
    /// environment
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("XENDIT_SECRET_KEY")
            .map_err(|_| PaymentError::Config("XENDIT_SECRET_KEY not set".into()))?;

        let mut config = Self::new(secret_key);
        if let Ok(site) = std::env::var("PRODUCTION_URL") {
            config.site_base = site.trim_end_matches('/').to_string();
        }
        Ok(config)
    }
}

/// Xendit invoice client
pub struct XenditClient {
    http: reqwest::Client,
    config: XenditConfig,
    prices: PriceTable,
}

/// Request to create an invoice for one registrant
#[derive(Clone, Debug)]
pub struct InvoiceRequest {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub organization: Option<String>,
    pub year_in_college: Option<String>,
    pub participant_emails: Vec<String>,
}

/// A created invoice
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Invoice {
    pub id: String,
    pub external_id: String,
    pub invoice_url: String,
    pub amount: i64,
    pub status: String,
}

impl XenditClient {
    pub fn new(config: XenditConfig, prices: PriceTable) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            prices,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(XenditConfig::from_env()?, PriceTable::from_env())
    }

    /// Create a hosted invoice and return its payment URL
    pub async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice> {
        let body = build_invoice_body(request, &self.prices, &self.config.site_base)?;

        tracing::info!(
            external_id = %body.external_id,
            amount = body.amount,
            email = %request.email,
            role = %request.role,
            "creating invoice"
        );

        let response = self
            .http
            .post(format!("{}/v2/invoices", self.config.api_base))
            .basic_auth(&self.config.secret_key, Some(""))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Provider(format!("invoice create: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(if status.is_client_error() {
                PaymentError::ProviderRejected {
                    status: status.as_u16(),
                    message: detail,
                }
            } else {
                PaymentError::Provider(format!("invoice create: {}: {}", status, detail))
            });
        }

        let invoice: Invoice = response
            .json()
            .await
            .map_err(|e| PaymentError::Provider(format!("invoice response decode: {}", e)))?;

        tracing::info!(id = %invoice.id, url = %invoice.invoice_url, "invoice created");
        Ok(invoice)
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct InvoiceBody {
    external_id: String,
    amount: i64,
    payer_email: String,
    description: String,
    invoice_duration: u64,
    currency: &'static str,
    success_redirect_url: String,
    failure_redirect_url: String,
    customer: Customer,
    items: Vec<LineItem>,
    metadata: InvoiceMetadata,
}

#[derive(Debug, Serialize)]
struct Customer {
    given_names: String,
    email: String,
}

#[derive(Debug, Serialize)]
struct LineItem {
    name: String,
    quantity: u32,
    price: i64,
    category: &'static str,
}

/// Carried opaquely by the provider and echoed back on the webhook; the
/// participant list is JSON-encoded because the metadata map is flat strings
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceMetadata {
    email: String,
    role: String,
    organization: String,
    year_in_college: String,
    name: String,
    source: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    participant_emails: Option<String>,
}

fn build_invoice_body(
    request: &InvoiceRequest,
    prices: &PriceTable,
    site_base: &str,
) -> Result<InvoiceBody> {
    let amount = prices.amount_for(request.role);
    let description = description_for(request.role);
    let external_id = format!(
        "MBA-{}-{}",
        request.role.as_str(),
        Uuid::new_v4().simple()
    );

    let participant_emails = if request.participant_emails.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&request.participant_emails).map_err(|e| {
            PaymentError::Invalid(format!("unserializable participant list: {}", e))
        })?)
    };

    Ok(InvoiceBody {
        external_id,
        amount,
        payer_email: request.email.clone(),
        description: description.to_string(),
        invoice_duration: INVOICE_DURATION_SECS,
        currency: "PHP",
        success_redirect_url: success_redirect(request, site_base)?,
        failure_redirect_url: failure_redirect(request, site_base)?,
        customer: Customer {
            given_names: request.name.clone(),
            email: request.email.clone(),
        },
        items: vec![LineItem {
            name: description.to_string(),
            quantity: 1,
            price: amount,
            category: "Event Registration",
        }],
        metadata: InvoiceMetadata {
            email: request.email.clone(),
            role: request.role.as_str().to_string(),
            organization: request.organization.clone().unwrap_or_default(),
            year_in_college: request.year_in_college.clone().unwrap_or_default(),
            name: request.name.clone(),
            source: "MBA Registration Form",
            participant_emails,
        },
    })
}

fn site_url(site_base: &str, path: &str) -> Result<Url> {
    Url::parse(&format!("{}{}", site_base.trim_end_matches('/'), path))
        .map_err(|e| PaymentError::Config(format!("invalid site base URL: {}", e)))
}

fn success_redirect(request: &InvoiceRequest, site_base: &str) -> Result<String> {
    let mut url = site_url(site_base, "/eticket")?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("email", &request.email);
        pairs.append_pair("role", request.role.as_str());
        pairs.append_pair("org", request.organization.as_deref().unwrap_or(""));
        pairs.append_pair("year", request.year_in_college.as_deref().unwrap_or(""));
        pairs.append_pair("name", &request.name);
        if !request.participant_emails.is_empty() {
            pairs.append_pair("participants", &request.participant_emails.join(","));
        }
    }
    Ok(url.into())
}

fn failure_redirect(request: &InvoiceRequest, site_base: &str) -> Result<String> {
    let mut url = site_url(site_base, &format!("/checkout-{}", request.role.as_str()))?;
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("email", &request.email);
        pairs.append_pair("name", &request.name);
        pairs.append_pair("error", "payment_failed");
    }
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> InvoiceRequest {
        InvoiceRequest {
            name: "Jane Doe".into(),
            email: "jane@x.com".into(),
            role: Role::Student,
            organization: Some("U.P. Diliman".into()),
            year_in_college: Some("1st Year College".into()),
            participant_emails: vec!["amy@x.com".into(), "cal@x.com".into()],
        }
    }

    #[test]
    fn test_price_table() {
        let prices = PriceTable::default();
        assert_eq!(prices.amount_for(Role::Student), 500);
        assert_eq!(prices.amount_for(Role::Professional), 1000);
    }

    #[test]
    fn test_invoice_body() {
        let body = build_invoice_body(&request(), &PriceTable::default(), "https://site.test").unwrap();

        assert!(body.external_id.starts_with("MBA-student-"));
        assert_eq!(body.amount, 500);
        assert_eq!(body.currency, "PHP");
        assert_eq!(body.items.len(), 1);
        assert_eq!(body.items[0].price, 500);
        assert!(body.description.contains("Student"));
        assert!(body.success_redirect_url.starts_with("https://site.test/eticket?"));
        assert!(body.failure_redirect_url.contains("/checkout-student"));
        assert!(body.failure_redirect_url.contains("error=payment_failed"));
    }

    #[test]
    fn test_metadata_participants_round_trip() {
        let body = build_invoice_body(&request(), &PriceTable::default(), "https://site.test").unwrap();

        let serialized = body.metadata.participant_emails.unwrap();
        let decoded: Vec<String> = serde_json::from_str(&serialized).unwrap();
        assert_eq!(decoded, vec!["amy@x.com", "cal@x.com"]);
    }

    #[test]
    fn test_metadata_omits_empty_participant_list() {
        let mut req = request();
        req.participant_emails.clear();
        let body = build_invoice_body(&req, &PriceTable::default(), "https://site.test").unwrap();
        assert!(body.metadata.participant_emails.is_none());
    }

    #[test]
    fn test_checkout_redirect_appends_tracking() {
        let links = CheckoutLinks {
            student: Some("https://checkout.test/od/student".into()),
            professional: None,
        };
        let mut utms = HashMap::new();
        utms.insert("utm_source".to_string(), "newsletter".to_string());
        utms.insert("utm_term".to_string(), String::new());

        let redirect = links.redirect_for(Role::Student, "jane@x.com", &utms).unwrap();
        let url = Url::parse(&redirect).unwrap();
        let pairs: HashMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs.get("utm_source").map(String::as_str), Some("newsletter"));
        assert_eq!(pairs.get("r").map(String::as_str), Some("student"));
        assert_eq!(pairs.get("email").map(String::as_str), Some("jane@x.com"));
        assert!(!pairs.contains_key("utm_term"));

        assert!(links.redirect_for(Role::Professional, "joe@x.com", &HashMap::new()).is_none());
    }
}
