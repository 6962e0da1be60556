//! # Vendor Client
//!
//! Authenticated HTTP access to the vendor's JSON API and AEMP fleet feed.
//!
//! ## Page Chain
//! ```text
//!   GET endpoint ──► { values: [...], links: [{rel: "nextPage", uri}] }
//!        │                                              │
//!        │  append values                               │ follow uri as-is
//!        ▼                                              ▼
//!   records ◄──────────────────────────────────── GET nextPage ... until absent
//!
//!   any non-2xx or transport failure ⇒ Err, earlier pages discarded
//! ```
//!
//! ## Fleet Feed
//! ```text
//!   GET {aemp}/Fleet/1 ──► decode <Equipment> blocks
//!        │
//!        └─ page links to /Fleet/{k}, k > 1? ──► GET {aemp}/Fleet/2 ...
//! ```

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use crate::config::VendorSettings;
use crate::error::{SyncError, SyncResult, UpstreamError};
use harvest_core::telemetry::{decode_fleet_page, has_later_page};
use harvest_core::vendor::{next_page_link, page_values};
use harvest_core::FleetTelemetry;

/// Media type requested from the fleet feed.
const AEMP_ACCEPT: &str = "application/xml";

/// Every record of a page chain.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub records: Vec<Value>,
    pub total: usize,
}

/// Every machine reported by the fleet feed.
#[derive(Debug, Clone, Default)]
pub struct FleetPage {
    pub equipment: Vec<FleetTelemetry>,
    pub total: usize,
}

/// HTTP client for the vendor API.
#[derive(Debug, Clone)]
pub struct VendorClient {
    http: Client,
    api_base: String,
    aemp_base: String,
    accept: String,
}

impl VendorClient {
    /// Builds a client with the configured timeout.
    pub fn new(settings: &VendorSettings) -> SyncResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(VendorClient {
            http,
            api_base: settings.api_base_url.trim_end_matches('/').to_string(),
            aemp_base: settings.aemp_base_url.trim_end_matches('/').to_string(),
            accept: settings.accept.clone(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute endpoints are used as-is; anything else is joined onto the
    /// API base.
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else if endpoint.starts_with('/') {
            format!("{}{}", self.api_base, endpoint)
        } else {
            format!("{}/{}", self.api_base, endpoint)
        }
    }

    fn authed(&self, url: &str, token: &str) -> RequestBuilder {
        self.http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(ACCEPT, &self.accept)
    }

    async fn send_json(&self, req: RequestBuilder) -> Result<Value, UpstreamError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::new(status.as_u16(), body));
        }
        resp.json::<Value>().await.map_err(UpstreamError::transport)
    }

    // =========================================================================
    // JSON API
    // =========================================================================

    /// Fetches one page without following links.
    pub async fn fetch_json(&self, endpoint: &str, token: &str) -> Result<Value, UpstreamError> {
        let url = self.resolve(endpoint);
        debug!(%url, "Fetching vendor resource");
        self.send_json(self.authed(&url, token)).await
    }

    /// Fetches `endpoint` and every page chained behind it.
    ///
    /// ## Returns
    /// * `Ok(Page)` - all records in server order
    /// * `Err(UpstreamError)` - first failing page; nothing is returned from
    ///   the pages fetched before it
    pub async fn fetch_all_pages(&self, endpoint: &str, token: &str) -> Result<Page, UpstreamError> {
        let mut records = Vec::new();
        let mut next = Some(self.resolve(endpoint));
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            let body = self.send_json(self.authed(&url, token)).await?;
            let values = page_values(&body);
            pages += 1;
            debug!(%url, page = pages, count = values.len(), "Fetched page");
            records.extend(values.iter().cloned());
            next = next_page_link(&body);
        }

        let total = records.len();
        Ok(Page { records, total })
    }

    // =========================================================================
    // AEMP Fleet Feed
    // =========================================================================

    /// Fetches and decodes the fleet feed, page by page number.
    pub async fn fetch_fleet_telemetry(&self, token: &str) -> Result<FleetPage, UpstreamError> {
        let mut equipment = Vec::new();
        let mut page: u32 = 1;

        loop {
            let url = format!("{}/Fleet/{}", self.aemp_base, page);
            let resp = self
                .http
                .get(&url)
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .header(ACCEPT, AEMP_ACCEPT)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(UpstreamError::new(status.as_u16(), body));
            }
            let xml = resp.text().await?;

            let decoded = decode_fleet_page(&xml);
            debug!(%url, page, count = decoded.len(), "Fetched fleet page");
            equipment.extend(decoded);

            if !has_later_page(&xml, page) {
                break;
            }
            page += 1;
        }

        let total = equipment.len();
        Ok(FleetPage { equipment, total })
    }
}
