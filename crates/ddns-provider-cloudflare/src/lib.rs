// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// ## Scope
//
// - ✅ One HTTP request per call (GET or PUT of a single record by id)
// - ✅ Structured `success: false` answers returned as `ProviderResponse::Failure`
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Dry-run mode for safe testing
// - ✅ Both A and AAAA records
// - ❌ NO retry logic (the next scheduled cycle is the retry)
// - ❌ NO name checks or idempotency decisions (owned by `RecordUpdateTask`)
// - ❌ NO caching
// - ❌ NO background tasks
//
// ## Trust Level: Untrusted (DNS Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Access other providers
// - ❌ Make scheduling decisions
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - DNS Record Details: GET `/zones/:zone_id/dns_records/:record_id`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::AccountConfig;
use ddns_core::traits::{
    DnsProvider, DnsProviderFactory, DnsRecord, ProviderMessage, ProviderResponse,
    RecordUpdateRequest,
};
use ddns_core::{Error, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER_NAME: &str = "cloudflare";

/// Response envelope shared by every Cloudflare v4 endpoint
#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    errors: Vec<ProviderMessage>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// Isolated, stateless and single-shot. All coordination is owned by the
/// engine.
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform GET requests normally
/// - Log the intended PUT payload
/// - **NOT** modify DNS records, answering as if the write succeeded
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip PUT updates
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip PUT updates
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the token is empty, [`Error::Http`] when the
    /// HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token,
            base_url: CLOUDFLARE_API_BASE.to_string(),
            client,
            dry_run,
        })
    }

    /// Point the provider at another API root (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn record_url(&self, zone_id: &str, record_id: &str) -> String {
        format!("{}/zones/{}/dns_records/{}", self.base_url, zone_id, record_id)
    }

    /// Turn an HTTP response into a structured provider answer
    ///
    /// Cloudflare reports most client errors (bad token, missing record,
    /// invalid content) as a JSON envelope with `success: false`, whatever
    /// the status code. Anything that is not such an envelope is a transport
    /// failure.
    async fn parse_response(response: reqwest::Response) -> Result<ProviderResponse<DnsRecord>> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("failed to read response: {e}")))?;

        let envelope: Envelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(_) => return Err(status_error(status, &body)),
        };

        if !envelope.success {
            return Ok(ProviderResponse::Failure(envelope.errors));
        }

        let result = envelope.result.ok_or_else(|| {
            Error::provider(PROVIDER_NAME, "invalid response format: missing result")
        })?;
        let record: DnsRecord = serde_json::from_value(result).map_err(|e| {
            Error::provider(PROVIDER_NAME, format!("invalid record in response: {e}"))
        })?;
        Ok(ProviderResponse::Success(record))
    }
}

/// Describe a non-envelope response by its status code
fn status_error(status: reqwest::StatusCode, body: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {status}"
        ),
        429 => format!("Rate limit exceeded. Please retry later. Status: {status}"),
        500..=599 => format!("Cloudflare server error (transient): {status} - {body}"),
        _ => format!("Unexpected response: {status} - {body}"),
    };
    Error::provider(PROVIDER_NAME, message)
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// ```http
    /// GET /zones/:zone_id/dns_records/:record_id
    /// Authorization: Bearer <token>
    /// ```
    async fn get_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<ProviderResponse<DnsRecord>> {
        let url = self.record_url(zone_id, record_id);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {e}")))?;

        Self::parse_response(response).await
    }

    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// Authorization: Bearer <token>
    ///
    /// { "name": ..., "type": ..., "content": ..., "proxied": ..., "ttl": ..., "comment": ... }
    /// ```
    async fn put_record(
        &self,
        zone_id: &str,
        record_id: &str,
        request: &RecordUpdateRequest,
    ) -> Result<ProviderResponse<DnsRecord>> {
        let url = self.record_url(zone_id, record_id);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(request)?
            );
            return Ok(ProviderResponse::Success(DnsRecord {
                id: record_id.to_string(),
                name: request.name.clone(),
                record_type: request.record_type.clone(),
                content: request.content.clone(),
                proxied: request.proxied,
                ttl: request.ttl,
                comment: Some(request.comment.clone()),
                zone_name: None,
            }));
        }

        tracing::debug!("PUT {}", url);
        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER_NAME, format!("HTTP request failed: {e}")))?;

        Self::parse_response(response).await
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Cloudflare providers
#[derive(Debug, Clone, Default)]
pub struct CloudflareFactory {
    dry_run: bool,
}

impl CloudflareFactory {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    /// Dry-run when `DDNS_MODE=dry-run`
    pub fn from_env() -> Self {
        let dry_run = std::env::var("DDNS_MODE")
            .unwrap_or_default()
            .eq_ignore_ascii_case("dry-run");
        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        Self::new(dry_run)
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, account: &AccountConfig) -> Result<Arc<dyn DnsProvider>> {
        match account {
            AccountConfig::CloudflareApi { api_key } => {
                Ok(Arc::new(CloudflareProvider::new(api_key.clone(), self.dry_run)?))
            }
        }
    }
}
