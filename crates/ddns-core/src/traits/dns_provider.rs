// # DNS Provider Trait
//
// Defines the interface for reading and replacing a DNS record by id.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// let provider = /* DnsProvider implementation */;
// match provider.get_record("zone", "record").await? {
//     ProviderResponse::Success(record) => println!("{} -> {}", record.name, record.content),
//     ProviderResponse::Failure(errors) => eprintln!("{errors:?}"),
// }
// ```

use crate::config::AccountConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One `(code, message)` entry of a provider error list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub code: i64,
    pub message: String,
}

impl ProviderMessage {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Structured provider answer
///
/// A provider that was reached and answered is never turned into an
/// [`crate::Error`] here: failures keep the provider's own error list so the
/// caller can report it verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse<T> {
    /// `success: true` with the echoed result
    Success(T),
    /// `success: false` with the provider's error list
    Failure(Vec<ProviderMessage>),
}

impl<T> ProviderResponse<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ProviderResponse::Success(_))
    }
}

/// Remote state of a DNS record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DnsRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    #[serde(default)]
    pub proxied: bool,
    pub ttl: u32,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub zone_name: Option<String>,
}

/// Body of a full record replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdateRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub content: String,
    pub proxied: bool,
    pub ttl: u32,
    pub comment: String,
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff (the next cycle retries)
/// - ❌ Decide whether an update is allowed (owned by `RecordUpdateTask`)
/// - ❌ Cache state beyond a single request
///
/// Providers are single-shot: one HTTP request per call.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Fetch a record by zone and record id
    ///
    /// # Returns
    ///
    /// - `Ok(ProviderResponse)`: the provider answered (successfully or not)
    /// - `Err(Error)`: the provider could not be reached or answered garbage
    async fn get_record(
        &self,
        zone_id: &str,
        record_id: &str,
    ) -> Result<ProviderResponse<DnsRecord>, crate::Error>;

    /// Replace a record by zone and record id
    async fn put_record(
        &self,
        zone_id: &str,
        record_id: &str,
        request: &RecordUpdateRequest,
    ) -> Result<ProviderResponse<DnsRecord>, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from account credentials
pub trait DnsProviderFactory: Send + Sync {
    /// Create a provider bound to `account`'s credential
    fn create(&self, account: &AccountConfig) -> Result<Arc<dyn DnsProvider>, crate::Error>;
}
