// # HTTP Address Lookup
//
// This crate provides a plain-text HTTP "what is my address" lookup for the
// DDNS system.
//
// ## Protocol
//
// A lookup endpoint answers a GET with the caller's public address as the
// response body, optionally surrounded by whitespace:
//
// ```text
// GET http://ip1.dynupdate6.no-ip.com/
//
// 2001:db8:5:6:7:8:9:10
// ```
//
// ## Architecture
//
// - Endpoints of the requested family are tried in configuration order
// - The first endpoint that answers with an address of that family wins
// - No caching, no polling (one lookup per call, the engine caches per cycle)

use async_trait::async_trait;
use ddns_core::config::LookupConfig;
use ddns_core::traits::AddressLookup;
use ddns_core::{Address, AddressFamily, Error, Result};
use std::time::Duration;

/// Timeout for a single lookup request
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Plain-text HTTP address lookup service
pub struct HttpAddressLookup {
    name: String,
    v4: Vec<String>,
    v6: Vec<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpAddressLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAddressLookup")
            .field("name", &self.name)
            .field("v4", &self.v4)
            .field("v6", &self.v6)
            .finish()
    }
}

impl HttpAddressLookup {
    /// Create a lookup service from explicit endpoint lists
    pub fn new(name: impl Into<String>, v4: Vec<String>, v6: Vec<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            v4,
            v6,
            client,
        })
    }

    /// Create a lookup service from the `[lookup]` configuration section
    pub fn from_config(config: &LookupConfig) -> Result<Self> {
        Self::new(config.name.clone(), config.v4.clone(), config.v6.clone())
    }

    /// The no-ip.com lookup service
    pub fn no_ip() -> Result<Self> {
        Self::from_config(&LookupConfig::default())
    }

    fn urls(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }

    /// Fetch and parse one endpoint's answer
    async fn fetch(&self, url: &str, family: AddressFamily) -> Result<Address> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::http(format!(
                "{url} answered with status {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("failed to read response from {url}: {e}")))?;

        Address::parse_for(family, body.trim())
    }
}

#[async_trait]
impl AddressLookup for HttpAddressLookup {
    async fn lookup(&self, family: AddressFamily) -> Result<Address> {
        let urls = self.urls(family);
        if urls.is_empty() {
            return Err(Error::address_lookup(
                &self.name,
                format!("no {family} endpoints configured"),
            ));
        }

        let mut failures = Vec::with_capacity(urls.len());
        for url in urls {
            match self.fetch(url, family).await {
                Ok(address) => {
                    tracing::debug!("{} answered {} via {}", self.name, address, url);
                    return Ok(address);
                }
                Err(e) => {
                    tracing::warn!("address lookup via {} failed: {}", url, e);
                    failures.push(e.to_string());
                }
            }
        }

        Err(Error::address_lookup(&self.name, failures.join("; ")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
