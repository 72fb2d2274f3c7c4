//! Configuration types for the DDNS system
//!
//! The daemon is configured from a single TOML document:
//!
//! ```toml
//! server_name = "edge-01"
//!
//! [global]
//! update_interval = "30min"
//!
//! [accounts.main]
//! type = "cloudflare_api"
//! api_key = "..."
//!
//! [records.home]
//! type = "local_prefix"
//! record = "AAAA"
//! prefix_mask = 64
//! suffix = "::abcd"
//!
//! [[endpoints]]
//! name = "host.example.com"
//! type = "cloudflare_record"
//! account = "main"
//! zone_id = "..."
//! record_id = "..."
//! check_name = "as-name"
//! record = "home"
//! ```
//!
//! `account` and `record` take either the name of an entry declared above
//! or an inline table. Endpoints naming the same record share one address
//! resolution per cycle; inline records are never merged with anything.

use crate::address::{Address, AddressFamily, cidr_to_mask, prefix_length_from_number};
use crate::duration::parse_duration;
use crate::error::{Error, Result};
use crate::graph::RecordGraph;
use crate::record::{DEFAULT_TTL, ExpectedName, RecordSpec, UpdateTarget};
use crate::traits::{DnsProvider, DnsProviderFactory};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// `check_name` value that derives the expected name from the endpoint name
pub const CHECK_NAME_AS_NAME: &str = "as-name";

/// Name of the default lookup service
pub const NO_IP_SERVICE_NAME: &str = "no-ip.com fetch service";

/// Plain-text lookup endpoints of the no-ip service
pub const NO_IP_V4_URL: &str = "http://ip1.dynupdate.no-ip.com/";
pub const NO_IP_V6_URL: &str = "http://ip1.dynupdate6.no-ip.com/";

/// Main DDNS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Identity written into record comments
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// Scheduling options
    #[serde(default)]
    pub global: GlobalConfig,

    /// Public address lookup service
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Provider credentials, by name
    #[serde(default)]
    pub accounts: BTreeMap<String, AccountConfig>,

    /// Address specifications, by name
    #[serde(default)]
    pub records: BTreeMap<String, RecordConfig>,

    /// Provider records to keep up to date
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl DdnsConfig {
    /// Read and parse a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_name.trim().is_empty() {
            return Err(Error::config("server_name cannot be empty"));
        }
        if self.endpoints.is_empty() {
            return Err(Error::config("No endpoints configured"));
        }

        self.global.validate()?;
        self.lookup.validate()?;

        for (name, account) in &self.accounts {
            account
                .validate()
                .map_err(|e| Error::config(format!("account '{name}': {e}")))?;
        }
        for endpoint in &self.endpoints {
            endpoint.validate()?;
        }

        Ok(())
    }

    /// Time to wait between cycles, or `None` in single-run mode
    pub fn update_interval(&self) -> Result<Option<Duration>> {
        if self.global.run_once {
            return Ok(None);
        }
        parse_duration(&self.global.update_interval).map(Some)
    }

    /// Resolve every reference and produce the record graph
    ///
    /// Literal masks and suffixes are parsed here, so a malformed literal is
    /// reported before the first cycle runs. Named records are shared by
    /// every endpoint that references them.
    pub fn build(&self, factory: &dyn DnsProviderFactory) -> Result<RecordGraph> {
        self.validate()?;

        let mut named = Vec::with_capacity(self.records.len());
        let mut records_by_name: HashMap<&str, Arc<RecordSpec>> = HashMap::new();
        for (name, record) in &self.records {
            let spec = Arc::new(record.to_spec().map_err(|e| Error::Record {
                record: name.clone(),
                source: Box::new(e),
            })?);
            self.lookup.ensure_family(spec.family())?;
            records_by_name.insert(name.as_str(), Arc::clone(&spec));
            named.push((name.clone(), spec));
        }

        let mut providers: HashMap<&str, Arc<dyn DnsProvider>> = HashMap::new();
        for (name, account) in &self.accounts {
            providers.insert(name.as_str(), factory.create(account)?);
        }

        let mut targets = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let provider = match &endpoint.account {
                AccountRef::Named(name) => providers.get(name.as_str()).cloned().ok_or_else(|| {
                    Error::config(format!(
                        "endpoint '{}' references unknown account '{name}'",
                        endpoint.name
                    ))
                })?,
                AccountRef::Inline(account) => {
                    account.validate()?;
                    factory.create(account)?
                }
            };

            let record = match &endpoint.record {
                RecordRef::Named(name) => records_by_name.get(name.as_str()).cloned().ok_or_else(|| {
                    Error::config(format!(
                        "endpoint '{}' references unknown record '{name}'",
                        endpoint.name
                    ))
                })?,
                RecordRef::Inline(record) => {
                    let spec = record.to_spec().map_err(|e| Error::Record {
                        record: format!("(inline for {})", endpoint.name),
                        source: Box::new(e),
                    })?;
                    self.lookup.ensure_family(spec.family())?;
                    Arc::new(spec)
                }
            };

            targets.push(
                UpdateTarget::new(
                    endpoint.name.clone(),
                    provider,
                    endpoint.zone_id.clone(),
                    endpoint.record_id.clone(),
                    record,
                )
                .with_expected_name(endpoint.expected_name())
                .with_allow_name_change(endpoint.allow_name_change)
                .with_ttl(endpoint.ttl)
                .with_proxied(endpoint.proxied),
            );
        }

        Ok(RecordGraph::build(named, targets))
    }
}

fn default_server_name() -> String {
    "DD-Cluster DDNS Server".to_string()
}

/// Scheduling options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Interval between cycles, e.g. `"30min"` or `"1h 30min"`
    #[serde(default = "default_update_interval")]
    pub update_interval: String,

    /// Run a single cycle and exit
    #[serde(default)]
    pub run_once: bool,

    /// Write records even when they already match
    #[serde(default)]
    pub force_update: bool,
}

impl GlobalConfig {
    pub fn validate(&self) -> Result<()> {
        let interval = parse_duration(&self.update_interval)?;
        if !self.run_once && interval.is_zero() {
            return Err(Error::config("update_interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            update_interval: default_update_interval(),
            run_once: false,
            force_update: false,
        }
    }
}

fn default_update_interval() -> String {
    "30min".to_string()
}

/// Plain-text "what is my address" service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Service name, used in logs and as the per-cycle cache key
    pub name: String,
    /// IPv4 endpoints, tried in order
    #[serde(default)]
    pub v4: Vec<String>,
    /// IPv6 endpoints, tried in order
    #[serde(default)]
    pub v6: Vec<String>,
}

impl LookupConfig {
    pub fn urls(&self, family: AddressFamily) -> &[String] {
        match family {
            AddressFamily::V4 => &self.v4,
            AddressFamily::V6 => &self.v6,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("lookup service name cannot be empty"));
        }
        if self.v4.is_empty() && self.v6.is_empty() {
            return Err(Error::config(format!(
                "lookup service '{}' has no endpoints",
                self.name
            )));
        }
        Ok(())
    }

    fn ensure_family(&self, family: AddressFamily) -> Result<()> {
        if self.urls(family).is_empty() {
            return Err(Error::config(format!(
                "lookup service '{}' has no {family} endpoints",
                self.name
            )));
        }
        Ok(())
    }
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            name: NO_IP_SERVICE_NAME.to_string(),
            v4: vec![NO_IP_V4_URL.to_string()],
            v6: vec![NO_IP_V6_URL.to_string()],
        }
    }
}

/// Provider credentials
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountConfig {
    /// Cloudflare API token
    CloudflareApi { api_key: String },
}

impl AccountConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            AccountConfig::CloudflareApi { api_key } => {
                if api_key.trim().is_empty() {
                    return Err(Error::config("Cloudflare API key cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            AccountConfig::CloudflareApi { .. } => "cloudflare",
        }
    }
}

impl fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountConfig::CloudflareApi { .. } => f
                .debug_struct("CloudflareApi")
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}

/// Address specification as written in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordConfig {
    /// The host's public address
    Local { record: AddressFamily },

    /// Public prefix joined with a fixed suffix
    LocalPrefix {
        record: AddressFamily,
        prefix_mask: MaskConfig,
        suffix: String,
    },
}

impl RecordConfig {
    pub fn family(&self) -> AddressFamily {
        match self {
            RecordConfig::Local { record } | RecordConfig::LocalPrefix { record, .. } => *record,
        }
    }

    /// Parse literals into a [`RecordSpec`]
    pub fn to_spec(&self) -> Result<RecordSpec> {
        match self {
            RecordConfig::Local { record } => Ok(RecordSpec::local(*record)),
            RecordConfig::LocalPrefix {
                record,
                prefix_mask,
                suffix,
            } => {
                let mask = prefix_mask.to_mask(*record)?;
                let suffix = Address::parse_for(*record, suffix)?;
                RecordSpec::local_prefix(*record, mask, suffix)
            }
        }
    }
}

/// A prefix given as a CIDR length or as a literal mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaskConfig {
    Length(i64),
    /// A float; accepted only when integral
    Fractional(f64),
    Literal(String),
}

impl MaskConfig {
    pub fn to_mask(&self, family: AddressFamily) -> Result<Address> {
        match self {
            MaskConfig::Length(len) => cidr_to_mask(family, *len),
            MaskConfig::Fractional(value) => {
                cidr_to_mask(family, prefix_length_from_number(*value)?)
            }
            MaskConfig::Literal(literal) => Address::parse_for(family, literal),
        }
    }
}

/// Reference to an account entry, or an inline account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountRef {
    Named(String),
    Inline(AccountConfig),
}

/// Reference to a record entry, or an inline record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    Named(String),
    Inline(RecordConfig),
}

/// Supported endpoint kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    CloudflareRecord,
}

/// One provider record to keep up to date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Display name; also the expected record name with `check_name = "as-name"`
    pub name: String,

    #[serde(rename = "type")]
    pub kind: EndpointKind,

    pub account: AccountRef,
    pub zone_id: String,
    pub record_id: String,

    /// `"as-name"`, an explicit record name, or absent for no check
    #[serde(default)]
    pub check_name: Option<String>,

    /// Rename the remote record when it differs from the expected name
    #[serde(default)]
    pub allow_name_change: bool,

    #[serde(default = "default_ttl")]
    pub ttl: u32,

    #[serde(default)]
    pub proxied: bool,

    pub record: RecordRef,
}

impl EndpointConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("endpoint name cannot be empty"));
        }
        if self.zone_id.trim().is_empty() || self.record_id.trim().is_empty() {
            return Err(Error::config(format!(
                "endpoint '{}' needs both zone_id and record_id",
                self.name
            )));
        }
        if self.ttl == 0 {
            return Err(Error::config(format!(
                "endpoint '{}' has a zero ttl",
                self.name
            )));
        }
        Ok(())
    }

    pub fn expected_name(&self) -> ExpectedName {
        match self.check_name.as_deref() {
            None => ExpectedName::Unchecked,
            Some(CHECK_NAME_AS_NAME) => ExpectedName::DeriveFromTargetName,
            Some(name) => ExpectedName::Explicit(name.to_string()),
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}
