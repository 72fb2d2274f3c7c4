//! Record specifications and update targets
//!
//! These are the strongly typed values the engine works with. They are
//! built once from configuration (see [`crate::config::DdnsConfig::build`])
//! and never change during the process lifetime.

use crate::address::{Address, AddressFamily, cidr_to_mask};
use crate::error::{Error, Result};
use crate::traits::DnsProvider;
use std::fmt;
use std::sync::Arc;

/// Default TTL (seconds) written to updated records
pub const DEFAULT_TTL: u32 = 60;

/// How a record's address is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Derivation {
    /// The host's public address, as reported by the lookup service
    Local,
    /// The network prefix of the public address joined with a fixed suffix
    LocalPrefix { prefix_mask: Address, suffix: Address },
}

/// Address specification of one logical record
///
/// Shared between update targets through `Arc`; two targets consume the
/// same record exactly when they hold the same `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    family: AddressFamily,
    derivation: Derivation,
}

impl RecordSpec {
    pub fn local(family: AddressFamily) -> Self {
        Self {
            family,
            derivation: Derivation::Local,
        }
    }

    /// Prefix-derived record with a literal mask (contiguous or not)
    pub fn local_prefix(family: AddressFamily, prefix_mask: Address, suffix: Address) -> Result<Self> {
        for literal in [prefix_mask, suffix] {
            if literal.family() != family {
                return Err(Error::FamilyMismatch {
                    expected: family,
                    actual: literal.family(),
                });
            }
        }
        Ok(Self {
            family,
            derivation: Derivation::LocalPrefix {
                prefix_mask,
                suffix,
            },
        })
    }

    /// Prefix-derived record with a CIDR prefix length
    pub fn local_prefix_len(family: AddressFamily, prefix_len: i64, suffix: Address) -> Result<Self> {
        Self::local_prefix(family, cidr_to_mask(family, prefix_len)?, suffix)
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }
}

/// Which name the remote record is expected to carry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedName {
    /// A name given explicitly in configuration
    Explicit(String),
    /// The update target's own display name
    DeriveFromTargetName,
    /// No expected name: the update is withheld unless renaming is
    /// allowed, in which case the remote name is kept as-is
    Unchecked,
}

/// One provider record that receives a record's resolved address
#[derive(Clone)]
pub struct UpdateTarget {
    name: String,
    provider: Arc<dyn DnsProvider>,
    zone_id: String,
    record_id: String,
    expected_name: ExpectedName,
    allow_name_change: bool,
    ttl: u32,
    proxied: bool,
    record: Arc<RecordSpec>,
}

impl UpdateTarget {
    /// Create a target with no name expectation, TTL 60 and proxying off
    pub fn new(
        name: impl Into<String>,
        provider: Arc<dyn DnsProvider>,
        zone_id: impl Into<String>,
        record_id: impl Into<String>,
        record: Arc<RecordSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            zone_id: zone_id.into(),
            record_id: record_id.into(),
            expected_name: ExpectedName::Unchecked,
            allow_name_change: false,
            ttl: DEFAULT_TTL,
            proxied: false,
            record,
        }
    }

    pub fn with_expected_name(mut self, expected_name: ExpectedName) -> Self {
        self.expected_name = expected_name;
        self
    }

    pub fn with_allow_name_change(mut self, allow: bool) -> Self {
        self.allow_name_change = allow;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_proxied(mut self, proxied: bool) -> Self {
        self.proxied = proxied;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn provider(&self) -> &dyn DnsProvider {
        self.provider.as_ref()
    }

    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    /// The concrete name the remote record must carry, if any
    pub fn expected_name(&self) -> Option<&str> {
        match &self.expected_name {
            ExpectedName::Explicit(name) => Some(name),
            ExpectedName::DeriveFromTargetName => Some(&self.name),
            ExpectedName::Unchecked => None,
        }
    }

    pub fn allow_name_change(&self) -> bool {
        self.allow_name_change
    }

    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    pub fn proxied(&self) -> bool {
        self.proxied
    }

    pub fn record(&self) -> &Arc<RecordSpec> {
        &self.record
    }
}

impl fmt::Debug for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateTarget")
            .field("name", &self.name)
            .field("provider", &self.provider.provider_name())
            .field("zone_id", &self.zone_id)
            .field("record_id", &self.record_id)
            .field("expected_name", &self.expected_name)
            .field("allow_name_change", &self.allow_name_change)
            .field("ttl", &self.ttl)
            .field("proxied", &self.proxied)
            .field("record", &self.record)
            .finish()
    }
}
