//! Address sources
//!
//! An [`AddressSource`] turns a [`RecordSpec`] into a concrete address for
//! the current cycle. The set of sources is closed: a record is either the
//! host's public address, or that address's prefix joined with a fixed
//! suffix.

use crate::address::{Address, AddressFamily, apply_mask, invert_mask, merge};
use crate::context::RunContext;
use crate::error::{Error, Result};
use crate::record::{Derivation, RecordSpec};
use crate::traits::AddressLookup;
use std::sync::Arc;
use tracing::{debug, info};

/// The host's public address for one family
#[derive(Clone)]
pub struct LocalSource {
    family: AddressFamily,
    lookup: Arc<dyn AddressLookup>,
}

impl LocalSource {
    pub fn new(family: AddressFamily, lookup: Arc<dyn AddressLookup>) -> Self {
        Self { family, lookup }
    }

    /// Resolve through the cycle cache, querying the lookup at most once
    /// per `(service, family)` in a given context
    pub async fn resolve(&self, ctx: &mut RunContext) -> Result<Address> {
        let service = self.lookup.name();
        info!(
            "getting local {} address using service: {}",
            self.family, service
        );

        if let Some(cached) = ctx.cached(service, self.family) {
            info!("using address cached for this run: {}", cached);
            return Ok(cached);
        }

        let address = self.lookup.lookup(self.family).await?;
        if address.family() != self.family {
            return Err(Error::address_lookup(
                service,
                format!("expected an {} address, got {}", self.family, address),
            ));
        }

        info!("obtained local address: {}", address);
        ctx.remember(service, self.family, address);
        Ok(address)
    }
}

/// Network prefix of the public address joined with a fixed host suffix
#[derive(Clone)]
pub struct PrefixSource {
    base: LocalSource,
    prefix_mask: Address,
    suffix: Address,
}

impl PrefixSource {
    pub fn new(base: LocalSource, prefix_mask: Address, suffix: Address) -> Self {
        Self {
            base,
            prefix_mask,
            suffix,
        }
    }

    pub async fn resolve(&self, ctx: &mut RunContext) -> Result<Address> {
        let local = self.base.resolve(ctx).await?;
        let derived = self.derive(local)?;
        debug!(
            local = %local,
            mask = %self.prefix_mask,
            suffix = %self.suffix,
            "derived {}",
            derived
        );
        Ok(derived)
    }

    /// `(local AND mask) OR (suffix AND NOT mask)`
    pub fn derive(&self, local: Address) -> Result<Address> {
        let suffix_mask = invert_mask(self.prefix_mask);
        let prefix = apply_mask(local, self.prefix_mask)?;
        let host = apply_mask(self.suffix, suffix_mask)?;
        merge(prefix, host)
    }
}

/// Closed set of address derivations
#[derive(Clone)]
pub enum AddressSource {
    Local(LocalSource),
    LocalPrefix(PrefixSource),
}

impl AddressSource {
    /// Build the source that computes `spec`'s address through `lookup`
    pub fn for_record(spec: &RecordSpec, lookup: Arc<dyn AddressLookup>) -> Self {
        let local = LocalSource::new(spec.family(), lookup);
        match spec.derivation() {
            Derivation::Local => AddressSource::Local(local),
            Derivation::LocalPrefix {
                prefix_mask,
                suffix,
            } => AddressSource::LocalPrefix(PrefixSource::new(local, *prefix_mask, *suffix)),
        }
    }

    pub fn family(&self) -> AddressFamily {
        match self {
            AddressSource::Local(local) => local.family,
            AddressSource::LocalPrefix(prefix) => prefix.base.family,
        }
    }

    pub async fn resolve(&self, ctx: &mut RunContext) -> Result<Address> {
        match self {
            AddressSource::Local(local) => local.resolve(ctx).await,
            AddressSource::LocalPrefix(prefix) => prefix.resolve(ctx).await,
        }
    }
}
