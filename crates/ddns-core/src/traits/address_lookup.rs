// # Address Lookup Trait
//
// Defines the interface for asking an external service which address this
// host is seen from.
//
// ## Implementations
//
// - Plain-text HTTP services: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{AddressFamily, AddressLookup};
//
// let lookup = /* AddressLookup implementation */;
// let current = lookup.lookup(AddressFamily::V6).await?;
// println!("seen as {current} via {}", lookup.name());
// ```
//
// Lookups never cache. Per-cycle caching is owned by `RunContext`, so that a
// fresh cycle always observes the network again.

use crate::address::{Address, AddressFamily};
use async_trait::async_trait;

/// A named, swappable "what is my address" service
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP requests to the configured lookup endpoints
/// - ✅ Fall back between endpoints of the same family
///
/// ## Forbidden Capabilities
/// - ❌ Cache results across calls (owned by `RunContext`)
/// - ❌ Spawn tasks or polling loops (scheduling is owned by `Scheduler`)
/// - ❌ Retry with sleeps (the next cycle is the retry)
#[async_trait]
pub trait AddressLookup: Send + Sync {
    /// Query the current public address for `family`
    ///
    /// # Returns
    ///
    /// - `Ok(Address)`: an address of exactly `family`
    /// - `Err(Error::AddressLookup)`: every endpoint failed
    async fn lookup(&self, family: AddressFamily) -> Result<Address, crate::Error>;

    /// Human-readable service name, also used as the cache key
    fn name(&self) -> &str;
}
