//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that external integrations
//! must follow.
//!
//! - [`AddressLookup`]: Ask an external service for this host's address
//! - [`DnsProvider`]: Read and replace DNS records via provider APIs

pub mod address_lookup;
pub mod dns_provider;

pub use address_lookup::AddressLookup;
pub use dns_provider::{
    DnsProvider, DnsProviderFactory, DnsRecord, ProviderMessage, ProviderResponse,
    RecordUpdateRequest,
};
