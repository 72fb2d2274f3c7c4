//! Test doubles and common utilities for reconciliation contract tests
//!
//! These doubles stand in for the remote DNS provider and the public
//! address lookup service, and count every call they receive.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::AccountConfig;
use ddns_core::error::Result;
use ddns_core::traits::{
    AddressLookup, DnsProvider, DnsProviderFactory, DnsRecord, ProviderMessage, ProviderResponse,
    RecordUpdateRequest,
};
use ddns_core::{Address, AddressFamily, Error};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory provider keyed by record id
pub struct MockDnsProvider {
    records: Mutex<HashMap<String, DnsRecord>>,
    rejected_puts: Mutex<HashMap<String, Vec<ProviderMessage>>>,
    unreachable: Mutex<HashSet<String>>,
    get_call_count: AtomicUsize,
    puts: Mutex<Vec<(String, RecordUpdateRequest)>>,
}

impl MockDnsProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(HashMap::new()),
            rejected_puts: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(HashSet::new()),
            get_call_count: AtomicUsize::new(0),
            puts: Mutex::new(Vec::new()),
        })
    }

    /// Seed a remote AAAA record
    pub fn with_record(self: Arc<Self>, record_id: &str, name: &str, content: &str) -> Arc<Self> {
        self.records
            .lock()
            .unwrap()
            .insert(record_id.to_string(), remote_record(record_id, name, content));
        self
    }

    /// Answer every PUT on `record_id` with `success: false`
    pub fn rejecting_put(self: Arc<Self>, record_id: &str, errors: Vec<ProviderMessage>) -> Arc<Self> {
        self.rejected_puts
            .lock()
            .unwrap()
            .insert(record_id.to_string(), errors);
        self
    }

    /// Fail every request on `record_id` at the transport level
    pub fn unreachable_for(self: Arc<Self>, record_id: &str) -> Arc<Self> {
        self.unreachable
            .lock()
            .unwrap()
            .insert(record_id.to_string());
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }

    pub fn put_call_count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }

    /// Record ids written, in order
    pub fn put_record_ids(&self) -> Vec<String> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn last_put(&self, record_id: &str) -> Option<RecordUpdateRequest> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| id == record_id)
            .map(|(_, request)| request.clone())
    }

    pub fn remote(&self, record_id: &str) -> Option<DnsRecord> {
        self.records.lock().unwrap().get(record_id).cloned()
    }

    fn check_reachable(&self, record_id: &str) -> Result<()> {
        if self.unreachable.lock().unwrap().contains(record_id) {
            return Err(Error::http("connection refused"));
        }
        Ok(())
    }
}

pub fn remote_record(record_id: &str, name: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: record_id.to_string(),
        name: name.to_string(),
        record_type: "AAAA".to_string(),
        content: content.to_string(),
        proxied: false,
        ttl: 60,
        comment: None,
        zone_name: Some("example.com".to_string()),
    }
}

fn not_found() -> Vec<ProviderMessage> {
    vec![ProviderMessage::new(81044, "Record does not exist.")]
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn get_record(&self, _zone_id: &str, record_id: &str) -> Result<ProviderResponse<DnsRecord>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(record_id)?;
        Ok(match self.records.lock().unwrap().get(record_id) {
            Some(record) => ProviderResponse::Success(record.clone()),
            None => ProviderResponse::Failure(not_found()),
        })
    }

    async fn put_record(
        &self,
        _zone_id: &str,
        record_id: &str,
        request: &RecordUpdateRequest,
    ) -> Result<ProviderResponse<DnsRecord>> {
        self.check_reachable(record_id)?;
        self.puts
            .lock()
            .unwrap()
            .push((record_id.to_string(), request.clone()));

        if let Some(errors) = self.rejected_puts.lock().unwrap().get(record_id) {
            return Ok(ProviderResponse::Failure(errors.clone()));
        }

        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(record_id) else {
            return Ok(ProviderResponse::Failure(not_found()));
        };
        record.name = request.name.clone();
        record.record_type = request.record_type.clone();
        record.content = request.content.clone();
        record.proxied = request.proxied;
        record.ttl = request.ttl;
        record.comment = Some(request.comment.clone());
        Ok(ProviderResponse::Success(record.clone()))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Factory handing out one shared mock provider for every account
pub struct MockProviderFactory {
    pub provider: Arc<MockDnsProvider>,
    create_call_count: AtomicUsize,
}

impl MockProviderFactory {
    pub fn new(provider: Arc<MockDnsProvider>) -> Self {
        Self {
            provider,
            create_call_count: AtomicUsize::new(0),
        }
    }

    pub fn create_call_count(&self) -> usize {
        self.create_call_count.load(Ordering::SeqCst)
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, account: &AccountConfig) -> Result<Arc<dyn DnsProvider>> {
        account.validate()?;
        self.create_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.provider.clone())
    }
}

/// Lookup service with fixed answers per family
pub struct CountingLookup {
    answers: Mutex<HashMap<AddressFamily, Address>>,
    call_count: AtomicUsize,
}

impl CountingLookup {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(HashMap::new()),
            call_count: AtomicUsize::new(0),
        })
    }

    pub fn answering(self: Arc<Self>, address: &str) -> Arc<Self> {
        self.set(address);
        self
    }

    /// Change the answer for the address's family
    pub fn set(&self, address: &str) {
        let address: Address = address.parse().unwrap();
        self.answers
            .lock()
            .unwrap()
            .insert(address.family(), address);
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressLookup for CountingLookup {
    async fn lookup(&self, family: AddressFamily) -> Result<Address> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .get(&family)
            .copied()
            .ok_or_else(|| Error::address_lookup("counting", format!("no {family} answer")))
    }

    fn name(&self) -> &str {
        "counting"
    }
}
