//! Per-cycle run context
//!
//! A [`RunContext`] is created at the start of every reconciliation cycle and
//! dropped at its end. It carries the cycle's correlation token and the
//! addresses already looked up during the cycle, so a local address that
//! feeds both a plain record and a prefix-derived record is queried once.

use crate::address::{Address, AddressFamily};
use rand::Rng;
use std::collections::HashMap;
use std::fmt;

/// Opaque correlation token of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(u32);

impl RunId {
    /// Generate a fresh six-digit run id
    pub fn generate() -> Self {
        Self(rand::thread_rng().gen_range(100_000..1_000_000))
    }
}

impl From<u32> for RunId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State owned by exactly one reconciliation cycle
#[derive(Debug)]
pub struct RunContext {
    run_id: RunId,
    resolved: HashMap<(String, AddressFamily), Address>,
}

impl RunContext {
    /// Create a context with a freshly generated run id
    pub fn new() -> Self {
        Self::with_run_id(RunId::generate())
    }

    pub fn with_run_id(run_id: RunId) -> Self {
        Self {
            run_id,
            resolved: HashMap::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Address already obtained from `service` for `family` in this cycle
    pub fn cached(&self, service: &str, family: AddressFamily) -> Option<Address> {
        self.resolved.get(&(service.to_string(), family)).copied()
    }

    pub fn remember(&mut self, service: &str, family: AddressFamily, address: Address) {
        self.resolved.insert((service.to_string(), family), address);
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_have_six_digits() {
        for _ in 0..100 {
            let id = RunId::generate().to_string();
            assert_eq!(id.len(), 6, "{id}");
        }
    }

    #[test]
    fn cache_is_keyed_by_service_and_family() {
        let mut ctx = RunContext::with_run_id(RunId::from(123456));
        let addr: Address = "2001:db8::1".parse().unwrap();
        ctx.remember("svc", AddressFamily::V6, addr);

        assert_eq!(ctx.cached("svc", AddressFamily::V6), Some(addr));
        assert_eq!(ctx.cached("svc", AddressFamily::V4), None);
        assert_eq!(ctx.cached("other", AddressFamily::V6), None);
        assert_eq!(ctx.run_id().to_string(), "123456");
    }

    #[test]
    fn fresh_context_starts_empty() {
        let ctx = RunContext::new();
        assert_eq!(ctx.cached("svc", AddressFamily::V6), None);
    }
}
