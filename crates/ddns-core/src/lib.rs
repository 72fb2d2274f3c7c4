// # ddns-core
//
// Core library for the prefix-deriving DDNS reconciler.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **Address**: Fixed-width addresses and the mask arithmetic that derives
//   a routable address from a locally observed prefix
// - **AddressLookup**: Trait for asking which public address this host has
// - **DnsProvider**: Trait for reading and replacing DNS records by id
// - **RecordGraph**: Association of records with the targets they feed
// - **DdnsEngine**: Runs reconciliation cycles and isolates their failures
// - **Scheduler**: Interruptible periodic task with a typed wake payload
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Per-Cycle State Only**: Nothing survives a cycle except configuration
// 3. **Failure Isolation**: One record or target never aborts another
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Records that already match are left untouched

pub mod address;
pub mod config;
pub mod context;
pub mod duration;
pub mod engine;
pub mod error;
pub mod graph;
pub mod record;
pub mod scheduler;
pub mod source;
pub mod traits;

// Re-export core types for convenience
pub use address::{Address, AddressFamily};
pub use config::{AccountConfig, DdnsConfig, LookupConfig};
pub use context::{RunContext, RunId};
pub use engine::{CycleReport, DdnsEngine, EngineOptions, Outcome, WakeReason};
pub use error::{Error, Result};
pub use graph::{RecordGraph, RecordNode};
pub use record::{ExpectedName, RecordSpec, UpdateTarget};
pub use scheduler::{Scheduler, SchedulerError, SleepError, TaskState};
pub use traits::{AddressLookup, DnsProvider, DnsProviderFactory, DnsRecord, ProviderResponse};
