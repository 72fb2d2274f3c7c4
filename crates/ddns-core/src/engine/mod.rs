//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Resolving every record's address once per cycle
//! - Fanning that address out to the record's update targets
//! - Isolating failures so one bad record or target never stops the rest
//! - Repeating the cycle on a schedule, waking early on request
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//!                 │  Scheduler   │◄── interrupt(RunNow | Shutdown)
//!                 └──────────────┘
//!                         │ sleep / wake
//!                         ▼
//!                 ┌──────────────┐      ┌───────────────┐
//!                 │  DdnsEngine  │─────►│ AddressLookup │ (cached per cycle)
//!                 └──────────────┘      └───────────────┘
//!                         │
//!         ┌───────────────┼───────────────┐
//!         ▼               ▼               ▼
//! ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//! │ UpdateTarget│ │ UpdateTarget│ │ UpdateTarget│  (sequential)
//! └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Create a fresh `RunContext`
//! 2. For each record with targets, resolve its address
//! 3. On failure, mark the record's targets skipped and move on
//! 4. Otherwise run a `RecordUpdateTask` per target and log its outcome
//! 5. Sleep until the next cycle, or stop in single-run mode

mod update;

pub use update::{RecordUpdateTask, UpdateResult, update_comment};

use crate::address::Address;
use crate::config::DdnsConfig;
use crate::context::{RunContext, RunId};
use crate::error::{Error, Result};
use crate::graph::{RecordGraph, RecordNode};
use crate::record::UpdateTarget;
use crate::scheduler::{Scheduler, SleepError};
use crate::source::AddressSource;
use crate::traits::{AddressLookup, DnsProviderFactory, DnsRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Payload delivered to the run loop through [`Scheduler::interrupt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// Start the next cycle now
    RunNow,
    /// Stop after the current cycle
    Shutdown,
}

/// Engine settings taken from the global configuration
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Identity stamped into record comments
    pub server_name: String,
    /// Time between cycles; `None` runs a single cycle
    pub update_interval: Option<Duration>,
    /// Write records even when they already match
    pub force_update: bool,
}

impl EngineOptions {
    pub fn from_config(config: &DdnsConfig) -> Result<Self> {
        Ok(Self {
            server_name: config.server_name.clone(),
            update_interval: config.update_interval()?,
            force_update: config.global.force_update,
        })
    }
}

/// Outcome of one update target in one cycle
#[derive(Debug)]
pub enum Outcome {
    Success(DnsRecord),
    Skipped(String),
    Failed(Error),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

#[derive(Debug)]
pub struct TargetReport {
    pub record: String,
    pub target: String,
    pub outcome: Outcome,
}

/// Everything that happened in one cycle, in execution order
#[derive(Debug)]
pub struct CycleReport {
    pub run_id: RunId,
    pub targets: Vec<TargetReport>,
}

impl CycleReport {
    fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            targets: Vec::new(),
        }
    }

    fn push(&mut self, record: &str, target: &str, outcome: Outcome) {
        self.targets.push(TargetReport {
            record: record.to_string(),
            target: target.to_string(),
            outcome,
        });
    }

    /// Outcome of the target named `target`
    pub fn outcome(&self, target: &str) -> Option<&Outcome> {
        self.targets
            .iter()
            .find(|report| report.target == target)
            .map(|report| &report.outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.targets.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.targets.iter().filter(|r| r.outcome.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.targets.iter().filter(|r| r.outcome.is_failed()).count()
    }
}

/// Core DDNS engine
pub struct DdnsEngine {
    graph: RecordGraph,
    lookup: Arc<dyn AddressLookup>,
    options: EngineOptions,
}

impl DdnsEngine {
    pub fn new(graph: RecordGraph, lookup: Arc<dyn AddressLookup>, options: EngineOptions) -> Self {
        Self {
            graph,
            lookup,
            options,
        }
    }

    /// Build the record graph from `config` and wire it to `lookup`
    pub fn from_config(
        config: &DdnsConfig,
        factory: &dyn DnsProviderFactory,
        lookup: Arc<dyn AddressLookup>,
    ) -> Result<Self> {
        let graph = config.build(factory)?;
        let options = EngineOptions::from_config(config)?;
        info!(
            "Loaded {} record(s) feeding {} endpoint(s)",
            graph.records().len(),
            graph.target_count()
        );
        Ok(Self::new(graph, lookup, options))
    }

    pub fn graph(&self) -> &RecordGraph {
        &self.graph
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run one reconciliation cycle
    ///
    /// Never fails as a whole: every error is captured in the report.
    pub async fn run_cycle(&self, ctx: &mut RunContext) -> CycleReport {
        info!("===> starting a new run");
        info!(" ==> pending records:");
        for node in self.graph.records() {
            info!("  * {}", node.name());
            for target in node.targets() {
                info!("    - {}", target.name());
            }
        }

        let mut report = CycleReport::new(ctx.run_id());
        for node in self.graph.records() {
            if node.targets().is_empty() {
                debug!("record {} has no endpoints, skipping", node.name());
                continue;
            }
            self.run_record(node, ctx, &mut report).await;
        }

        info!(" ==> done this run");
        report
    }

    async fn run_record(&self, node: &RecordNode, ctx: &mut RunContext, report: &mut CycleReport) {
        info!(" ==> updating for record: {}", node.name());

        let source = AddressSource::for_record(node.spec(), Arc::clone(&self.lookup));
        let address = match source.resolve(ctx).await {
            Ok(address) => address,
            Err(e) => {
                error!("failed to get address for record {}: {}", node.name(), e);
                for target in node.targets() {
                    report.push(
                        node.name(),
                        target.name(),
                        Outcome::Skipped(format!("address resolution failed: {e}")),
                    );
                }
                return;
            }
        };
        info!("address for record {}: {}", node.name(), address);

        for target in node.targets() {
            info!(" :: updating endpoint: {}", target.name());
            let outcome = self.update_target(target, address).await;
            log_outcome(target, &outcome);
            report.push(node.name(), target.name(), outcome);
        }
    }

    async fn update_target(&self, target: &UpdateTarget, address: Address) -> Outcome {
        let task = RecordUpdateTask::new(target, address, &self.options.server_name)
            .force(self.options.force_update);

        match task.execute().await {
            Ok(UpdateResult::Updated(record)) => Outcome::Success(record),
            Ok(UpdateResult::Unchanged(_)) => {
                Outcome::Skipped("record already up to date".to_string())
            }
            Ok(UpdateResult::Rejected(errors)) => Outcome::Failed(Error::ProviderRejected {
                provider: target.provider().provider_name().to_string(),
                errors,
            }),
            Err(e) => Outcome::Failed(e),
        }
    }

    /// Run cycles until shutdown
    ///
    /// Each cycle runs in its own task so that a panic inside it is logged
    /// and the loop carries on with the next cycle.
    pub async fn run(self: Arc<Self>, scheduler: Scheduler<WakeReason>) -> anyhow::Result<()> {
        loop {
            let mut ctx = RunContext::new();
            let span = info_span!("run", run_id = %ctx.run_id());
            let engine = Arc::clone(&self);
            let cycle = tokio::spawn(
                async move { engine.run_cycle(&mut ctx).await }.instrument(span),
            );

            match cycle.await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    "cycle finished: {} updated, {} skipped, {} failed",
                    report.succeeded(),
                    report.skipped(),
                    report.failed()
                ),
                Err(e) => error!("cycle aborted unexpectedly: {}", e),
            }

            let Some(interval) = self.options.update_interval else {
                info!("single run finished, exiting");
                return Ok(());
            };

            if let Some(next) = chrono::TimeDelta::from_std(interval)
                .ok()
                .and_then(|delta| chrono::Local::now().checked_add_signed(delta))
            {
                info!("next run will start at {}", next.format("%Y-%m-%d %H:%M:%S"));
            }

            match scheduler.sleep(interval).await {
                Ok(()) => {}
                Err(SleepError::Interrupted(WakeReason::RunNow)) => {
                    info!("run requested, starting immediately");
                }
                Err(SleepError::Interrupted(WakeReason::Shutdown)) => {
                    info!("shutdown requested, stopping");
                    return Ok(());
                }
                Err(SleepError::AlreadySleeping) => {
                    anyhow::bail!("task '{}' is already sleeping", scheduler.name());
                }
            }
        }
    }
}

fn log_outcome(target: &UpdateTarget, outcome: &Outcome) {
    match outcome {
        Outcome::Success(record) => info!(
            "endpoint {} updated: {} {} {} (ttl {}, proxied {})",
            target.name(),
            record.name,
            record.record_type,
            record.content,
            record.ttl,
            record.proxied
        ),
        Outcome::Skipped(reason) => info!("endpoint {} skipped: {}", target.name(), reason),
        Outcome::Failed(e @ Error::UnexpectedNameChange { .. }) => {
            warn!("endpoint {} not updated: {}", target.name(), e)
        }
        Outcome::Failed(e) => error!("endpoint {} failed: {}", target.name(), e),
    }
}
