//! Record to target association
//!
//! Each record is resolved once per cycle and its address fanned out to
//! every target that consumes it. Association is by identity: a target
//! belongs to a named record only when it holds that record's `Arc`. A
//! target whose record is not one of the named records gets a synthesized
//! single-target record of its own.

use crate::record::{RecordSpec, UpdateTarget};
use std::sync::Arc;

/// A record together with the targets it feeds
#[derive(Debug, Clone)]
pub struct RecordNode {
    name: String,
    spec: Arc<RecordSpec>,
    targets: Vec<UpdateTarget>,
}

impl RecordNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &RecordSpec {
        &self.spec
    }

    pub fn targets(&self) -> &[UpdateTarget] {
        &self.targets
    }
}

/// Ordered record nodes; named records first, then synthesized ones
#[derive(Debug, Clone, Default)]
pub struct RecordGraph {
    records: Vec<RecordNode>,
}

impl RecordGraph {
    /// Associate `targets` with `named` records
    pub fn build(
        named: impl IntoIterator<Item = (String, Arc<RecordSpec>)>,
        targets: impl IntoIterator<Item = UpdateTarget>,
    ) -> Self {
        let mut records: Vec<RecordNode> = named
            .into_iter()
            .map(|(name, spec)| RecordNode {
                name,
                spec,
                targets: Vec::new(),
            })
            .collect();

        for target in targets {
            match records
                .iter_mut()
                .find(|node| Arc::ptr_eq(&node.spec, target.record()))
            {
                Some(node) => node.targets.push(target),
                None => records.push(RecordNode {
                    name: format!("(rec-for_{})", target.name()),
                    spec: Arc::clone(target.record()),
                    targets: vec![target],
                }),
            }
        }

        Self { records }
    }

    pub fn records(&self) -> &[RecordNode] {
        &self.records
    }

    pub fn find(&self, name: &str) -> Option<&RecordNode> {
        self.records.iter().find(|node| node.name == name)
    }

    /// Total number of update targets across all records
    pub fn target_count(&self) -> usize {
        self.records.iter().map(|node| node.targets.len()).sum()
    }
}
