//! Statistics snapshot served to clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Running totals plus the latest report of every aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticSnapshot {
    pub total_jobs: u64,
    pub total_failed_jobs: u64,
    pub total_success_jobs: u64,
    /// Aggregator reports, ordered by aggregator id.
    pub patterns: Vec<Map<String, Value>>,
}

/// Mutable counterpart of [`StatisticSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct StatisticTotals {
    pub total_jobs: u64,
    pub total_failed_jobs: u64,
    pub total_success_jobs: u64,
    patterns: BTreeMap<String, Map<String, Value>>,
}

impl StatisticTotals {
    /// Replace the report of one aggregator.
    pub fn set_pattern(&mut self, id: impl Into<String>, report: Map<String, Value>) {
        self.patterns.insert(id.into(), report);
    }

    pub fn snapshot(&self) -> StatisticSnapshot {
        StatisticSnapshot {
            total_jobs: self.total_jobs,
            total_failed_jobs: self.total_failed_jobs,
            total_success_jobs: self.total_success_jobs,
            patterns: self.patterns.values().cloned().collect(),
        }
    }
}
