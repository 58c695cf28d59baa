//! Usage counters surfaced by [`crate::transaction_manager::TransactionManager`]
//! (spec §6 "system metrics", supplemented per SPEC_FULL.md §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DagStatistics {
    pub transactions_added: u64,
    pub transactions_rejected: u64,
    pub nfa_explosions_detected: u64,
    pub simplex_feasible: u64,
    pub simplex_infeasible: u64,
    pub warm_starts_used: u64,
    pub cold_starts_used: u64,
    pub cross_validations_performed: u64,
    total_enumeration_time_ms: u64,
    total_simplex_solve_time_ms: u64,
}

impl DagStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_enumeration(&mut self, elapsed_ms: u64) {
        self.total_enumeration_time_ms += elapsed_ms;
    }

    pub fn record_simplex_solve(&mut self, elapsed_ms: u64) {
        self.total_simplex_solve_time_ms += elapsed_ms;
    }

    pub fn avg_enumeration_time_ms(&self) -> f64 {
        Self::average(self.total_enumeration_time_ms, self.transactions_added + self.transactions_rejected)
    }

    pub fn avg_simplex_solve_time_ms(&self) -> f64 {
        Self::average(self.total_simplex_solve_time_ms, self.simplex_feasible + self.simplex_infeasible)
    }

    fn average(total: u64, count: u64) -> f64 {
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }
}

/// Taxonomy-level usage counters (SPEC_FULL.md §3 "system metrics"),
/// complementing `DagStatistics` with figures about the historized
/// account mapping rather than the validation pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyMetrics {
    pub total_accounts: usize,
    pub total_snapshots: usize,
    pub history_depth: usize,
    pub frozen_snapshot_count: usize,
}
