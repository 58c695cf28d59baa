//! Ergonomic layer over [`crate::pipeline::ValidationPipeline`]: owns the
//! transaction counter, exposes account-registration helpers, and
//! enforces the conservative freeze policy (spec §4.8, supplemented per
//! SPEC_FULL.md §3).

use crate::config::ValidationConfig;
use crate::error::{PipelineError, TaxonomyError};
use crate::pipeline::{ValidationOutcome, ValidationPipeline};
use crate::simplex::Pivot;
use crate::stats::{DagStatistics, TaxonomyMetrics};
use crate::taxonomy::AccountId;
use crate::transaction::Transaction;
use log::info;
use std::collections::{BTreeMap, BTreeSet};

/// Thin wrapper that advances an internal transaction counter and keeps
/// the last feasible pivot per transaction id around for warm-starting
/// the next structurally identical request.
pub struct TransactionManager {
    pipeline: ValidationPipeline,
    next_taxonomy_tx_num: i64,
    last_pivots: BTreeMap<String, Pivot>,
    /// Every snapshot's `transaction_num` already present in history at
    /// construction time. The conservative freeze policy (SPEC_FULL.md
    /// §3, mirroring `_identify_frozen_snapshots`) treats these, plus
    /// anything committed since, as immutable through this outer API —
    /// direct callers of [`crate::taxonomy::AccountTaxonomy::update`]
    /// only enforce monotonicity, not immutability of the past.
    history_at_construction: BTreeSet<i64>,
}

impl TransactionManager {
    pub fn new(config: ValidationConfig) -> Self {
        let pipeline = ValidationPipeline::new(config);
        let history_at_construction = pipeline.taxonomy.history().iter().map(|s| s.transaction_num).collect();
        Self {
            pipeline,
            next_taxonomy_tx_num: 0,
            last_pivots: BTreeMap::new(),
            history_at_construction,
        }
    }

    pub fn stats(&self) -> &DagStatistics {
        &self.pipeline.stats
    }

    /// Taxonomy history length at commit time (spec §4.7 step 5d),
    /// passed straight through from the underlying pipeline.
    pub fn nfa_version(&self) -> usize {
        self.pipeline.nfa_version()
    }

    /// The transaction_num a transaction submitted right now would be
    /// validated against — the taxonomy's most recently configured
    /// snapshot, or none if no accounts have been registered yet.
    pub fn current_transaction_num(&self) -> Option<i64> {
        self.pipeline.taxonomy.last_transaction_num()
    }

    /// The `transaction_num` [`Self::update_taxonomy_explicit`] should
    /// target to stay monotonic with whatever has already committed.
    pub fn next_explicit_tx_num(&self) -> i64 {
        self.current_transaction_num().map(|n| n + 1).unwrap_or(0)
    }

    fn is_frozen(&self, tx_num: i64) -> bool {
        self.history_at_construction.contains(&tx_num)
            || self.pipeline.taxonomy.history().iter().any(|s| s.transaction_num == tx_num)
    }

    /// Registers accounts, auto-assigning characters for any that don't
    /// already request one, at the next taxonomy counter value.
    pub fn add_accounts_auto(
        &mut self,
        accounts: impl IntoIterator<Item = AccountId>,
    ) -> Result<BTreeMap<AccountId, char>, TaxonomyError> {
        let requested = accounts.into_iter().map(|a| (a, None)).collect();
        let tx_num = self.next_taxonomy_tx_num;
        if self.is_frozen(tx_num) {
            return Err(TaxonomyError::FrozenSnapshot(tx_num));
        }
        self.next_taxonomy_tx_num += 1;
        let result = self.pipeline.taxonomy.update(requested, tx_num)?;
        info!("transaction_manager: registered {} account(s) at tx {tx_num}", result.len());
        Ok(result)
    }

    /// Registers accounts with explicitly requested characters (e.g. one
    /// sector's allocation) at the caller-supplied `tx_num` (spec §4.8:
    /// passthrough, rejecting a request against a frozen snapshot).
    pub fn update_taxonomy_explicit(
        &mut self,
        requested: BTreeMap<AccountId, Option<char>>,
        tx_num: i64,
    ) -> Result<BTreeMap<AccountId, char>, TaxonomyError> {
        if self.is_frozen(tx_num) {
            return Err(TaxonomyError::FrozenSnapshot(tx_num));
        }
        let result = self.pipeline.taxonomy.update(requested, tx_num)?;
        self.next_taxonomy_tx_num = self.next_taxonomy_tx_num.max(tx_num + 1);
        Ok(result)
    }

    pub fn get_current_mapping(&self, account: &str) -> Option<char> {
        let at = self.current_transaction_num()?;
        self.pipeline.taxonomy.get(account, at)
    }

    /// Submits a transaction against the taxonomy's current snapshot.
    /// Transactions never advance the taxonomy counter themselves — only
    /// [`Self::add_accounts_auto`] and [`Self::update_taxonomy_explicit`]
    /// do — so a rejected transaction leaves everything untouched (spec
    /// §4.7, §4.8). The pipeline builds its own NFAs from the
    /// transaction's measures; callers never supply one.
    pub fn add_transaction(&mut self, transaction: &Transaction) -> Result<ValidationOutcome, PipelineError> {
        let tx_num = self
            .current_transaction_num()
            .ok_or(PipelineError::TaxonomyNotConfigured(0))?;
        let warm_start = self.last_pivots.get(&transaction.id).cloned();
        let outcome = self.pipeline.validate_transaction(transaction, tx_num, warm_start.as_ref())?;

        if let ValidationOutcome::Committed(solution) = &outcome {
            self.last_pivots.insert(transaction.id.clone(), solution.variables.clone());
        }
        Ok(outcome)
    }

    /// Diagnostic sweep over the whole taxonomy history (spec §4.2,
    /// §7); does not touch the DAG.
    pub fn validate_integrity(&self) -> Vec<TaxonomyError> {
        self.pipeline.taxonomy.validate_consistency()
    }

    /// Taxonomy-level usage statistics (SPEC_FULL.md §3), complementing
    /// [`Self::stats`]'s pipeline counters.
    pub fn metrics(&self) -> TaxonomyMetrics {
        let history = self.pipeline.taxonomy.history();
        let total_accounts = history.iter().flat_map(|s| s.mappings.keys()).collect::<BTreeSet<_>>().len();
        let total_snapshots = history.len();
        let history_depth = history.iter().map(|s| s.mappings.len()).sum();
        let frozen_snapshot_count = history.iter().filter(|s| self.is_frozen(s.transaction_num)).count();
        TaxonomyMetrics {
            total_accounts,
            total_snapshots,
            history_depth,
            frozen_snapshot_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionMeasure;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn auto_registration_assigns_distinct_characters() {
        let mut mgr = TransactionManager::new(ValidationConfig::default());
        let mapping = mgr
            .add_accounts_auto(["alice".to_string(), "bob".to_string()])
            .unwrap();
        assert_eq!(mapping.len(), 2);
        assert_ne!(mapping["alice"], mapping["bob"]);
    }

    #[test]
    fn rejected_transaction_does_not_consume_counter() {
        let mut mgr = TransactionManager::new(ValidationConfig::default());
        mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();
        let before = mgr.current_transaction_num();

        let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("1")).with_target_measure(
            TransactionMeasure::new("agriculture", "bob", ".*.*", d("0")).with_required_value(d("999")),
        );

        let outcome = mgr.add_transaction(&tx).unwrap();
        assert!(matches!(outcome, ValidationOutcome::Rejected(_)));
        assert_eq!(mgr.current_transaction_num(), before);
    }

    #[test]
    fn validate_integrity_is_clean_after_well_formed_registration() {
        let mut mgr = TransactionManager::new(ValidationConfig::default());
        mgr.add_accounts_auto(["alice".to_string()]).unwrap();
        mgr.add_accounts_auto(["bob".to_string()]).unwrap();
        assert!(mgr.validate_integrity().is_empty());
    }

    #[test]
    fn explicit_update_against_a_committed_snapshot_is_rejected_as_frozen() {
        let mut mgr = TransactionManager::new(ValidationConfig::default());
        mgr.add_accounts_auto(["alice".to_string()]).unwrap();

        let err = mgr
            .update_taxonomy_explicit([("bob".to_string(), Some('B'))].into_iter().collect(), 0)
            .unwrap_err();
        assert_eq!(err, TaxonomyError::FrozenSnapshot(0));
    }

    #[test]
    fn metrics_reflect_registered_accounts_and_frozen_snapshots() {
        let mut mgr = TransactionManager::new(ValidationConfig::default());
        mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();

        let metrics = mgr.metrics();
        assert_eq!(metrics.total_accounts, 2);
        assert_eq!(metrics.total_snapshots, 1);
        assert_eq!(metrics.frozen_snapshot_count, 1);
    }
}
