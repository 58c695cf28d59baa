//! Orchestrates one transaction through precondition checks, NFA
//! explosion detection, reverse path enumeration, LP construction and
//! triple-validated Simplex, committing the DAG edge only once every
//! step has passed (spec §4.7).

use crate::config::ValidationConfig;
use crate::dag::{Dag, Edge};
use crate::error::{NfaError, PipelineError};
use crate::lp::build_linear_program;
use crate::nfa::AnchoredWeightedNFA;
use crate::path_enum::PathEnumerator;
use crate::simplex::{Pivot, Solution, SolutionStatus, TripleValidatedSimplex};
use crate::stats::DagStatistics;
use crate::taxonomy::AccountTaxonomy;
use crate::transaction::{Transaction, TransactionMeasure};
use log::{debug, info, warn};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    Committed(Solution),
    Rejected(String),
}

pub struct ValidationPipeline {
    pub dag: Dag,
    pub taxonomy: AccountTaxonomy,
    pub config: ValidationConfig,
    pub stats: DagStatistics,
    /// Accumulates every committed transaction's patterns permanently
    /// (spec §4.7 step 5c), so later transactions' explosion checks see
    /// the whole history rather than just their own measures.
    persistent_nfa: AnchoredWeightedNFA,
}

impl ValidationPipeline {
    pub fn new(config: ValidationConfig) -> Self {
        Self {
            dag: Dag::new(),
            taxonomy: AccountTaxonomy::new(),
            config,
            stats: DagStatistics::new(),
            persistent_nfa: AnchoredWeightedNFA::new(),
        }
    }

    /// Taxonomy history length at the moment of the call, stamped onto
    /// every commit (spec §4.7 step 5d) so callers can tell which
    /// taxonomy snapshot a given NFA state was classified against.
    pub fn nfa_version(&self) -> usize {
        self.taxonomy.history().len()
    }

    /// Runs a transaction through every validation step. Returns
    /// `Ok(ValidationOutcome::Committed(_))` only once the DAG has the
    /// new edge permanently recorded; any earlier failure leaves the
    /// DAG untouched (rejection never requires rollback because the
    /// transaction edge is never inserted speculatively — reverse path
    /// enumeration simulates it in place, see [`crate::path_enum`]).
    pub fn validate_transaction(
        &mut self,
        transaction: &Transaction,
        transaction_num: i64,
        warm_start: Option<&Pivot>,
    ) -> Result<ValidationOutcome, PipelineError> {
        info!(
            "pipeline: validating transaction {} ({} -> {})",
            transaction.id, transaction.source_account, transaction.target_account
        );

        self.check_preconditions(transaction, transaction_num)?;

        let (source_node, _source_sink) = self.dag.ensure_account(&transaction.source_account);
        let (_target_source, target_sink) = self.dag.ensure_account(&transaction.target_account);

        if let Some(reason) = self.detect_nfa_explosion(transaction)? {
            self.stats.transactions_rejected += 1;
            self.stats.nfa_explosions_detected += 1;
            warn!("pipeline: rejecting transaction {}: {reason}", transaction.id);
            return Ok(ValidationOutcome::Rejected(reason));
        }

        // Step 4a: a clean per-transaction NFA built only from this
        // transaction's own measures, not the persistent one, so
        // classification never sees unrelated history.
        let primary_nfa = build_measure_nfa(&transaction.source_measures)?;
        let secondary_nfa = if transaction.target_measures.is_empty() {
            None
        } else {
            Some(build_measure_nfa(&transaction.target_measures)?)
        };

        let enum_start = Instant::now();
        let enumerator = PathEnumerator::new(&self.dag, &self.taxonomy, transaction_num, self.config.max_path_enumeration);
        let classification = enumerator.enumerate_and_classify(source_node, target_sink, &primary_nfa, secondary_nfa.as_ref())?;
        self.stats.record_enumeration(enum_start.elapsed().as_millis() as u64);
        debug!(
            "pipeline: transaction {} classified into {} state group(s)",
            transaction.id,
            classification.len()
        );

        let state_weights = |state: crate::nfa::StateId, measure_id: &str| -> Option<rust_decimal::Decimal> {
            primary_nfa
                .state_weights_for_measure(measure_id)
                .get(&state)
                .copied()
                .or_else(|| secondary_nfa.as_ref().and_then(|nfa| nfa.state_weights_for_measure(measure_id).get(&state).copied()))
        };
        let lp = build_linear_program(transaction, &classification, &state_weights)?;

        let solver = TripleValidatedSimplex::new(&self.config);
        let solve_start = Instant::now();
        let solution = solver.solve(&lp, warm_start)?;
        self.stats.record_simplex_solve(solve_start.elapsed().as_millis() as u64);

        if solution.warm_start_successful {
            self.stats.warm_starts_used += 1;
        } else {
            self.stats.cold_starts_used += 1;
        }
        if solution.cross_validation_passed {
            self.stats.cross_validations_performed += 1;
        }

        match solution.status {
            SolutionStatus::Feasible => {
                self.stats.simplex_feasible += 1;
                self.dag.insert_edge(Edge {
                    from: source_node,
                    to: target_sink,
                });
                self.stats.transactions_added += 1;
                self.append_measures_to_persistent_nfa(transaction)?;
                info!(
                    "pipeline: committed transaction {} (nfa_version={})",
                    transaction.id,
                    self.nfa_version()
                );
                Ok(ValidationOutcome::Committed(solution))
            }
            SolutionStatus::Infeasible => {
                self.stats.simplex_infeasible += 1;
                self.stats.transactions_rejected += 1;
                warn!("pipeline: transaction {} infeasible, rejecting", transaction.id);
                Ok(ValidationOutcome::Rejected("simplex reported infeasible".to_string()))
            }
            SolutionStatus::Unbounded => {
                self.stats.transactions_rejected += 1;
                warn!("pipeline: transaction {} unbounded, rejecting", transaction.id);
                Ok(ValidationOutcome::Rejected("simplex reported unbounded".to_string()))
            }
        }
    }

    fn check_preconditions(&self, transaction: &Transaction, transaction_num: i64) -> Result<(), PipelineError> {
        let configured_through = self.taxonomy.last_transaction_num();
        if configured_through.is_none_or_less_than(transaction_num) {
            return Err(PipelineError::TaxonomyNotConfigured(transaction_num));
        }
        for account in [&transaction.source_account, &transaction.target_account] {
            if self.taxonomy.get(account, transaction_num).is_none() {
                return Err(PipelineError::Internal(format!(
                    "account {account} has no taxonomy mapping at transaction_num {transaction_num}"
                )));
            }
        }
        Ok(())
    }

    /// Step 3: clones the persistent NFA and adds this transaction's own
    /// measures on top, so the explosion check sees the full accumulated
    /// history rather than just this transaction in isolation.
    fn detect_nfa_explosion(&self, transaction: &Transaction) -> Result<Option<String>, NfaError> {
        let mut trial = self.persistent_nfa.clone();
        populate_measures(&mut trial, &transaction.source_measures)?;
        populate_measures(&mut trial, &transaction.target_measures)?;

        let total = trial.final_state_count();
        if total > self.config.nfa_explosion_threshold {
            Ok(Some(format!(
                "NFA final state count {total} exceeds configured threshold {}",
                self.config.nfa_explosion_threshold
            )))
        } else {
            Ok(None)
        }
    }

    /// Step 5c: appends this transaction's measures into the persistent
    /// NFA permanently, once it has been committed.
    fn append_measures_to_persistent_nfa(&mut self, transaction: &Transaction) -> Result<(), NfaError> {
        populate_measures(&mut self.persistent_nfa, &transaction.source_measures)?;
        populate_measures(&mut self.persistent_nfa, &transaction.target_measures)?;
        Ok(())
    }
}

/// Registers each measure's primary pattern, plus its secondary patterns
/// under synthesized `"{measure_id}_secondary_{idx}"` ids (consumed by
/// `lp::add_secondary_constraints`), into `nfa`.
fn populate_measures(nfa: &mut AnchoredWeightedNFA, measures: &[TransactionMeasure]) -> Result<(), NfaError> {
    for measure in measures {
        nfa.add_pattern(&measure.measure_id, &measure.primary_pattern, measure.primary_weight, &measure.measure_id)?;
        for (idx, (pattern, weight)) in measure.secondary_patterns.iter().enumerate() {
            let secondary_id = format!("{}_secondary_{idx}", measure.measure_id);
            nfa.add_pattern(&secondary_id, pattern, *weight, &secondary_id)?;
        }
    }
    Ok(())
}

/// Builds a fresh, frozen NFA from one side of a transaction's own
/// measures (spec §4.7 step 4a) — never mixed with the persistent NFA,
/// so classification only ever sees this transaction.
fn build_measure_nfa(measures: &[TransactionMeasure]) -> Result<AnchoredWeightedNFA, NfaError> {
    let mut nfa = AnchoredWeightedNFA::new();
    populate_measures(&mut nfa, measures)?;
    nfa.freeze();
    Ok(nfa)
}

trait LessThanCheck {
    fn is_none_or_less_than(&self, target: i64) -> bool;
}

impl LessThanCheck for Option<i64> {
    fn is_none_or_less_than(&self, target: i64) -> bool {
        match self {
            None => true,
            Some(last) => *last < target,
        }
    }
}
