//! End-to-end scenarios exercising the full validation pipeline through
//! [`TransactionManager`] (spec §8).

use icgs_core::character_set::CharacterSetManager;
use icgs_core::config::ValidationConfig;
use icgs_core::transaction::{Transaction, TransactionMeasure};
use icgs_core::{PipelineError, TaxonomyError, TransactionManager, ValidationOutcome};
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn simple_transaction_commits_and_updates_statistics() {
    let mut mgr = TransactionManager::new(ValidationConfig::default());
    mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();
    let alice_char = mgr.get_current_mapping("alice").unwrap();

    let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("100")).with_source_measure(
        TransactionMeasure::new("agriculture", "alice", format!(".*{alice_char}.*"), d("1.0"))
            .with_acceptable_value(d("100")),
    );

    let outcome = mgr.add_transaction(&tx).unwrap();
    assert!(matches!(outcome, ValidationOutcome::Committed(_)));
    assert_eq!(mgr.stats().transactions_added, 1);
    assert_eq!(mgr.stats().simplex_feasible, 1);
}

#[test]
fn multiple_agents_in_one_sector_share_a_character_class() {
    let mut char_sets = CharacterSetManager::new();
    char_sets.define_set("INDUSTRY", vec!['I', 'J', 'K', 'L']).unwrap();
    let industry_pattern = char_sets.pattern_for("INDUSTRY").unwrap().to_string();
    let producer_a = char_sets.allocate("INDUSTRY").unwrap();
    let producer_b = char_sets.allocate("INDUSTRY").unwrap();
    assert_ne!(producer_a, producer_b);
    char_sets.freeze();

    let mut mgr = TransactionManager::new(ValidationConfig::default());
    let tx_num = mgr.next_explicit_tx_num();
    mgr.update_taxonomy_explicit(
        [
            ("producer_a".to_string(), Some(producer_a)),
            ("producer_b".to_string(), Some(producer_b)),
            ("buyer".to_string(), Some('Z')),
        ]
        .into_iter()
        .collect(),
        tx_num,
    )
    .unwrap();

    // Both producers reach the same classified state because the
    // character-class pattern, not the individual letter, drives the
    // per-transaction NFA the pipeline builds from each measure.
    for producer in ["producer_a", "producer_b"] {
        let tx = Transaction::new(format!("tx_{producer}"), producer.to_string(), "buyer".to_string(), d("1"))
            .with_source_measure(
                TransactionMeasure::new("industry", producer, industry_pattern.clone(), d("1.0"))
                    .with_acceptable_value(d("1000")),
            );
        let outcome = mgr.add_transaction(&tx).unwrap();
        assert!(matches!(outcome, ValidationOutcome::Committed(_)));
    }
    assert_eq!(mgr.stats().transactions_added, 2);
}

#[test]
fn nfa_explosion_rejects_before_enumeration() {
    let mut config = ValidationConfig::default();
    config.nfa_explosion_threshold = 2;
    let mut mgr = TransactionManager::new(config);
    mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();

    let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("1"))
        .with_source_measure(TransactionMeasure::new("m1", "alice", ".*A.*", d("1.0")))
        .with_source_measure(TransactionMeasure::new("m2", "alice", ".*B.*", d("1.0")))
        .with_source_measure(TransactionMeasure::new("m3", "alice", ".*C.*", d("1.0")));

    let outcome = mgr.add_transaction(&tx).unwrap();
    assert!(matches!(outcome, ValidationOutcome::Rejected(_)));
    assert_eq!(mgr.stats().nfa_explosions_detected, 1);
    assert_eq!(mgr.stats().transactions_added, 0);
}

#[test]
fn conflicting_bounds_on_the_same_measure_are_reported_infeasible() {
    let mut mgr = TransactionManager::new(ValidationConfig::default());
    mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();
    let alice_char = mgr.get_current_mapping("alice").unwrap();
    let pattern = format!(".*{alice_char}.*");

    // Both constraints bind the same classified-state variable: an
    // upper bound of 10 can never satisfy a lower bound of 1000000.
    let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("1"))
        .with_source_measure(
            TransactionMeasure::new("agriculture", "alice", pattern.clone(), d("1.0")).with_acceptable_value(d("10")),
        )
        .with_target_measure(
            TransactionMeasure::new("agriculture", "alice", pattern, d("1.0")).with_required_value(d("1000000")),
        );

    let outcome = mgr.add_transaction(&tx).unwrap();
    assert!(matches!(outcome, ValidationOutcome::Rejected(_)));
    assert_eq!(mgr.stats().simplex_infeasible, 1);
}

#[test]
fn resubmitting_an_identical_transaction_reuses_the_warm_start() {
    let mut mgr = TransactionManager::new(ValidationConfig::default());
    mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();
    let alice_char = mgr.get_current_mapping("alice").unwrap();

    let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("1")).with_source_measure(
        TransactionMeasure::new("agriculture", "alice", format!(".*{alice_char}.*"), d("1.0"))
            .with_acceptable_value(d("100")),
    );

    let first = mgr.add_transaction(&tx).unwrap();
    assert!(matches!(first, ValidationOutcome::Committed(_)));
    assert_eq!(mgr.stats().cold_starts_used, 1);

    let second = mgr.add_transaction(&tx).unwrap();
    assert!(matches!(second, ValidationOutcome::Committed(_)));
    assert_eq!(mgr.stats().warm_starts_used, 1);
}

#[test]
fn past_snapshots_stay_frozen_after_later_registrations() {
    let mut mgr = TransactionManager::new(ValidationConfig::default());
    mgr.add_accounts_auto(["alice".to_string()]).unwrap();
    let alice_char_at_first = mgr.get_current_mapping("alice").unwrap();

    mgr.add_accounts_auto(["bob".to_string()]).unwrap();
    // alice's long-past mapping is untouched by bob's later registration.
    assert_eq!(mgr.get_current_mapping("alice"), Some(alice_char_at_first));
    assert!(mgr.validate_integrity().is_empty());
}

#[test]
fn frozen_snapshot_protection_rejects_explicit_update_against_a_committed_snapshot() {
    let mut mgr = TransactionManager::new(ValidationConfig::default());
    mgr.add_accounts_auto(["alice".to_string(), "bob".to_string()]).unwrap();
    let alice_char = mgr.get_current_mapping("alice").unwrap();

    let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("100")).with_source_measure(
        TransactionMeasure::new("agriculture", "alice", format!(".*{alice_char}.*"), d("1.0"))
            .with_acceptable_value(d("100")),
    );
    let outcome = mgr.add_transaction(&tx).unwrap();
    assert!(matches!(outcome, ValidationOutcome::Committed(_)));

    let committed_tx_num = mgr.current_transaction_num().unwrap();
    let err = mgr
        .update_taxonomy_explicit([("carol".to_string(), Some('Z'))].into_iter().collect(), committed_tx_num)
        .unwrap_err();
    assert_eq!(err, TaxonomyError::FrozenSnapshot(committed_tx_num));
}

#[test]
fn transaction_before_any_account_registration_is_rejected_as_unconfigured() {
    let mut mgr = TransactionManager::new(ValidationConfig::default());
    let tx = Transaction::new("tx1", "alice".to_string(), "bob".to_string(), d("1"));
    let err = mgr.add_transaction(&tx).unwrap_err();
    assert!(matches!(err, PipelineError::TaxonomyNotConfigured(_)));
}
