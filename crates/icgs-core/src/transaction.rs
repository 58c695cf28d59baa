//! Transaction request types (spec §4.1, §4.9).

use crate::taxonomy::AccountId;
use rust_decimal::Decimal;

/// Which side of a transaction a measure constrains. Kept as an enum
/// rather than duplicated struct fields so `build_fallback_lp` can walk
/// both lists uniformly (spec §4.9: "replacing runtime-typed measures"
/// with a tagged sum type).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRole {
    Source,
    Target,
}

/// One economic measure a transaction must respect on one side of the
/// exchange, plus whatever secondary ("no free lunch") patterns apply
/// (spec §3 Data Model, §6 transaction input format).
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionMeasure {
    pub measure_id: String,
    /// The account this measure is evaluated against.
    pub account_id: AccountId,
    /// Regex this measure contributes to the per-transaction NFA the
    /// pipeline builds from the transaction's own measures; auto-anchored
    /// on registration like any other NFA pattern.
    pub primary_pattern: String,
    /// Weight used both as this measure's NFA state weight and as the
    /// fallback LP's single-variable coefficient.
    pub primary_weight: Decimal,
    /// Upper bound when this measure constrains a source account.
    pub acceptable_value: Decimal,
    /// Lower bound when this measure constrains a target account.
    pub required_value: Decimal,
    /// `(pattern, weight)` pairs that must each sum to at most zero
    /// flux, used to forbid a side channel from manufacturing value.
    pub secondary_patterns: Vec<(String, Decimal)>,
}

impl TransactionMeasure {
    pub fn new(
        measure_id: impl Into<String>,
        account_id: impl Into<AccountId>,
        primary_pattern: impl Into<String>,
        primary_weight: Decimal,
    ) -> Self {
        Self {
            measure_id: measure_id.into(),
            account_id: account_id.into(),
            primary_pattern: primary_pattern.into(),
            primary_weight,
            acceptable_value: Decimal::ZERO,
            required_value: Decimal::ZERO,
            secondary_patterns: Vec::new(),
        }
    }

    pub fn with_acceptable_value(mut self, value: Decimal) -> Self {
        self.acceptable_value = value;
        self
    }

    pub fn with_required_value(mut self, value: Decimal) -> Self {
        self.required_value = value;
        self
    }

    pub fn with_secondary_pattern(mut self, pattern: impl Into<String>, weight: Decimal) -> Self {
        self.secondary_patterns.push((pattern.into(), weight));
        self
    }
}

/// A single economic transaction between two accounts, ready to be
/// enumerated, classified, and checked against an LP (spec §4).
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub source_account: AccountId,
    pub target_account: AccountId,
    /// Must be strictly positive (spec §3 Data Model).
    pub amount: Decimal,
    pub source_measures: Vec<TransactionMeasure>,
    pub target_measures: Vec<TransactionMeasure>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, source_account: AccountId, target_account: AccountId, amount: Decimal) -> Self {
        Self {
            id: id.into(),
            source_account,
            target_account,
            amount,
            source_measures: Vec::new(),
            target_measures: Vec::new(),
        }
    }

    pub fn with_source_measure(mut self, measure: TransactionMeasure) -> Self {
        self.source_measures.push(measure);
        self
    }

    pub fn with_target_measure(mut self, measure: TransactionMeasure) -> Self {
        self.target_measures.push(measure);
        self
    }
}
