//! Domain error types, one enum per component (spec §7).
//!
//! Every fallible core operation returns `Result<T, E>` with one of
//! these; the CLI boundary wraps them in `anyhow::Result`.

use thiserror::Error;

/// Failures raised by [`crate::character_set::CharacterSetManager`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CharacterSetError {
    #[error("unknown sector: {0}")]
    UnknownSector(String),
    #[error("sector already defined: {0}")]
    SectorExists(String),
    #[error("character {0:?} already registered to sector {1}")]
    CharacterCollision(char, String),
    #[error("sector {0} is at capacity ({1})")]
    CapacityExhausted(String, usize),
    #[error("cannot modify: character set manager is frozen")]
    FrozenModification,
    #[error("character set definition must be non-empty")]
    EmptyCharacterSet,
}

/// Failures raised by [`crate::taxonomy::AccountTaxonomy`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("non-monotonic transaction_num: {new} <= {last}")]
    NonMonotonicTransactionNum { new: i64, last: i64 },
    #[error("invalid character {0:?}: out of range [0x41, 0x10FFFF] or empty")]
    InvalidCharacter(char),
    #[error("intra-snapshot collision: character {0:?} requested for both {1} and {2}")]
    IntraSnapshotCollision(char, String, String),
    #[error("alphabet exhausted while auto-assigning a character")]
    ExhaustedAlphabet,
    #[error("account {0} has no mapping at or before transaction_num {1}")]
    UnmappedAccount(String, i64),
    #[error("node in path has no account id")]
    NodeMissingAccountId,
    #[error("cannot modify frozen snapshot at transaction_num {0}")]
    FrozenSnapshot(i64),
    #[error(transparent)]
    CharacterSet(#[from] CharacterSetError),
}

/// Failures raised by [`crate::nfa::anchored::AnchoredWeightedNFA`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NfaError {
    #[error("invalid regex pattern {0:?}: {1}")]
    InvalidRegex(String, String),
    #[error("cannot mutate: NFA is frozen")]
    FrozenModification,
    #[error("unknown state id: {0}")]
    UnknownState(usize),
    #[error("pattern {0:?} contains no character-class to expand")]
    NoCharacterClass(String),
    #[error("measure_id, regex_id and pattern must all be non-empty")]
    EmptyField,
}

/// Failures raised by [`crate::path_enum::PathEnumerator`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathEnumerationError {
    #[error("path enumeration failed to initialize: {0}")]
    NotReady(String),
    #[error("path count exceeded configured ceiling of {limit}")]
    LimitExceeded { limit: usize },
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
}

/// Failures raised by [`crate::lp`] construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LpError {
    #[error("constraint {constraint:?} references undeclared variable {var:?}")]
    UndeclaredVariable { constraint: String, var: String },
    #[error("constraint bound is not finite")]
    NonFiniteBound,
    #[error("linear program has no declared variables")]
    NoVariables,
}

/// Failures raised by [`crate::simplex::TripleValidatedSimplex`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimplexError {
    #[error(transparent)]
    Lp(#[from] LpError),
    #[error("iteration cap of {0} reached without resolving feasibility")]
    IterationCapReached(u64),
}

/// Failures raised by [`crate::pipeline::ValidationPipeline`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("taxonomy is not configured up to the current transaction counter ({0})")]
    TaxonomyNotConfigured(i64),
    #[error(transparent)]
    Taxonomy(#[from] TaxonomyError),
    #[error(transparent)]
    Nfa(#[from] NfaError),
    #[error(transparent)]
    PathEnumeration(#[from] PathEnumerationError),
    #[error(transparent)]
    Lp(#[from] LpError),
    #[error(transparent)]
    Simplex(#[from] SimplexError),
    #[error("internal invariant violated: {0}")]
    Internal(String),
}
