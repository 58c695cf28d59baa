//! Core validation engine: a historized account taxonomy, an anchored
//! weighted NFA classifier, reverse path enumeration over a minimal DAG,
//! linear program construction and a triple-validated Simplex solver,
//! wired together by a transaction validation pipeline.

pub mod character_set;
pub mod config;
pub mod dag;
pub mod error;
pub mod lp;
pub mod nfa;
pub mod path_enum;
pub mod pipeline;
pub mod simplex;
pub mod stats;
pub mod taxonomy;
pub mod transaction;
pub mod transaction_manager;

pub use config::{ValidationConfig, ValidationMode};
pub use error::{
    CharacterSetError, LpError, NfaError, PathEnumerationError, PipelineError, SimplexError, TaxonomyError,
};
pub use pipeline::{ValidationOutcome, ValidationPipeline};
pub use stats::{DagStatistics, TaxonomyMetrics};
pub use taxonomy::{AccountId, AccountTaxonomy};
pub use transaction::{Transaction, TransactionMeasure, TransactionRole};
pub use transaction_manager::TransactionManager;
