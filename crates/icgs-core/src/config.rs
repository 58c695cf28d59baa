//! Validation configuration (spec §6 table).
//!
//! Passed at orchestrator construction; there is no global mutable
//! settings object anywhere in the core.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Reserved for future laxity tiers (spec §6); `Strict` is the only
/// variant currently given semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMode {
    Strict,
}

impl Default for ValidationMode {
    fn default() -> Self {
        ValidationMode::Strict
    }
}

/// Tunables for one [`crate::pipeline::ValidationPipeline`] instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Hard upper bound on paths enumerated per transaction.
    pub max_path_enumeration: usize,
    /// Iteration cap for the Simplex solve.
    pub simplex_max_iterations: u64,
    /// Absolute epsilon for feasibility and cross-validation.
    pub simplex_tolerance: Decimal,
    /// Rejects transactions whose measures would push NFA final states
    /// above this count.
    pub nfa_explosion_threshold: usize,
    /// Use the stored pivot as a warm-start candidate when present.
    pub enable_warm_start: bool,
    /// Run the independent feasibility cross-check after a cold solve.
    pub enable_cross_validation: bool,
    /// Reserved for future laxity tiers.
    pub validation_mode: ValidationMode,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_path_enumeration: 10_000,
            simplex_max_iterations: 10_000,
            simplex_tolerance: Decimal::from_str("0.0000000001").expect("valid decimal literal"),
            nfa_explosion_threshold: 50_000,
            enable_warm_start: true,
            enable_cross_validation: true,
            validation_mode: ValidationMode::Strict,
        }
    }
}
