//! NFA state/transition records (spec §3).
//!
//! Matching itself does not walk transitions — see the module doc on
//! [`super::anchored`] for why a direct whole-word regex match is
//! sufficient here. `NFAState`/`NFATransition` exist to keep the data
//! model spec §3 describes: measure provenance, original vs. anchored
//! pattern text, and the transition graph for introspection/debugging.

use regex::Regex;
use rust_decimal::Decimal;

pub type StateId = usize;

/// One measure's contribution to a final state's LP coefficient.
#[derive(Debug, Clone, PartialEq)]
pub struct RegexWeight {
    pub measure_id: String,
    pub regex_id: String,
    pub weight: Decimal,
}

/// How a transition consumes input.
#[derive(Debug, Clone)]
pub enum TransitionCondition {
    Epsilon,
    Char(char),
    RegexPattern(String),
}

#[derive(Debug, Clone)]
pub struct NFATransition {
    pub from: StateId,
    pub to: StateId,
    pub condition: TransitionCondition,
    pub regex_weight: Option<RegexWeight>,
}

/// Metadata carried by every state: the original and anchored pattern
/// text, plus (for character-class states) one compiled regex per
/// expanded character.
#[derive(Debug, Clone)]
pub struct NFAStateMetadata {
    pub original_pattern: String,
    pub anchored_pattern: String,
    /// `Some` only for states created via
    /// [`super::anchored::AnchoredWeightedNFA::add_character_class_pattern`].
    pub character_alternatives: Option<Vec<(char, Regex)>>,
    /// The single compiled matcher for non-class states.
    pub compiled: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct NFAState {
    pub state_id: StateId,
    pub is_final: bool,
    pub regex_weights: Vec<RegexWeight>,
    pub metadata: NFAStateMetadata,
}

impl NFAState {
    /// Tests whether `word` reaches this state under a complete match.
    pub fn matches(&self, word: &str) -> bool {
        if let Some(alternatives) = &self.metadata.character_alternatives {
            alternatives.iter().any(|(_, re)| re.is_match(word))
        } else if let Some(re) = &self.metadata.compiled {
            re.is_match(word)
        } else {
            false
        }
    }

    pub fn weight_for_measure(&self, measure_id: &str) -> Option<Decimal> {
        let mut total: Option<Decimal> = None;
        for rw in &self.regex_weights {
            if rw.measure_id == measure_id {
                total = Some(total.map_or(rw.weight, |t| t + rw.weight));
            }
        }
        total
    }
}
