//! Weighted NFA with automatic anchoring and frozen snapshots (spec §4.3).
//!
//! ## Evaluation algorithm
//!
//! Every accepted pattern is rewritten to `.*pattern$` (or left alone if
//! it already ends in `$`). Because the source DAG hands the classifier
//! complete words rather than a stream, a state reached by pattern
//! `.*x$` is equivalent to testing a full-string match of `x` against
//! the word — there is no need to actually execute a transition graph.
//! `evaluate` therefore tests each final state's compiled matcher
//! directly, in ascending state-id order, and returns the first hit.
//! This gives the same answer live or frozen by construction: frozen
//! just swaps which `Vec<NFAState>` gets iterated.

use super::state::{NFAState, NFAStateMetadata, NFATransition, RegexWeight, StateId, TransitionCondition};
use super::pattern::{anchor_pattern, extract_character_class, substitute_class_with_char, validate_pattern_subset};
use crate::error::NfaError;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

fn compile_full_match(anchored: &str) -> Result<Regex, NfaError> {
    let full = if anchored.starts_with('^') {
        anchored.to_string()
    } else {
        format!("^{anchored}")
    };
    Regex::new(&full).map_err(|e| NfaError::InvalidRegex(anchored.to_string(), e.to_string()))
}

#[derive(Debug, Clone, Default)]
pub struct AnchoredWeightedNFA {
    states: Vec<NFAState>,
    transitions: Vec<NFATransition>,
    initial_state: Option<StateId>,
    alphabet: std::collections::BTreeSet<char>,
    frozen: bool,
    frozen_states: Option<Vec<NFAState>>,
    frozen_transitions: Option<Vec<NFATransition>>,
}

impl AnchoredWeightedNFA {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn initial_state(&self) -> Option<StateId> {
        self.initial_state
    }

    pub fn alphabet(&self) -> &std::collections::BTreeSet<char> {
        &self.alphabet
    }

    fn live_states(&self) -> &[NFAState] {
        &self.states
    }

    fn active_states(&self) -> &[NFAState] {
        if self.frozen {
            self.frozen_states.as_deref().unwrap_or(&self.states)
        } else {
            &self.states
        }
    }

    fn active_transitions(&self) -> &[NFATransition] {
        if self.frozen {
            self.frozen_transitions.as_deref().unwrap_or(&self.transitions)
        } else {
            &self.transitions
        }
    }

    fn ensure_initial_state(&mut self) -> StateId {
        if let Some(id) = self.initial_state {
            return id;
        }
        let id = self.states.len();
        self.states.push(NFAState {
            state_id: id,
            is_final: false,
            regex_weights: Vec::new(),
            metadata: NFAStateMetadata {
                original_pattern: String::new(),
                anchored_pattern: String::new(),
                character_alternatives: None,
                compiled: None,
            },
        });
        self.initial_state = Some(id);
        id
    }

    /// Adds a single-pattern final state, auto-anchoring the pattern.
    pub fn add_pattern(
        &mut self,
        measure_id: &str,
        pattern: &str,
        weight: Decimal,
        regex_id: &str,
    ) -> Result<StateId, NfaError> {
        if self.frozen {
            return Err(NfaError::FrozenModification);
        }
        if measure_id.is_empty() || pattern.is_empty() || regex_id.is_empty() {
            return Err(NfaError::EmptyField);
        }
        validate_pattern_subset(pattern)?;
        let anchored = anchor_pattern(pattern);
        let compiled = compile_full_match(&anchored)?;

        let initial = self.ensure_initial_state();
        let state_id = self.states.len();
        let regex_weight = RegexWeight {
            measure_id: measure_id.to_string(),
            regex_id: regex_id.to_string(),
            weight,
        };
        self.states.push(NFAState {
            state_id,
            is_final: true,
            regex_weights: vec![regex_weight.clone()],
            metadata: NFAStateMetadata {
                original_pattern: pattern.to_string(),
                anchored_pattern: anchored.clone(),
                character_alternatives: None,
                compiled: Some(compiled),
            },
        });
        self.transitions.push(NFATransition {
            from: initial,
            to: state_id,
            condition: TransitionCondition::RegexPattern(anchored),
            regex_weight: Some(regex_weight),
        });
        self.register_alphabet(pattern);
        Ok(state_id)
    }

    /// Adds a character-class pattern, consolidating every character
    /// into a single final state so that any matching character reaches
    /// the same LP variable (spec §4.3: "consolidation is mandatory").
    pub fn add_character_class_pattern(
        &mut self,
        measure_id: &str,
        pattern: &str,
        weight: Decimal,
    ) -> Result<StateId, NfaError> {
        if self.frozen {
            return Err(NfaError::FrozenModification);
        }
        if measure_id.is_empty() || pattern.is_empty() {
            return Err(NfaError::EmptyField);
        }
        validate_pattern_subset(pattern)?;
        let class = extract_character_class(pattern).ok_or_else(|| NfaError::NoCharacterClass(pattern.to_string()))?;
        let anchored = anchor_pattern(pattern);

        let mut alternatives = Vec::with_capacity(class.len());
        for c in &class {
            let single = substitute_class_with_char(pattern, *c);
            let single_anchored = anchor_pattern(&single);
            let compiled = compile_full_match(&single_anchored)?;
            alternatives.push((*c, compiled));
            self.alphabet.insert(*c);
        }

        let initial = self.ensure_initial_state();
        let state_id = self.states.len();
        let regex_weight = RegexWeight {
            measure_id: measure_id.to_string(),
            regex_id: pattern.to_string(),
            weight,
        };
        self.states.push(NFAState {
            state_id,
            is_final: true,
            regex_weights: vec![regex_weight.clone()],
            metadata: NFAStateMetadata {
                original_pattern: pattern.to_string(),
                anchored_pattern: anchored.clone(),
                character_alternatives: Some(alternatives),
                compiled: None,
            },
        });
        self.transitions.push(NFATransition {
            from: initial,
            to: state_id,
            condition: TransitionCondition::RegexPattern(anchored),
            regex_weight: Some(regex_weight),
        });
        Ok(state_id)
    }

    fn register_alphabet(&mut self, pattern: &str) {
        for c in pattern.chars() {
            if crate::character_set::is_valid_character(c) && !".*+?|()[]$".contains(c) {
                self.alphabet.insert(c);
            }
        }
    }

    /// Captures deep copies of the final-state and transition lists.
    /// Idempotent; re-freezing does not refresh the snapshot.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen_states = Some(self.states.clone());
        self.frozen_transitions = Some(self.transitions.clone());
        self.frozen = true;
    }

    /// Clears frozen snapshots and allows mutation again.
    pub fn unfreeze(&mut self) {
        self.frozen = false;
        self.frozen_states = None;
        self.frozen_transitions = None;
    }

    /// Returns the id of the first final state (in ascending id order)
    /// that reaches a complete match on `word`.
    pub fn evaluate(&self, word: &str) -> Option<StateId> {
        self.active_states()
            .iter()
            .filter(|s| s.is_final)
            .find(|s| s.matches(word))
            .map(|s| s.state_id)
    }

    pub fn state(&self, id: StateId) -> Result<&NFAState, NfaError> {
        self.active_states()
            .iter()
            .find(|s| s.state_id == id)
            .ok_or(NfaError::UnknownState(id))
    }

    pub fn final_states(&self) -> impl Iterator<Item = &NFAState> {
        self.active_states().iter().filter(|s| s.is_final)
    }

    pub fn final_state_count(&self) -> usize {
        self.final_states().count()
    }

    pub fn transitions(&self) -> &[NFATransition] {
        self.active_transitions()
    }

    /// Projection of final states onto their weight for `measure_id`.
    pub fn state_weights_for_measure(&self, measure_id: &str) -> BTreeMap<StateId, Decimal> {
        self.final_states()
            .filter_map(|s| s.weight_for_measure(measure_id).map(|w| (s.state_id, w)))
            .collect()
    }

    pub fn all_patterns_anchored(&self) -> bool {
        self.live_states()
            .iter()
            .filter(|s| s.is_final)
            .all(|s| s.metadata.anchored_pattern.ends_with('$'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn add_pattern_anchors_automatically() {
        let mut nfa = AnchoredWeightedNFA::new();
        let id = nfa.add_pattern("m1", ".*A", d("1.0"), "r1").unwrap();
        assert!(nfa.state(id).unwrap().metadata.anchored_pattern.ends_with('$'));
    }

    #[test]
    fn evaluate_matches_full_word() {
        let mut nfa = AnchoredWeightedNFA::new();
        let id = nfa.add_pattern("m1", ".*A.*", d("1.2"), "r1").unwrap();
        assert_eq!(nfa.evaluate("XA"), Some(id));
        assert_eq!(nfa.evaluate("XB"), None);
    }

    #[test]
    fn frozen_modification_rejected() {
        let mut nfa = AnchoredWeightedNFA::new();
        nfa.add_pattern("m1", ".*A", d("1.0"), "r1").unwrap();
        nfa.freeze();
        assert_eq!(
            nfa.add_pattern("m2", ".*B", d("1.0"), "r2").unwrap_err(),
            NfaError::FrozenModification
        );
    }

    #[test]
    fn evaluate_identical_live_and_frozen() {
        let mut nfa = AnchoredWeightedNFA::new();
        nfa.add_pattern("m1", ".*A.*", d("1.0"), "r1").unwrap();
        let live = nfa.evaluate("ZA");
        nfa.freeze();
        let frozen = nfa.evaluate("ZA");
        assert_eq!(live, frozen);
    }

    #[test]
    fn character_class_consolidates_to_one_state() {
        let mut nfa = AnchoredWeightedNFA::new();
        let id = nfa
            .add_character_class_pattern("industry", ".*[IJKL].*", d("1.0"))
            .unwrap();
        assert_eq!(nfa.evaluate("xI"), Some(id));
        assert_eq!(nfa.evaluate("xJ"), Some(id));
        assert_eq!(nfa.evaluate("xK"), Some(id));
        assert_eq!(nfa.evaluate("xL"), Some(id));
        assert_eq!(nfa.evaluate("xM"), None);
        assert_eq!(nfa.final_state_count(), 1);
    }

    #[test]
    fn invalid_regex_rejected() {
        let mut nfa = AnchoredWeightedNFA::new();
        assert!(nfa.add_pattern("m1", "(unterminated", d("1.0"), "r1").is_err());
    }

    #[test]
    fn unknown_state_errors() {
        let nfa = AnchoredWeightedNFA::new();
        assert_eq!(nfa.state(42).unwrap_err(), NfaError::UnknownState(42));
    }

    #[test]
    fn state_weights_for_measure_projection() {
        let mut nfa = AnchoredWeightedNFA::new();
        let s1 = nfa.add_pattern("m1", ".*A", d("1.2"), "r1").unwrap();
        let weights = nfa.state_weights_for_measure("m1");
        assert_eq!(weights.get(&s1), Some(&d("1.2")));
        assert!(nfa.state_weights_for_measure("missing").is_empty());
    }
}
