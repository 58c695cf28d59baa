//! Reverse path enumeration and NFA-driven classification (spec §4.4).

use crate::dag::{Dag, Node, NodeId};
use crate::error::PathEnumerationError;
use crate::nfa::{AnchoredWeightedNFA, StateId};
use crate::taxonomy::AccountTaxonomy;
use std::collections::BTreeMap;

/// A complete reverse path converted to forward order: the source leaf
/// first, the transaction's target sink last.
pub type Path = Vec<Node>;

/// Which NFA classified a path — kept distinct (rather than collapsed
/// immediately to a bare `StateId`) so the dual-NFA precedence rule
/// (primary wins; secondary is a fallback) is directly testable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Primary(StateId),
    Secondary(StateId),
}

impl Classification {
    pub fn state_id(self) -> StateId {
        match self {
            Classification::Primary(id) | Classification::Secondary(id) => id,
        }
    }
}

pub struct PathEnumerator<'a> {
    pub dag: &'a Dag,
    pub taxonomy: &'a AccountTaxonomy,
    pub transaction_num: i64,
    pub max_path_enumeration: usize,
}

impl<'a> PathEnumerator<'a> {
    pub fn new(
        dag: &'a Dag,
        taxonomy: &'a AccountTaxonomy,
        transaction_num: i64,
        max_path_enumeration: usize,
    ) -> Self {
        Self {
            dag,
            taxonomy,
            transaction_num,
            max_path_enumeration,
        }
    }

    /// Enumerates every reverse path from `target_sink` back to a source
    /// leaf, treating `source_node -> target_sink` as an additional
    /// (not-yet-committed) edge, and groups the resulting words by the
    /// NFA final state they classify to.
    pub fn enumerate_and_classify(
        &self,
        source_node: NodeId,
        target_sink: NodeId,
        primary_nfa: &AnchoredWeightedNFA,
        secondary_nfa: Option<&AnchoredWeightedNFA>,
    ) -> Result<BTreeMap<StateId, Vec<Path>>, PathEnumerationError> {
        let raw_paths = self.enumerate_raw_paths(source_node, target_sink)?;
        let mut grouped: BTreeMap<StateId, Vec<Path>> = BTreeMap::new();

        for reverse_path in raw_paths {
            let mut forward_ids = reverse_path;
            forward_ids.reverse();
            let path: Path = forward_ids
                .iter()
                .map(|id| self.dag.node(*id).cloned().expect("enumerated node must exist"))
                .collect();
            let word = self.taxonomy.path_to_word(&path, self.transaction_num)?;
            if let Some(classification) = classify_word(&word, primary_nfa, secondary_nfa) {
                grouped.entry(classification.state_id()).or_default().push(path);
            }
        }
        Ok(grouped)
    }

    /// Backward-reachability DFS; returns paths in sink-to-leaf order
    /// (reversed by the caller before use).
    fn enumerate_raw_paths(
        &self,
        source_node: NodeId,
        target_sink: NodeId,
    ) -> Result<Vec<Vec<NodeId>>, PathEnumerationError> {
        let mut completed = Vec::new();
        let mut stack: Vec<Vec<NodeId>> = vec![vec![target_sink]];

        while let Some(path) = stack.pop() {
            let current = *path.last().expect("path is never empty");
            let mut predecessors = self.dag.incoming_sources(current);
            if current == target_sink && !predecessors.contains(&source_node) {
                predecessors.push(source_node);
            }
            predecessors.retain(|p| !path.contains(p)); // acyclic by construction; defensive only

            if predecessors.is_empty() {
                completed.push(path);
            } else {
                for pred in predecessors {
                    if completed.len() + stack.len() >= self.max_path_enumeration {
                        return Err(PathEnumerationError::LimitExceeded {
                            limit: self.max_path_enumeration,
                        });
                    }
                    let mut next = path.clone();
                    next.push(pred);
                    stack.push(next);
                }
            }
            if completed.len() > self.max_path_enumeration {
                return Err(PathEnumerationError::LimitExceeded {
                    limit: self.max_path_enumeration,
                });
            }
        }
        Ok(completed)
    }
}

/// Primary NFA wins outright; the secondary ("target") NFA is only
/// consulted when the primary fails to classify the word at all (spec
/// §4.4's dual-NFA hybrid, precedence resolved per SPEC_FULL.md §4).
pub fn classify_word(
    word: &str,
    primary_nfa: &AnchoredWeightedNFA,
    secondary_nfa: Option<&AnchoredWeightedNFA>,
) -> Option<Classification> {
    if let Some(state) = primary_nfa.evaluate(word) {
        return Some(Classification::Primary(state));
    }
    secondary_nfa
        .and_then(|nfa| nfa.evaluate(word))
        .map(Classification::Secondary)
}
