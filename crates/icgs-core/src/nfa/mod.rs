pub mod anchored;
pub mod pattern;
pub mod state;

pub use anchored::AnchoredWeightedNFA;
pub use state::{NFAState, NFAStateMetadata, NFATransition, RegexWeight, StateId, TransitionCondition};
