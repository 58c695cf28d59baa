//! Linear program construction from a path classification (spec §4.5).

use crate::error::LpError;
use crate::nfa::StateId;
use crate::transaction::{Transaction, TransactionRole};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

pub type VarId = String;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxVariable {
    pub id: VarId,
    pub lower_bound: Decimal,
    /// `None` stands for `+infinity`.
    pub upper_bound: Option<Decimal>,
}

impl FluxVariable {
    pub fn new(id: impl Into<VarId>) -> Self {
        Self {
            id: id.into(),
            lower_bound: Decimal::ZERO,
            upper_bound: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    Leq,
    Geq,
    Eq,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub name: String,
    pub coefficients: BTreeMap<VarId, Decimal>,
    pub bound: Decimal,
    pub constraint_type: ConstraintType,
}

impl LinearConstraint {
    pub fn lhs(&self, assignment: &BTreeMap<VarId, Decimal>) -> Decimal {
        self.coefficients
            .iter()
            .map(|(var, coef)| *coef * assignment.get(var).copied().unwrap_or(Decimal::ZERO))
            .sum()
    }

    pub fn satisfied(&self, assignment: &BTreeMap<VarId, Decimal>, tolerance: Decimal) -> bool {
        self.violation(assignment) <= tolerance
    }

    pub fn violation(&self, assignment: &BTreeMap<VarId, Decimal>) -> Decimal {
        let lhs = self.lhs(assignment);
        match self.constraint_type {
            ConstraintType::Leq => (lhs - self.bound).max(Decimal::ZERO),
            ConstraintType::Geq => (self.bound - lhs).max(Decimal::ZERO),
            ConstraintType::Eq => (lhs - self.bound).abs(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinearProgram {
    pub name: String,
    pub variables: BTreeMap<VarId, FluxVariable>,
    pub constraints: Vec<LinearConstraint>,
}

impl LinearProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: BTreeMap::new(),
            constraints: Vec::new(),
        }
    }

    pub fn declare_variable(&mut self, id: impl Into<VarId>) -> VarId {
        let id = id.into();
        self.variables
            .entry(id.clone())
            .or_insert_with(|| FluxVariable::new(id.clone()));
        id
    }

    pub fn add_constraint(&mut self, constraint: LinearConstraint) -> Result<(), LpError> {
        if !self.bound_is_finite(constraint.bound) {
            return Err(LpError::NonFiniteBound);
        }
        for var in constraint.coefficients.keys() {
            if !self.variables.contains_key(var) {
                return Err(LpError::UndeclaredVariable {
                    constraint: constraint.name.clone(),
                    var: var.clone(),
                });
            }
        }
        self.constraints.push(constraint);
        Ok(())
    }

    fn bound_is_finite(&self, bound: Decimal) -> bool {
        // rust_decimal values are always finite (no NaN/Infinity
        // representation), but bounds arriving as untrusted input may
        // still be scale-overflowed; guard explicitly for clarity.
        bound.is_finite()
    }

    pub fn validate(&self) -> Result<(), LpError> {
        if self.variables.is_empty() {
            return Err(LpError::NoVariables);
        }
        for constraint in &self.constraints {
            for var in constraint.coefficients.keys() {
                if !self.variables.contains_key(var) {
                    return Err(LpError::UndeclaredVariable {
                        constraint: constraint.name.clone(),
                        var: var.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Builds the LP for one transaction's classification (spec §4.5).
///
/// When `classification` is empty (no paths were classified — an empty
/// DAG, or an upstream failure), falls back to one variable per
/// transaction measure, named `<measure_id>_<measure_id>_final`
/// (spec.md documents this naming verbatim as an Open Question: kept as
/// specified, never relied on for soundness — see SPEC_FULL.md §4).
pub fn build_linear_program(
    transaction: &Transaction,
    classification: &BTreeMap<StateId, Vec<crate::path_enum::Path>>,
    state_weights: &dyn Fn(StateId, &str) -> Option<Decimal>,
) -> Result<LinearProgram, LpError> {
    let mut lp = LinearProgram::new(format!("tx_{}", transaction.id));

    if classification.is_empty() {
        return build_fallback_lp(transaction);
    }

    let var_of = |state: StateId| format!("f_{state}");
    for state in classification.keys() {
        lp.declare_variable(var_of(*state));
    }

    for measure in &transaction.source_measures {
        let mut coefficients = BTreeMap::new();
        for state in classification.keys() {
            if let Some(w) = state_weights(*state, &measure.measure_id) {
                coefficients.insert(var_of(*state), w);
            }
        }
        lp.add_constraint(LinearConstraint {
            name: format!("source_{}", measure.measure_id),
            coefficients,
            bound: measure.acceptable_value,
            constraint_type: ConstraintType::Leq,
        })?;
        add_secondary_constraints(&mut lp, measure, classification, state_weights, &var_of)?;
    }

    for measure in &transaction.target_measures {
        let mut coefficients = BTreeMap::new();
        for state in classification.keys() {
            if let Some(w) = state_weights(*state, &measure.measure_id) {
                coefficients.insert(var_of(*state), w);
            }
        }
        lp.add_constraint(LinearConstraint {
            name: format!("target_{}", measure.measure_id),
            coefficients,
            bound: measure.required_value,
            constraint_type: ConstraintType::Geq,
        })?;
        add_secondary_constraints(&mut lp, measure, classification, state_weights, &var_of)?;
    }

    lp.validate()?;
    Ok(lp)
}

fn add_secondary_constraints(
    lp: &mut LinearProgram,
    measure: &crate::transaction::TransactionMeasure,
    classification: &BTreeMap<StateId, Vec<crate::path_enum::Path>>,
    state_weights: &dyn Fn(StateId, &str) -> Option<Decimal>,
    var_of: &dyn Fn(StateId) -> VarId,
) -> Result<(), LpError> {
    for (idx, (_pattern, _weight)) in measure.secondary_patterns.iter().enumerate() {
        let secondary_measure_id = format!("{}_secondary_{idx}", measure.measure_id);
        let mut coefficients = BTreeMap::new();
        for state in classification.keys() {
            if let Some(w) = state_weights(*state, &secondary_measure_id) {
                coefficients.insert(var_of(*state), w);
            }
        }
        lp.add_constraint(LinearConstraint {
            name: format!("secondary_{secondary_measure_id}"),
            coefficients,
            bound: Decimal::ZERO,
            constraint_type: ConstraintType::Leq,
        })?;
    }
    Ok(())
}

fn build_fallback_lp(transaction: &Transaction) -> Result<LinearProgram, LpError> {
    let mut lp = LinearProgram::new(format!("tx_{}_fallback", transaction.id));
    let all_measures = transaction
        .source_measures
        .iter()
        .map(|m| (m, TransactionRole::Source))
        .chain(transaction.target_measures.iter().map(|m| (m, TransactionRole::Target)));

    for (measure, role) in all_measures {
        let var = format!("{0}_{0}_final", measure.measure_id);
        lp.declare_variable(var.clone());
        let (bound, constraint_type) = match role {
            TransactionRole::Source => (measure.acceptable_value, ConstraintType::Leq),
            TransactionRole::Target => (measure.required_value, ConstraintType::Geq),
        };
        let mut coefficients = BTreeMap::new();
        coefficients.insert(var, measure.primary_weight);
        lp.add_constraint(LinearConstraint {
            name: format!("fallback_{}", measure.measure_id),
            coefficients,
            bound,
            constraint_type,
        })?;
    }
    lp.validate()?;
    Ok(lp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn well_formed_lp_validates() {
        let mut lp = LinearProgram::new("test");
        lp.declare_variable("f_0");
        lp.add_constraint(LinearConstraint {
            name: "c1".to_string(),
            coefficients: [("f_0".to_string(), d("1.0"))].into_iter().collect(),
            bound: d("100"),
            constraint_type: ConstraintType::Leq,
        })
        .unwrap();
        assert!(lp.validate().is_ok());
    }

    #[test]
    fn undeclared_variable_rejected() {
        let mut lp = LinearProgram::new("test");
        let err = lp
            .add_constraint(LinearConstraint {
                name: "c1".to_string(),
                coefficients: [("ghost".to_string(), d("1.0"))].into_iter().collect(),
                bound: d("100"),
                constraint_type: ConstraintType::Leq,
            })
            .unwrap_err();
        assert!(matches!(err, LpError::UndeclaredVariable { .. }));
    }

    #[test]
    fn no_variables_rejected_by_validate() {
        let lp = LinearProgram::new("empty");
        assert_eq!(lp.validate().unwrap_err(), LpError::NoVariables);
    }

    #[test]
    fn violation_semantics_per_constraint_type() {
        let mut assignment = BTreeMap::new();
        assignment.insert("x".to_string(), d("120"));
        let leq = LinearConstraint {
            name: "leq".to_string(),
            coefficients: [("x".to_string(), d("1"))].into_iter().collect(),
            bound: d("100"),
            constraint_type: ConstraintType::Leq,
        };
        assert_eq!(leq.violation(&assignment), d("20"));

        let geq = LinearConstraint {
            constraint_type: ConstraintType::Geq,
            ..leq.clone()
        };
        assert_eq!(geq.violation(&assignment), Decimal::ZERO);

        let eq = LinearConstraint {
            constraint_type: ConstraintType::Eq,
            ..leq
        };
        assert_eq!(eq.violation(&assignment), d("20"));
    }
}
