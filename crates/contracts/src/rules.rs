//! Rule-matrix and accountability contracts.

use serde::{Deserialize, Serialize};

use crate::ClientId;

/// Observable quantities rules can be written against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VariableName {
    HasIslandReportPrivateResources,
    IslandReportedPrivateResources,
    IslandActualPrivateResources,
    ExpectedTaxContribution,
    IslandTaxContribution,
    SanctionExpected,
    SanctionPaid,
    AllocationMade,
    RuleSelected,
    VoteCalled,
    VoteResultAnnounced,
    TermEnded,
    ElectionHeld,
    AppointmentMatchesVote,
    RoleBudget,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariableValuePair {
    pub variable: VariableName,
    pub values: Vec<f64>,
}

impl VariableValuePair {
    pub fn new(variable: VariableName, values: Vec<f64>) -> Self {
        Self { variable, values }
    }

    pub fn single(variable: VariableName, value: f64) -> Self {
        Self::new(variable, vec![value])
    }

    pub fn flag(variable: VariableName, value: bool) -> Self {
        Self::single(variable, if value { 1.0 } else { 0.0 })
    }
}

/// One client's observations for one turn. Immutable once appended to the log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Accountability {
    pub client_id: ClientId,
    pub turn: u64,
    pub pairs: Vec<VariableValuePair>,
}

impl Accountability {
    pub fn new(client_id: ClientId, turn: u64, pairs: Vec<VariableValuePair>) -> Self {
        Self {
            client_id,
            turn,
            pairs,
        }
    }

    pub fn values_of(&self, variable: VariableName) -> Option<&[f64]> {
        self.pairs
            .iter()
            .find(|pair| pair.variable == variable)
            .map(|pair| pair.values.as_slice())
    }
}

/// Per-row comparison applied to `row · values + constant`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuxCode {
    EqualZero,
    GreaterThanZero,
    GreaterOrEqualZero,
    NotZero,
    /// The row yields a value instead of a verdict; always satisfied.
    ReturnValue,
}

impl AuxCode {
    pub fn satisfied_by(self, value: f64) -> bool {
        match self {
            AuxCode::EqualZero => value.abs() < f64::EPSILON,
            AuxCode::GreaterThanZero => value > 0.0,
            AuxCode::GreaterOrEqualZero => value >= 0.0,
            AuxCode::NotZero => value.abs() >= f64::EPSILON,
            AuxCode::ReturnValue => true,
        }
    }
}

/// A named linear predicate over recorded variables.
///
/// Each row of `matrix` holds one coefficient per value of the concatenated
/// `required_variables`, followed by a constant term. `aux` holds one code per
/// row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleMatrix {
    pub name: String,
    pub required_variables: Vec<VariableName>,
    pub matrix: Vec<Vec<f64>>,
    pub aux: Vec<AuxCode>,
    #[serde(default = "default_mutable")]
    pub mutable: bool,
}

fn default_mutable() -> bool {
    true
}

impl RuleMatrix {
    pub fn new(
        name: impl Into<String>,
        required_variables: Vec<VariableName>,
        matrix: Vec<Vec<f64>>,
        aux: Vec<AuxCode>,
    ) -> Self {
        Self {
            name: name.into(),
            required_variables,
            matrix,
            aux,
            mutable: true,
        }
    }

    pub fn immutable(mut self) -> Self {
        self.mutable = false;
        self
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<f64> {
        self.matrix.get(row).and_then(|r| r.get(column)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aux_codes_compare_against_zero() {
        assert!(AuxCode::EqualZero.satisfied_by(0.0));
        assert!(!AuxCode::EqualZero.satisfied_by(1.0));
        assert!(AuxCode::GreaterOrEqualZero.satisfied_by(0.0));
        assert!(!AuxCode::GreaterThanZero.satisfied_by(0.0));
        assert!(AuxCode::NotZero.satisfied_by(-2.0));
        assert!(AuxCode::ReturnValue.satisfied_by(-100.0));
    }

    #[test]
    fn accountability_looks_up_values_by_variable() {
        let record = Accountability::new(
            ClientId::island(1),
            4,
            vec![
                VariableValuePair::flag(VariableName::HasIslandReportPrivateResources, true),
                VariableValuePair::single(VariableName::IslandReportedPrivateResources, 42.0),
            ],
        );
        assert_eq!(
            record.values_of(VariableName::IslandReportedPrivateResources),
            Some(&[42.0][..])
        );
        assert!(record.values_of(VariableName::SanctionPaid).is_none());
    }

    #[test]
    fn rule_matrix_defaults_to_mutable_when_field_missing() {
        let rule: RuleMatrix = serde_json::from_str(
            r#"{"name":"r","required_variables":["vote_called"],"matrix":[[1.0,-1.0]],"aux":["equal_zero"]}"#,
        )
        .expect("rule parses");
        assert!(rule.mutable);
        assert_eq!(rule.cell(0, 1), Some(-1.0));
    }
}
