//! Rule catalogue: partitions rule matrices into Available and InPlay and
//! evaluates them against recorded observations.

use std::collections::BTreeMap;

use contracts::{AuxCode, RuleMatrix, VariableName, VariableValuePair};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("rule {0} is not in the catalogue")]
    NotFound(String),
    #[error("rule {0} is not in the available set")]
    NotInAvailable(String),
    #[error("rule {0} is not in play")]
    NotInPlay(String),
    #[error("rule {0} is already registered")]
    Duplicate(String),
    #[error("rule {0} is immutable and cannot leave play")]
    Immutable(String),
    #[error("rule {rule} requires {variable:?} which was not recorded")]
    MissingVariable { rule: String, variable: VariableName },
    #[error("rule {rule} is malformed: {reason}")]
    Malformed { rule: String, reason: String },
}

impl RuleError {
    /// The rule exists but was not in the partition the move expected.
    pub fn is_wrong_partition(&self) -> bool {
        matches!(self, RuleError::NotInAvailable(_) | RuleError::NotInPlay(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleEvaluation {
    pub rule: String,
    pub compliant: bool,
    pub row_values: Vec<f64>,
}

/// Per-client outcome of evaluating every applicable in-play rule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComplianceReport {
    pub results: BTreeMap<String, bool>,
    pub errors: Vec<RuleError>,
}

impl ComplianceReport {
    pub fn is_compliant(&self) -> bool {
        self.results.values().all(|ok| *ok)
    }

    pub fn broken_rules(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RuleCatalogue {
    available: BTreeMap<String, RuleMatrix>,
    in_play: BTreeMap<String, RuleMatrix>,
}

impl RuleCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalogue seeded with the standard reporting, tax, sanction, voting and
    /// election-conduct rules.
    pub fn with_defaults() -> Self {
        let mut catalogue = Self::new();
        let (in_play, available) = default_rules();
        for rule in in_play {
            // Default rules are well formed and uniquely named.
            let _ = catalogue.register_in_play(rule);
        }
        for rule in available {
            let _ = catalogue.register(rule);
        }
        catalogue
    }

    /// Add a rule to the Available set.
    pub fn register(&mut self, rule: RuleMatrix) -> Result<(), RuleError> {
        self.check_new(&rule)?;
        self.available.insert(rule.name.clone(), rule);
        Ok(())
    }

    pub fn register_in_play(&mut self, rule: RuleMatrix) -> Result<(), RuleError> {
        self.check_new(&rule)?;
        self.in_play.insert(rule.name.clone(), rule);
        Ok(())
    }

    fn check_new(&self, rule: &RuleMatrix) -> Result<(), RuleError> {
        if self.contains(&rule.name) {
            return Err(RuleError::Duplicate(rule.name.clone()));
        }
        validate_shape(rule)
    }

    pub fn pull_into_play(&mut self, name: &str) -> Result<(), RuleError> {
        match self.available.remove(name) {
            Some(rule) => {
                self.in_play.insert(name.to_string(), rule);
                Ok(())
            }
            None if self.in_play.contains_key(name) => {
                Err(RuleError::NotInAvailable(name.to_string()))
            }
            None => Err(RuleError::NotFound(name.to_string())),
        }
    }

    pub fn pull_out_of_play(&mut self, name: &str) -> Result<(), RuleError> {
        let mutable = match self.in_play.get(name) {
            Some(rule) => rule.mutable,
            None if self.available.contains_key(name) => {
                return Err(RuleError::NotInPlay(name.to_string()))
            }
            None => return Err(RuleError::NotFound(name.to_string())),
        };
        if !mutable {
            return Err(RuleError::Immutable(name.to_string()));
        }
        if let Some(rule) = self.in_play.remove(name) {
            self.available.insert(name.to_string(), rule);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.available.contains_key(name) || self.in_play.contains_key(name)
    }

    pub fn is_in_play(&self, name: &str) -> bool {
        self.in_play.contains_key(name)
    }

    pub fn is_available(&self, name: &str) -> bool {
        self.available.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&RuleMatrix> {
        self.in_play.get(name).or_else(|| self.available.get(name))
    }

    pub fn in_play_rule(&self, name: &str) -> Option<&RuleMatrix> {
        self.in_play.get(name)
    }

    pub fn in_play(&self) -> impl Iterator<Item = &RuleMatrix> {
        self.in_play.values()
    }

    pub fn in_play_names(&self) -> Vec<String> {
        self.in_play.keys().cloned().collect()
    }

    pub fn available_names(&self) -> Vec<String> {
        self.available.keys().cloned().collect()
    }

    /// Evaluate every in-play rule whose required variables were all recorded.
    pub fn evaluate_client(&self, pairs: &[VariableValuePair]) -> ComplianceReport {
        let mut report = ComplianceReport::default();
        for rule in self.in_play.values() {
            let applicable = rule
                .required_variables
                .iter()
                .all(|variable| pairs.iter().any(|pair| pair.variable == *variable));
            if !applicable {
                continue;
            }
            match evaluate(rule, pairs) {
                Ok(evaluation) => {
                    report.results.insert(evaluation.rule, evaluation.compliant);
                }
                Err(err) => report.errors.push(err),
            }
        }
        report
    }
}

fn validate_shape(rule: &RuleMatrix) -> Result<(), RuleError> {
    let malformed = |reason: String| RuleError::Malformed {
        rule: rule.name.clone(),
        reason,
    };
    if rule.matrix.is_empty() {
        return Err(malformed("matrix has no rows".to_string()));
    }
    if rule.aux.len() != rule.matrix.len() {
        return Err(malformed(format!(
            "{} aux codes for {} rows",
            rule.aux.len(),
            rule.matrix.len()
        )));
    }
    let width = rule.required_variables.len() + 1;
    if let Some(row) = rule.matrix.iter().find(|row| row.len() < width) {
        return Err(malformed(format!(
            "row has {} columns, needs at least {width}",
            row.len()
        )));
    }
    Ok(())
}

/// Substitute recorded values into a rule and check every row.
pub fn evaluate(rule: &RuleMatrix, pairs: &[VariableValuePair]) -> Result<RuleEvaluation, RuleError> {
    let mut values = Vec::new();
    for variable in &rule.required_variables {
        let pair = pairs
            .iter()
            .find(|pair| pair.variable == *variable)
            .ok_or_else(|| RuleError::MissingVariable {
                rule: rule.name.clone(),
                variable: *variable,
            })?;
        values.extend_from_slice(&pair.values);
    }

    let mut row_values = Vec::with_capacity(rule.matrix.len());
    let mut compliant = true;
    for (row, aux) in rule.matrix.iter().zip(&rule.aux) {
        if row.len() != values.len() + 1 {
            return Err(RuleError::Malformed {
                rule: rule.name.clone(),
                reason: format!(
                    "row has {} columns for {} recorded values",
                    row.len(),
                    values.len()
                ),
            });
        }
        let constant = row[values.len()];
        let value = row
            .iter()
            .zip(&values)
            .map(|(coefficient, value)| coefficient * value)
            .sum::<f64>()
            + constant;
        compliant &= aux.satisfied_by(value);
        row_values.push(value);
    }

    Ok(RuleEvaluation {
        rule: rule.name.clone(),
        compliant,
        row_values,
    })
}

pub const INCREMENT_BUDGET_PREFIX: &str = "increment_budget_";

fn default_rules() -> (Vec<RuleMatrix>, Vec<RuleMatrix>) {
    use AuxCode::*;
    use VariableName::*;

    let in_play = vec![
        RuleMatrix::new(
            "island_must_report_private_resources",
            vec![HasIslandReportPrivateResources],
            vec![vec![1.0, -1.0]],
            vec![EqualZero],
        ),
        RuleMatrix::new(
            "island_must_report_actual_private_resources",
            vec![IslandReportedPrivateResources, IslandActualPrivateResources],
            vec![vec![1.0, -1.0, 0.0]],
            vec![EqualZero],
        ),
        RuleMatrix::new(
            "island_must_pay_tax",
            vec![IslandTaxContribution, ExpectedTaxContribution],
            vec![vec![1.0, -1.0, 0.0]],
            vec![GreaterOrEqualZero],
        ),
        RuleMatrix::new(
            "island_must_pay_sanction",
            vec![SanctionPaid, SanctionExpected],
            vec![vec![1.0, -1.0, 0.0]],
            vec![GreaterOrEqualZero],
        ),
        RuleMatrix::new(
            "vote_must_be_called_on_selected_rule",
            vec![RuleSelected, VoteCalled],
            vec![vec![-1.0, 1.0, 0.0]],
            vec![GreaterOrEqualZero],
        )
        .immutable(),
        RuleMatrix::new(
            "vote_result_must_be_announced",
            vec![VoteCalled, VoteResultAnnounced],
            vec![vec![-1.0, 1.0, 0.0]],
            vec![GreaterOrEqualZero],
        )
        .immutable(),
        RuleMatrix::new(
            "roles_must_hold_election",
            vec![TermEnded, ElectionHeld],
            vec![vec![-1.0, 1.0, 0.0]],
            vec![GreaterOrEqualZero],
        )
        .immutable(),
        RuleMatrix::new(
            "must_appoint_elected_island",
            vec![AppointmentMatchesVote],
            vec![vec![1.0, -1.0]],
            vec![EqualZero],
        )
        .immutable(),
    ];

    let mut available = vec![RuleMatrix::new(
        "allocations_must_be_made",
        vec![AllocationMade],
        vec![vec![1.0, -1.0]],
        vec![EqualZero],
    )];
    for role in ["president", "speaker", "judge"] {
        available.push(RuleMatrix::new(
            format!("{INCREMENT_BUDGET_PREFIX}{role}"),
            vec![RoleBudget],
            vec![vec![0.0, 10.0]],
            vec![ReturnValue],
        ));
    }

    (in_play, available)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(variable: VariableName, value: f64) -> VariableValuePair {
        VariableValuePair::single(variable, value)
    }

    #[test]
    fn pull_into_play_moves_between_partitions() {
        let mut catalogue = RuleCatalogue::with_defaults();
        assert!(catalogue.is_available("allocations_must_be_made"));
        catalogue
            .pull_into_play("allocations_must_be_made")
            .expect("available rule moves");
        assert!(catalogue.is_in_play("allocations_must_be_made"));
        assert!(!catalogue.is_available("allocations_must_be_made"));
    }

    #[test]
    fn pull_into_play_rejects_rule_already_in_play() {
        let mut catalogue = RuleCatalogue::with_defaults();
        let err = catalogue
            .pull_into_play("island_must_pay_tax")
            .expect_err("already in play");
        assert_eq!(err, RuleError::NotInAvailable("island_must_pay_tax".into()));
        assert!(err.is_wrong_partition());
    }

    #[test]
    fn unknown_rule_is_distinct_from_wrong_partition() {
        let mut catalogue = RuleCatalogue::with_defaults();
        let err = catalogue.pull_into_play("no_such_rule").expect_err("unknown");
        assert_eq!(err, RuleError::NotFound("no_such_rule".into()));
        assert!(!err.is_wrong_partition());
        let err = catalogue
            .pull_out_of_play("allocations_must_be_made")
            .expect_err("not in play");
        assert!(err.is_wrong_partition());
    }

    #[test]
    fn immutable_rules_stay_in_play() {
        let mut catalogue = RuleCatalogue::with_defaults();
        assert_eq!(
            catalogue.pull_out_of_play("vote_result_must_be_announced"),
            Err(RuleError::Immutable("vote_result_must_be_announced".into()))
        );
        assert!(catalogue.is_in_play("vote_result_must_be_announced"));
    }

    #[test]
    fn malformed_rules_are_refused_at_registration() {
        let mut catalogue = RuleCatalogue::new();
        let rule = RuleMatrix::new(
            "bad",
            vec![VariableName::VoteCalled],
            vec![vec![1.0]],
            vec![AuxCode::EqualZero],
        );
        assert!(matches!(
            catalogue.register(rule),
            Err(RuleError::Malformed { .. })
        ));
        assert!(!catalogue.contains("bad"));
    }

    #[test]
    fn evaluation_substitutes_recorded_values() {
        let catalogue = RuleCatalogue::with_defaults();
        let rule = catalogue
            .in_play_rule("island_must_report_actual_private_resources")
            .expect("rule present");
        let honest = [
            pair(VariableName::IslandReportedPrivateResources, 40.0),
            pair(VariableName::IslandActualPrivateResources, 40.0),
        ];
        let liar = [
            pair(VariableName::IslandReportedPrivateResources, 10.0),
            pair(VariableName::IslandActualPrivateResources, 40.0),
        ];
        assert!(evaluate(rule, &honest).expect("evaluates").compliant);
        let evaluation = evaluate(rule, &liar).expect("evaluates");
        assert!(!evaluation.compliant);
        assert_eq!(evaluation.row_values, vec![-30.0]);
    }

    #[test]
    fn missing_variable_is_reported() {
        let catalogue = RuleCatalogue::with_defaults();
        let rule = catalogue
            .in_play_rule("island_must_pay_tax")
            .expect("rule present");
        let err = evaluate(rule, &[pair(VariableName::IslandTaxContribution, 1.0)])
            .expect_err("expected tax missing");
        assert_eq!(
            err,
            RuleError::MissingVariable {
                rule: "island_must_pay_tax".into(),
                variable: VariableName::ExpectedTaxContribution
            }
        );
    }

    #[test]
    fn client_evaluation_only_covers_applicable_rules() {
        let catalogue = RuleCatalogue::with_defaults();
        let report = catalogue.evaluate_client(&[
            pair(VariableName::IslandTaxContribution, 3.0),
            pair(VariableName::ExpectedTaxContribution, 5.0),
        ]);
        assert_eq!(report.results.len(), 1);
        assert!(!report.is_compliant());
        assert_eq!(
            report.broken_rules().collect::<Vec<_>>(),
            vec!["island_must_pay_tax"]
        );
    }

    #[test]
    fn increment_rules_carry_their_amount_in_cell_zero_one() {
        let catalogue = RuleCatalogue::with_defaults();
        let rule = catalogue
            .get("increment_budget_judge")
            .expect("increment rule registered");
        assert_eq!(rule.cell(0, 1), Some(10.0));
    }
}
