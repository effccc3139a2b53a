use std::collections::{BTreeMap, BTreeSet};

use contracts::{Accountability, ClientId, ClientView, ElectionSettings, Resources, VariableValuePair};

use super::default_election_settings;
use crate::roles::{Judge, TermStatus};
use crate::rules::{ComplianceReport, RuleCatalogue};

#[derive(Debug, Clone, Copy, Default)]
pub struct BaseJudge;

/// Concatenate each client's recorded pairs in log order.
pub fn merge_records(records: &[Accountability]) -> BTreeMap<ClientId, Vec<VariableValuePair>> {
    let mut merged: BTreeMap<ClientId, Vec<VariableValuePair>> = BTreeMap::new();
    for record in records {
        merged
            .entry(record.client_id.clone())
            .or_default()
            .extend(record.pairs.iter().cloned());
    }
    merged
}

impl Judge for BaseJudge {
    fn inspect_history(
        &self,
        _view: &ClientView,
        records: &[Accountability],
        rules: &RuleCatalogue,
    ) -> Option<BTreeMap<ClientId, ComplianceReport>> {
        Some(
            merge_records(records)
                .into_iter()
                .map(|(client, pairs)| (client, rules.evaluate_client(&pairs)))
                .collect(),
        )
    }

    fn pardon_clients(&self, _view: &ClientView, _scores: &BTreeMap<ClientId, u32>) -> BTreeSet<ClientId> {
        BTreeSet::new()
    }

    fn pay_president(&self, _view: &ClientView, salary: Resources) -> Option<Resources> {
        Some(salary)
    }

    fn call_president_election(
        &self,
        _view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        default_election_settings(monitoring, term, candidates)
    }

    fn decide_next_president(&self, _view: &ClientView, winner: &ClientId) -> ClientId {
        winner.clone()
    }
}
