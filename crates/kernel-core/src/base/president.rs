use std::collections::BTreeMap;

use contracts::{ClientId, ClientView, ElectionSettings, ResourceReport, Resources};

use super::default_election_settings;
use crate::roles::{President, TermStatus};

/// Share of declared resources levied as tax.
pub const TAX_PERCENTAGE: Resources = 10;
/// Tax on islands that withheld their report.
pub const FLAT_TAX: Resources = 5;

#[derive(Debug, Clone, Copy, Default)]
pub struct BasePresident;

impl President for BasePresident {
    fn set_tax_amount(
        &self,
        _view: &ClientView,
        reports: &BTreeMap<ClientId, ResourceReport>,
    ) -> Option<BTreeMap<ClientId, Resources>> {
        Some(
            reports
                .iter()
                .map(|(client, report)| {
                    let amount = if report.reported {
                        report.reported_amount.max(0) * TAX_PERCENTAGE / 100
                    } else {
                        FLAT_TAX
                    };
                    (client.clone(), amount)
                })
                .collect(),
        )
    }

    /// Grant every request when they fit in half the pool, otherwise scale
    /// them down proportionally to that half.
    fn evaluate_allocation_requests(
        &self,
        _view: &ClientView,
        requests: &BTreeMap<ClientId, Resources>,
        available: Resources,
    ) -> Option<BTreeMap<ClientId, Resources>> {
        let budget = available.max(0) / 2;
        let total: Resources = requests.values().filter(|amount| **amount > 0).sum();
        if total == 0 {
            return Some(BTreeMap::new());
        }
        Some(
            requests
                .iter()
                .filter(|(_, amount)| **amount > 0)
                .map(|(client, amount)| {
                    let granted = if total <= budget {
                        *amount
                    } else {
                        amount * budget / total
                    };
                    (client.clone(), granted)
                })
                .collect(),
        )
    }

    fn pick_rule_to_vote(&self, _view: &ClientView, proposals: &[String]) -> Option<String> {
        proposals.first().cloned()
    }

    fn pay_speaker(&self, _view: &ClientView, salary: Resources) -> Option<Resources> {
        Some(salary)
    }

    fn call_speaker_election(
        &self,
        _view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        default_election_settings(monitoring, term, candidates)
    }

    fn decide_next_speaker(&self, _view: &ClientView, winner: &ClientId) -> ClientId {
        winner.clone()
    }
}
