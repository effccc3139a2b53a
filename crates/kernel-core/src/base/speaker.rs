use contracts::{ClientId, ClientView, ElectionSettings, Resources};

use super::default_election_settings;
use crate::roles::{Speaker, TermStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct BaseSpeaker;

impl Speaker for BaseSpeaker {
    fn decide_agenda(&self, _view: &ClientView, proposed: Option<&str>) -> Option<String> {
        proposed.map(str::to_string)
    }

    /// Every candidate votes on whatever is on the agenda.
    fn decide_vote(&self, _view: &ClientView, rule: &str, candidates: &[ClientId]) -> Option<(String, Vec<ClientId>)> {
        if rule.is_empty() {
            return None;
        }
        Some((rule.to_string(), candidates.to_vec()))
    }

    fn decide_announcement(&self, _view: &ClientView, rule: &str, result: bool) -> Option<(String, bool)> {
        if rule.is_empty() {
            return None;
        }
        Some((rule.to_string(), result))
    }

    fn pay_judge(&self, _view: &ClientView, salary: Resources) -> Option<Resources> {
        Some(salary)
    }

    fn call_judge_election(
        &self,
        _view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        default_election_settings(monitoring, term, candidates)
    }

    fn decide_next_judge(&self, _view: &ClientView, winner: &ClientId) -> ClientId {
        winner.clone()
    }
}
