//! Non-default island behaviours selectable per island from the run config.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use contracts::{
    Accountability, ClientId, ClientView, ElectionSettings, Message, ResourceReport, Resources,
    Role, StrategyKind, VoteChoice,
};

use crate::base::{BaseIsland, BaseJudge, BasePresident, BaseSpeaker};
use crate::roles::{Island, Judge, President, Speaker, TermStatus};
use crate::rules::{ComplianceReport, RuleCatalogue};

pub fn build_island(kind: StrategyKind, id: ClientId) -> Arc<dyn Island> {
    match kind {
        StrategyKind::Cooperative => Arc::new(BaseIsland::new(id)),
        StrategyKind::Selfish => Arc::new(SelfishIsland::new(id)),
        StrategyKind::Ambitious => Arc::new(AmbitiousIsland::new(id)),
    }
}

// ---------------------------------------------------------------------------
// Selfish
// ---------------------------------------------------------------------------

/// Under-reports its resources, pays no tax and half of any sanction.
pub struct SelfishIsland {
    base: BaseIsland,
}

impl SelfishIsland {
    pub fn new(id: ClientId) -> Self {
        Self {
            base: BaseIsland::new(id),
        }
    }
}

impl Island for SelfishIsland {
    fn resource_report(&self, view: &ClientView) -> ResourceReport {
        ResourceReport::declared(view.own.resources / 2)
    }

    fn rule_proposal(&self, view: &ClientView) -> Option<String> {
        self.base.rule_proposal(view)
    }

    fn vote_for_rule(&self, view: &ClientView, rule: &str) -> VoteChoice {
        self.base.vote_for_rule(view, rule)
    }

    fn vote_for_election(&self, view: &ClientView, role: Role, candidates: &[ClientId]) -> Vec<ClientId> {
        self.base.vote_for_election(view, role, candidates)
    }

    fn common_pool_resource_request(&self, view: &ClientView) -> Resources {
        self.base.common_pool_resource_request(view) * 2
    }

    fn tax_contribution(&self, _view: &ClientView, _expected: Resources) -> Resources {
        0
    }

    fn sanction_payment(&self, _view: &ClientView, expected: Resources) -> Resources {
        expected / 2
    }

    fn monitor_iigo_role(&self, view: &ClientView, role: Role) -> bool {
        self.base.monitor_iigo_role(view, role)
    }

    fn decide_monitoring_announcement(&self, view: &ClientView, role: Role, result: bool) -> Option<bool> {
        self.base.decide_monitoring_announcement(view, role, result)
    }

    fn receive_communication(&self, sender: &ClientId, content: &Message) {
        self.base.receive_communication(sender, content)
    }

    fn president(&self) -> Option<Arc<dyn President>> {
        self.base.president()
    }

    fn speaker(&self) -> Option<Arc<dyn Speaker>> {
        self.base.speaker()
    }

    fn judge(&self) -> Option<Arc<dyn Judge>> {
        self.base.judge()
    }
}

// ---------------------------------------------------------------------------
// Ambitious
// ---------------------------------------------------------------------------

/// Pushes rules into play, votes for itself and, when it gets to appoint,
/// appoints itself regardless of the vote.
pub struct AmbitiousIsland {
    base: BaseIsland,
    roles: Arc<SelfAppointingRoles>,
}

impl AmbitiousIsland {
    pub fn new(id: ClientId) -> Self {
        Self {
            base: BaseIsland::new(id.clone()),
            roles: Arc::new(SelfAppointingRoles { id }),
        }
    }
}

impl Island for AmbitiousIsland {
    fn resource_report(&self, view: &ClientView) -> ResourceReport {
        self.base.resource_report(view)
    }

    fn rule_proposal(&self, view: &ClientView) -> Option<String> {
        view.available_rules.first().cloned()
    }

    fn vote_for_rule(&self, view: &ClientView, rule: &str) -> VoteChoice {
        self.base.vote_for_rule(view, rule)
    }

    fn vote_for_election(&self, view: &ClientView, role: Role, candidates: &[ClientId]) -> Vec<ClientId> {
        let mut ranking = self.base.vote_for_election(view, role, candidates);
        if let Some(position) = ranking.iter().position(|id| id == self.base.id()) {
            let own = ranking.remove(position);
            ranking.insert(0, own);
        }
        ranking
    }

    fn common_pool_resource_request(&self, view: &ClientView) -> Resources {
        self.base.common_pool_resource_request(view)
    }

    fn tax_contribution(&self, view: &ClientView, expected: Resources) -> Resources {
        self.base.tax_contribution(view, expected)
    }

    fn sanction_payment(&self, view: &ClientView, expected: Resources) -> Resources {
        self.base.sanction_payment(view, expected)
    }

    fn monitor_iigo_role(&self, view: &ClientView, role: Role) -> bool {
        self.base.monitor_iigo_role(view, role)
    }

    /// Keeps bad news about itself quiet.
    fn decide_monitoring_announcement(&self, view: &ClientView, role: Role, result: bool) -> Option<bool> {
        if view.roles.holder(role) == self.base.id() && !result {
            return None;
        }
        self.base.decide_monitoring_announcement(view, role, result)
    }

    fn receive_communication(&self, sender: &ClientId, content: &Message) {
        self.base.receive_communication(sender, content)
    }

    fn president(&self) -> Option<Arc<dyn President>> {
        Some(self.roles.clone())
    }

    fn speaker(&self) -> Option<Arc<dyn Speaker>> {
        Some(self.roles.clone())
    }

    fn judge(&self) -> Option<Arc<dyn Judge>> {
        Some(self.roles.clone())
    }
}

struct SelfAppointingRoles {
    id: ClientId,
}

impl SelfAppointingRoles {
    fn appoint(&self, view: &ClientView, winner: &ClientId) -> ClientId {
        if view.living_clients.contains(&self.id) {
            self.id.clone()
        } else {
            winner.clone()
        }
    }
}

impl President for SelfAppointingRoles {
    fn set_tax_amount(
        &self,
        view: &ClientView,
        reports: &BTreeMap<ClientId, ResourceReport>,
    ) -> Option<BTreeMap<ClientId, Resources>> {
        BasePresident.set_tax_amount(view, reports)
    }

    fn evaluate_allocation_requests(
        &self,
        view: &ClientView,
        requests: &BTreeMap<ClientId, Resources>,
        available: Resources,
    ) -> Option<BTreeMap<ClientId, Resources>> {
        BasePresident.evaluate_allocation_requests(view, requests, available)
    }

    fn pick_rule_to_vote(&self, view: &ClientView, proposals: &[String]) -> Option<String> {
        BasePresident.pick_rule_to_vote(view, proposals)
    }

    fn pay_speaker(&self, view: &ClientView, salary: Resources) -> Option<Resources> {
        BasePresident.pay_speaker(view, salary)
    }

    fn call_speaker_election(
        &self,
        view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        BasePresident.call_speaker_election(view, monitoring, term, candidates)
    }

    fn decide_next_speaker(&self, view: &ClientView, winner: &ClientId) -> ClientId {
        self.appoint(view, winner)
    }
}

impl Speaker for SelfAppointingRoles {
    fn decide_agenda(&self, view: &ClientView, proposed: Option<&str>) -> Option<String> {
        BaseSpeaker.decide_agenda(view, proposed)
    }

    fn decide_vote(&self, view: &ClientView, rule: &str, candidates: &[ClientId]) -> Option<(String, Vec<ClientId>)> {
        BaseSpeaker.decide_vote(view, rule, candidates)
    }

    fn decide_announcement(&self, view: &ClientView, rule: &str, result: bool) -> Option<(String, bool)> {
        BaseSpeaker.decide_announcement(view, rule, result)
    }

    fn pay_judge(&self, view: &ClientView, salary: Resources) -> Option<Resources> {
        BaseSpeaker.pay_judge(view, salary)
    }

    fn call_judge_election(
        &self,
        view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        BaseSpeaker.call_judge_election(view, monitoring, term, candidates)
    }

    fn decide_next_judge(&self, view: &ClientView, winner: &ClientId) -> ClientId {
        self.appoint(view, winner)
    }
}

impl Judge for SelfAppointingRoles {
    fn inspect_history(
        &self,
        view: &ClientView,
        records: &[Accountability],
        rules: &RuleCatalogue,
    ) -> Option<BTreeMap<ClientId, ComplianceReport>> {
        BaseJudge.inspect_history(view, records, rules)
    }

    /// Forgives itself.
    fn pardon_clients(&self, _view: &ClientView, scores: &BTreeMap<ClientId, u32>) -> BTreeSet<ClientId> {
        scores
            .keys()
            .filter(|client| **client == self.id)
            .cloned()
            .collect()
    }

    fn pay_president(&self, view: &ClientView, salary: Resources) -> Option<Resources> {
        BaseJudge.pay_president(view, salary)
    }

    fn call_president_election(
        &self,
        view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        BaseJudge.call_president_election(view, monitoring, term, candidates)
    }

    fn decide_next_president(&self, view: &ClientView, winner: &ClientId) -> ClientId {
        self.appoint(view, winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::view_for;

    #[test]
    fn selfish_island_under_reports_and_evades_tax() {
        let island = build_island(StrategyKind::Selfish, ClientId::island(1));
        let view = view_for(&ClientId::island(1), 60);
        assert_eq!(island.resource_report(&view), ResourceReport::declared(30));
        assert_eq!(island.tax_contribution(&view, 6), 0);
    }

    #[test]
    fn ambitious_island_ranks_itself_first_and_appoints_itself() {
        let island = build_island(StrategyKind::Ambitious, ClientId::island(3));
        let mut view = view_for(&ClientId::island(3), 40);
        view.living_clients = vec![ClientId::island(1), ClientId::island(3)];
        let ranking = island.vote_for_election(
            &view,
            Role::Judge,
            &[ClientId::island(1), ClientId::island(3)],
        );
        assert_eq!(ranking[0], ClientId::island(3));

        let speaker = island.speaker().expect("speaker role");
        assert_eq!(
            speaker.decide_next_judge(&view, &ClientId::island(1)),
            ClientId::island(3)
        );
    }
}
