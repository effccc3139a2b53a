//! Fixtures shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use contracts::{
    Accountability, ActionCosts, ClientId, ClientInfo, ClientView, ElectionSettings,
    GovernanceConfig, Message, ResourceReport, Resources, Role, RoleAssignment, VoteChoice,
};

use crate::base::{BaseIsland, BaseJudge, BasePresident, BaseSpeaker};
use crate::roles::{Island, IslandRegistry, Judge, President, Speaker, TermStatus};
use crate::rules::{ComplianceReport, RuleCatalogue};
use crate::state::GameState;

pub fn view_for(client: &ClientId, resources: Resources) -> ClientView {
    ClientView {
        turn: 0,
        client_id: client.clone(),
        own: ClientInfo::new(resources),
        common_pool: 0,
        roles: default_roles(),
        turns_in_power: BTreeMap::new(),
        living_clients: vec![client.clone()],
        rules_in_play: Vec::new(),
        available_rules: Vec::new(),
    }
}

pub fn default_roles() -> RoleAssignment {
    RoleAssignment {
        president: ClientId::island(1),
        speaker: ClientId::island(2),
        judge: ClientId::island(3),
    }
}

/// `count` islands holding `resources` each; island 1/2/3 hold
/// president/speaker/judge.
pub fn game_state(count: usize, resources: Resources, pool: Resources) -> GameState {
    let clients = (1..=count)
        .map(|index| (ClientId::island(index), ClientInfo::new(resources)))
        .collect();
    let budgets = Role::ALL.into_iter().map(|role| (role, 100)).collect();
    GameState::new(clients, pool, default_roles(), budgets)
}

/// No fees, no salaries, callbacks run inline.
pub fn free_config() -> GovernanceConfig {
    GovernanceConfig {
        action_costs: ActionCosts::uniform(0),
        salaries: Role::ALL.into_iter().map(|role| (role, 0)).collect(),
        decision_timeout_ms: 0,
        ..GovernanceConfig::default()
    }
}

pub fn base_registry(count: usize) -> IslandRegistry {
    (1..=count)
        .map(|index| {
            let id = ClientId::island(index);
            let island: Arc<dyn Island> = Arc::new(BaseIsland::new(id.clone()));
            (id, island)
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct Script {
    pub report: Option<ResourceReport>,
    pub panic_on_report: bool,
    pub stall_on_vote: Option<Duration>,
    pub vote: Option<VoteChoice>,
    pub proposal: Option<String>,
    pub tax_paid: Option<Resources>,
    pub without_roles: bool,
    pub decline_salaries: bool,
    pub withhold_vote: bool,
    pub always_elect: bool,
    pub appoint: Option<ClientId>,
}

/// Base island with individually overridden decisions. Counts how often each
/// decision was asked for.
pub struct ScriptedIsland {
    base: BaseIsland,
    script: Script,
    roles: Arc<ScriptedRoles>,
    calls: Mutex<BTreeMap<&'static str, u32>>,
}

impl ScriptedIsland {
    pub fn new(id: ClientId, script: Script) -> Self {
        Self {
            base: BaseIsland::new(id),
            roles: Arc::new(ScriptedRoles {
                script: script.clone(),
            }),
            script,
            calls: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn calls(&self, decision: &str) -> u32 {
        self.calls
            .lock()
            .map(|calls| calls.get(decision).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn count(&self, decision: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(decision).or_insert(0) += 1;
        }
    }
}

impl Island for ScriptedIsland {
    fn resource_report(&self, view: &ClientView) -> ResourceReport {
        self.count("resource_report");
        if self.script.panic_on_report {
            panic!("scripted report failure");
        }
        self.script
            .report
            .unwrap_or_else(|| self.base.resource_report(view))
    }

    fn rule_proposal(&self, view: &ClientView) -> Option<String> {
        self.script
            .proposal
            .clone()
            .or_else(|| self.base.rule_proposal(view))
    }

    fn vote_for_rule(&self, view: &ClientView, rule: &str) -> VoteChoice {
        self.count("vote_for_rule");
        if let Some(delay) = self.script.stall_on_vote {
            thread::sleep(delay);
        }
        self.script
            .vote
            .unwrap_or_else(|| self.base.vote_for_rule(view, rule))
    }

    fn vote_for_election(&self, view: &ClientView, role: Role, candidates: &[ClientId]) -> Vec<ClientId> {
        self.base.vote_for_election(view, role, candidates)
    }

    fn common_pool_resource_request(&self, view: &ClientView) -> Resources {
        self.base.common_pool_resource_request(view)
    }

    fn tax_contribution(&self, view: &ClientView, expected: Resources) -> Resources {
        self.script
            .tax_paid
            .unwrap_or_else(|| self.base.tax_contribution(view, expected))
    }

    fn sanction_payment(&self, view: &ClientView, expected: Resources) -> Resources {
        self.base.sanction_payment(view, expected)
    }

    fn monitor_iigo_role(&self, view: &ClientView, role: Role) -> bool {
        self.count("monitor_iigo_role");
        self.base.monitor_iigo_role(view, role)
    }

    fn decide_monitoring_announcement(&self, view: &ClientView, role: Role, result: bool) -> Option<bool> {
        self.base.decide_monitoring_announcement(view, role, result)
    }

    fn receive_communication(&self, sender: &ClientId, content: &Message) {
        self.count("receive_communication");
        self.base.receive_communication(sender, content)
    }

    fn president(&self) -> Option<Arc<dyn President>> {
        if self.script.without_roles {
            return None;
        }
        Some(self.roles.clone())
    }

    fn speaker(&self) -> Option<Arc<dyn Speaker>> {
        if self.script.without_roles {
            return None;
        }
        Some(self.roles.clone())
    }

    fn judge(&self) -> Option<Arc<dyn Judge>> {
        if self.script.without_roles {
            return None;
        }
        Some(self.roles.clone())
    }
}

struct ScriptedRoles {
    script: Script,
}

impl ScriptedRoles {
    fn salary(&self, salary: Resources) -> Option<Resources> {
        if self.script.decline_salaries {
            None
        } else {
            Some(salary)
        }
    }

    fn election(&self, monitoring: bool, term: TermStatus, candidates: &[ClientId]) -> ElectionSettings {
        if self.script.always_elect {
            return ElectionSettings::plurality(candidates.to_vec());
        }
        crate::base::default_election_settings(monitoring, term, candidates)
    }

    fn appoint(&self, winner: &ClientId) -> ClientId {
        self.script.appoint.clone().unwrap_or_else(|| winner.clone())
    }
}

impl President for ScriptedRoles {
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

    fn pay_speaker(&self, _view: &ClientView, salary: Resources) -> Option<Resources> {
        self.salary(salary)
    }

    fn call_speaker_election(
        &self,
        _view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        self.election(monitoring, term, candidates)
    }

    fn decide_next_speaker(&self, _view: &ClientView, winner: &ClientId) -> ClientId {
        self.appoint(winner)
    }
}

impl Speaker for ScriptedRoles {
    fn decide_agenda(&self, view: &ClientView, proposed: Option<&str>) -> Option<String> {
        BaseSpeaker.decide_agenda(view, proposed)
    }

    fn decide_vote(&self, view: &ClientView, rule: &str, candidates: &[ClientId]) -> Option<(String, Vec<ClientId>)> {
        if self.script.withhold_vote {
            return None;
        }
        BaseSpeaker.decide_vote(view, rule, candidates)
    }

    fn decide_announcement(&self, view: &ClientView, rule: &str, result: bool) -> Option<(String, bool)> {
        BaseSpeaker.decide_announcement(view, rule, result)
    }

    fn pay_judge(&self, _view: &ClientView, salary: Resources) -> Option<Resources> {
        self.salary(salary)
    }

    fn call_judge_election(
        &self,
        _view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        self.election(monitoring, term, candidates)
    }

    fn decide_next_judge(&self, _view: &ClientView, winner: &ClientId) -> ClientId {
        self.appoint(winner)
    }
}

impl Judge for ScriptedRoles {
    fn inspect_history(
        &self,
        view: &ClientView,
        records: &[Accountability],
        rules: &RuleCatalogue,
    ) -> Option<BTreeMap<ClientId, ComplianceReport>> {
        BaseJudge.inspect_history(view, records, rules)
    }

    fn pardon_clients(&self, view: &ClientView, scores: &BTreeMap<ClientId, u32>) -> BTreeSet<ClientId> {
        BaseJudge.pardon_clients(view, scores)
    }

    fn pay_president(&self, _view: &ClientView, salary: Resources) -> Option<Resources> {
        self.salary(salary)
    }

    fn call_president_election(
        &self,
        _view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings {
        self.election(monitoring, term, candidates)
    }

    fn decide_next_president(&self, _view: &ClientView, winner: &ClientId) -> ClientId {
        self.appoint(winner)
    }
}
