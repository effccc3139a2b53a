//! Strategy seams for islands and the three institutional roles.
//!
//! Every decision receives an owned snapshot of the public state and returns a
//! value; nothing here can reach into the ledger or the catalogue directly.
//! Custom strategies usually wrap the `Base*` implementations in
//! [`crate::base`] and override a handful of methods.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use contracts::{
    Accountability, ClientId, ClientView, ElectionSettings, Message, ResourceReport, Resources,
    Role, VoteChoice,
};

use crate::rules::{ComplianceReport, RuleCatalogue};

pub type IslandRegistry = BTreeMap<ClientId, Arc<dyn Island>>;

/// How long the current holder of a role has served against its term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermStatus {
    pub turns_in_power: u64,
    pub term_length: u64,
}

impl TermStatus {
    pub fn expired(&self) -> bool {
        self.turns_in_power >= self.term_length
    }
}

pub trait Island: Send + Sync {
    fn resource_report(&self, view: &ClientView) -> ResourceReport;

    /// Name of a catalogue rule this island wants voted on.
    fn rule_proposal(&self, view: &ClientView) -> Option<String>;

    fn vote_for_rule(&self, view: &ClientView, rule: &str) -> VoteChoice;

    /// Candidates in order of preference. An empty ranking abstains.
    fn vote_for_election(&self, view: &ClientView, role: Role, candidates: &[ClientId]) -> Vec<ClientId>;

    fn common_pool_resource_request(&self, view: &ClientView) -> Resources;

    fn tax_contribution(&self, view: &ClientView, expected: Resources) -> Resources;

    fn sanction_payment(&self, view: &ClientView, expected: Resources) -> Resources;

    /// Whether this island, acting as an observer, checks the holder of `role`.
    fn monitor_iigo_role(&self, view: &ClientView, role: Role) -> bool;

    /// `None` keeps the monitoring result private.
    fn decide_monitoring_announcement(&self, view: &ClientView, role: Role, result: bool) -> Option<bool>;

    fn receive_communication(&self, sender: &ClientId, content: &Message);

    fn president(&self) -> Option<Arc<dyn President>>;

    fn speaker(&self) -> Option<Arc<dyn Speaker>>;

    fn judge(&self) -> Option<Arc<dyn Judge>>;
}

pub trait President: Send + Sync {
    /// Expected tax per client. `None` declines to levy tax this turn.
    fn set_tax_amount(
        &self,
        view: &ClientView,
        reports: &BTreeMap<ClientId, ResourceReport>,
    ) -> Option<BTreeMap<ClientId, Resources>>;

    fn evaluate_allocation_requests(
        &self,
        view: &ClientView,
        requests: &BTreeMap<ClientId, Resources>,
        available: Resources,
    ) -> Option<BTreeMap<ClientId, Resources>>;

    fn pick_rule_to_vote(&self, view: &ClientView, proposals: &[String]) -> Option<String>;

    /// `None` declines to pay.
    fn pay_speaker(&self, view: &ClientView, salary: Resources) -> Option<Resources>;

    fn call_speaker_election(
        &self,
        view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings;

    fn decide_next_speaker(&self, view: &ClientView, winner: &ClientId) -> ClientId;
}

pub trait Speaker: Send + Sync {
    fn decide_agenda(&self, view: &ClientView, proposed: Option<&str>) -> Option<String>;

    /// Rule and electorate for the vote, or `None` to skip it.
    fn decide_vote(&self, view: &ClientView, rule: &str, candidates: &[ClientId]) -> Option<(String, Vec<ClientId>)>;

    fn decide_announcement(&self, view: &ClientView, rule: &str, result: bool) -> Option<(String, bool)>;

    fn pay_judge(&self, view: &ClientView, salary: Resources) -> Option<Resources>;

    fn call_judge_election(
        &self,
        view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings;

    fn decide_next_judge(&self, view: &ClientView, winner: &ClientId) -> ClientId;
}

pub trait Judge: Send + Sync {
    /// Evaluate last turn's accountability records per client.
    fn inspect_history(
        &self,
        view: &ClientView,
        records: &[Accountability],
        rules: &RuleCatalogue,
    ) -> Option<BTreeMap<ClientId, ComplianceReport>>;

    fn pardon_clients(&self, view: &ClientView, scores: &BTreeMap<ClientId, u32>) -> BTreeSet<ClientId>;

    fn pay_president(&self, view: &ClientView, salary: Resources) -> Option<Resources>;

    fn call_president_election(
        &self,
        view: &ClientView,
        monitoring: bool,
        term: TermStatus,
        candidates: &[ClientId],
    ) -> ElectionSettings;

    fn decide_next_president(&self, view: &ClientView, winner: &ClientId) -> ClientId;
}
