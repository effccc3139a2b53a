use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use contracts::{
    ClientId, ClientView, CommunicationContent, CommunicationField, Message, ResourceReport,
    Resources, Role, VoteChoice,
};

use super::{BaseJudge, BasePresident, BaseSpeaker};
use crate::roles::{Island, Judge, President, Speaker};

/// Private resources below which an island asks the common pool for help.
pub const COMFORT_LEVEL: Resources = 30;

/// What an island has learned from the messages it received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IslandMemory {
    pub last_tax: Resources,
    pub last_allocation: Resources,
    pub last_sanction: Resources,
    pub distrusted: BTreeSet<ClientId>,
    pub pardoned: bool,
    pub messages_received: u64,
}

/// Honest, cooperative island.
pub struct BaseIsland {
    id: ClientId,
    memory: Mutex<IslandMemory>,
    president: Arc<BasePresident>,
    speaker: Arc<BaseSpeaker>,
    judge: Arc<BaseJudge>,
}

impl BaseIsland {
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            memory: Mutex::new(IslandMemory::default()),
            president: Arc::new(BasePresident),
            speaker: Arc::new(BaseSpeaker),
            judge: Arc::new(BaseJudge),
        }
    }

    pub fn id(&self) -> &ClientId {
        &self.id
    }

    pub fn memory(&self) -> IslandMemory {
        self.memory
            .lock()
            .map(|memory| memory.clone())
            .unwrap_or_default()
    }

    fn distrusted(&self) -> BTreeSet<ClientId> {
        self.memory().distrusted
    }
}

impl Island for BaseIsland {
    fn resource_report(&self, view: &ClientView) -> ResourceReport {
        ResourceReport::declared(view.own.resources)
    }

    fn rule_proposal(&self, _view: &ClientView) -> Option<String> {
        None
    }

    fn vote_for_rule(&self, _view: &ClientView, _rule: &str) -> VoteChoice {
        VoteChoice::For
    }

    /// Trusted candidates first, then those announced as misbehaving, each
    /// group in id order.
    fn vote_for_election(&self, _view: &ClientView, _role: Role, candidates: &[ClientId]) -> Vec<ClientId> {
        let distrusted = self.distrusted();
        let (mut trusted, mut flagged): (Vec<ClientId>, Vec<ClientId>) = candidates
            .iter()
            .cloned()
            .partition(|candidate| !distrusted.contains(candidate));
        trusted.sort();
        flagged.sort();
        trusted.extend(flagged);
        trusted
    }

    fn common_pool_resource_request(&self, view: &ClientView) -> Resources {
        (COMFORT_LEVEL - view.own.resources).max(0)
    }

    fn tax_contribution(&self, view: &ClientView, expected: Resources) -> Resources {
        expected.min(view.own.resources).max(0)
    }

    fn sanction_payment(&self, _view: &ClientView, expected: Resources) -> Resources {
        expected
    }

    fn monitor_iigo_role(&self, _view: &ClientView, _role: Role) -> bool {
        true
    }

    fn decide_monitoring_announcement(&self, _view: &ClientView, _role: Role, result: bool) -> Option<bool> {
        Some(result)
    }

    fn receive_communication(&self, _sender: &ClientId, content: &Message) {
        let Ok(mut memory) = self.memory.lock() else {
            return;
        };
        memory.messages_received += 1;
        if let Some(CommunicationContent::Integer(amount)) = content.get(&CommunicationField::TaxAmount) {
            memory.last_tax = *amount;
        }
        if let Some(CommunicationContent::Integer(amount)) = content.get(&CommunicationField::AllocationAmount) {
            memory.last_allocation = *amount;
        }
        if let Some(CommunicationContent::Integer(amount)) = content.get(&CommunicationField::SanctionAmount) {
            memory.last_sanction = *amount;
        }
        if let Some(CommunicationContent::Text(client)) = content.get(&CommunicationField::PardonedClient) {
            if client.as_str() == self.id.as_str() {
                memory.pardoned = true;
            }
        }
        if let (
            Some(CommunicationContent::Text(client)),
            Some(CommunicationContent::Boolean(behaved)),
        ) = (
            content.get(&CommunicationField::MonitoredClient),
            content.get(&CommunicationField::MonitoringResult),
        ) {
            let client = ClientId::new(client.clone());
            if *behaved {
                memory.distrusted.remove(&client);
            } else {
                memory.distrusted.insert(client);
            }
        }
    }

    fn president(&self) -> Option<Arc<dyn President>> {
        Some(self.president.clone())
    }

    fn speaker(&self) -> Option<Arc<dyn Speaker>> {
        Some(self.speaker.clone())
    }

    fn judge(&self) -> Option<Arc<dyn Judge>> {
        Some(self.judge.clone())
    }
}
