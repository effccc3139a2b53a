//! Authoritative per-run game state shared by every branch during a cycle.

use std::collections::BTreeMap;

use contracts::{
    Accountability, ClientId, ClientInfo, ClientView, Resources, Role, RoleAssignment,
};
use serde::Serialize;

use crate::ledger::CommonPool;
use crate::rules::RuleCatalogue;

#[derive(Debug, Clone, Serialize)]
pub struct GameState {
    pub turn: u64,
    pub client_infos: BTreeMap<ClientId, ClientInfo>,
    pub common_pool: CommonPool,
    pub roles_budget: BTreeMap<Role, Resources>,
    pub turns_in_power: BTreeMap<Role, u64>,
    pub history: AccountabilityLog,
    pub roles: RoleAssignment,
}

impl GameState {
    pub fn new(
        client_infos: BTreeMap<ClientId, ClientInfo>,
        common_pool: Resources,
        roles: RoleAssignment,
        roles_budget: BTreeMap<Role, Resources>,
    ) -> Self {
        Self {
            turn: 0,
            client_infos,
            common_pool: CommonPool::new(common_pool),
            roles_budget,
            turns_in_power: Role::ALL.into_iter().map(|role| (role, 0)).collect(),
            history: AccountabilityLog::default(),
            roles,
        }
    }

    /// Living clients in id order.
    pub fn living_clients(&self) -> Vec<ClientId> {
        self.client_infos
            .iter()
            .filter(|(_, info)| info.is_alive())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_alive(&self, client: &ClientId) -> bool {
        self.client_infos
            .get(client)
            .map(ClientInfo::is_alive)
            .unwrap_or(false)
    }

    pub fn resources_of(&self, client: &ClientId) -> Resources {
        self.client_infos
            .get(client)
            .map(|info| info.resources)
            .unwrap_or(0)
    }

    pub fn turns_in_power(&self, role: Role) -> u64 {
        self.turns_in_power.get(&role).copied().unwrap_or(0)
    }

    pub fn client_view(&self, client: &ClientId, rules: &RuleCatalogue) -> ClientView {
        ClientView {
            turn: self.turn,
            client_id: client.clone(),
            own: self.client_infos.get(client).cloned().unwrap_or_default(),
            common_pool: self.common_pool.balance(),
            roles: self.roles.clone(),
            turns_in_power: self.turns_in_power.clone(),
            living_clients: self.living_clients(),
            rules_in_play: rules.in_play_names(),
            available_rules: rules.available_names(),
        }
    }
}

/// Append-only, per-turn accountability log. Records cannot be edited once
/// appended.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccountabilityLog {
    by_turn: BTreeMap<u64, Vec<Accountability>>,
}

impl AccountabilityLog {
    pub fn append(&mut self, record: Accountability) {
        self.by_turn.entry(record.turn).or_default().push(record);
    }

    pub fn turn(&self, turn: u64) -> &[Accountability] {
        self.by_turn
            .get(&turn)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_turn.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
