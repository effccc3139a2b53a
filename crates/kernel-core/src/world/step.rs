use super::*;

use contracts::{WorldStatus, SCHEMA_VERSION_V1};
use tracing::{debug, error, info, warn};

use crate::orchestration::GovernanceError;

impl IslandWorld {
    pub fn status(&self) -> WorldStatus {
        WorldStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: self.config.run_id.clone(),
            current_turn: self.state.turn,
            max_turns: self.config.max_turns,
            living_clients: self.state.living_clients().len(),
            common_pool: self.state.common_pool.balance(),
            roles: self.state.roles.clone(),
            halted: self.halted.clone(),
        }
    }

    /// Advance one turn. Returns `Ok(false)` once the run is complete or
    /// halted. A fatal governance error halts the world and is returned.
    pub fn step(&mut self) -> Result<bool, GovernanceError> {
        if self.halted.is_some() || self.status().is_complete() {
            return Ok(false);
        }
        let turn = self.state.turn;
        self.harvest(turn);

        let outcome = match self.cycle.run_cycle(&mut self.state) {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(turn, %err, "governance halted");
                self.halted = Some(err.to_string());
                return Err(err);
            }
        };
        let taxes_collected = self.cycle.collect_taxes(&mut self.state);
        self.apply_cost_of_living();
        self.update_life_status();

        let record = TurnRecord {
            turn,
            success: outcome.success,
            description: outcome.description.clone(),
            roles: self.state.roles.clone(),
            common_pool: self.state.common_pool.balance(),
            living_clients: self.state.living_clients().len(),
            taxes_collected,
        };
        info!(
            turn,
            success = record.success,
            pool = record.common_pool,
            living = record.living_clients,
            "turn committed"
        );
        self.turn_log.push(record);
        self.last_outcome = Some(outcome);
        self.state.turn += 1;
        Ok(true)
    }

    pub fn step_n(&mut self, n: u64) -> Result<u64, GovernanceError> {
        let mut committed = 0_u64;
        for _ in 0..n {
            if !self.step()? {
                break;
            }
            committed += 1;
        }
        Ok(committed)
    }

    pub fn run_to_turn(&mut self, turn: u64) -> Result<u64, GovernanceError> {
        let mut committed = 0_u64;
        while self.state.turn < turn {
            if !self.step()? {
                break;
            }
            committed += 1;
        }
        Ok(committed)
    }

    fn harvest(&mut self, turn: u64) {
        let living = self.state.living_clients();
        for (position, client) in living.iter().enumerate() {
            let amount = harvest_amount(&self.config, turn, position);
            if let Some(info) = self.state.client_infos.get_mut(client) {
                info.resources += amount;
            }
        }
        debug!(turn, clients = living.len(), "harvest gathered");
    }

    fn apply_cost_of_living(&mut self) {
        let cost = self.config.cost_of_living;
        for info in self.state.client_infos.values_mut() {
            if info.is_alive() {
                info.resources = (info.resources - cost).max(0);
            }
        }
    }

    fn update_life_status(&mut self) {
        let threshold = self.config.minimum_resource_threshold;
        let max_critical = self.config.max_critical_consecutive_turns;
        for (client, info) in &mut self.state.client_infos {
            if !info.is_alive() {
                continue;
            }
            let (status, critical_turns) = next_life_status(
                info.resources,
                info.critical_consecutive_turns,
                threshold,
                max_critical,
            );
            if status == LifeStatus::Dead {
                warn!(client = %client, critical_turns, "island died");
            }
            info.life_status = status;
            info.critical_consecutive_turns = critical_turns;
        }
    }
}
