//! In-process engine facade over the island world, plus the HTTP server.

mod server;

use std::collections::BTreeMap;

use contracts::{
    Accountability, ConfigError, CycleOutcome, Resources, Role, RoleAssignment, RunConfig,
    TurnRecord, WorldStatus, SCHEMA_VERSION_V1,
};
use kernel_core::{GovernanceError, IslandWorld};
use serde::Serialize;
use tracing::info;

pub use server::{router, serve, AppState, ServerError};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RolesSummary {
    pub schema_version: String,
    pub roles: RoleAssignment,
    pub turns_in_power: BTreeMap<Role, u64>,
    pub budgets: BTreeMap<Role, Resources>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RulesSummary {
    pub schema_version: String,
    pub in_play: Vec<String>,
    pub available: Vec<String>,
}

pub struct EngineApi {
    world: IslandWorld,
}

impl EngineApi {
    pub fn from_config(config: RunConfig) -> Result<Self, ConfigError> {
        let world = IslandWorld::new(config)?;
        info!(run_id = world.run_id(), "engine created");
        Ok(Self { world })
    }

    pub fn from_world(world: IslandWorld) -> Self {
        Self { world }
    }

    pub fn run_id(&self) -> &str {
        self.world.run_id()
    }

    pub fn config(&self) -> &RunConfig {
        self.world.config()
    }

    pub fn world(&self) -> &IslandWorld {
        &self.world
    }

    pub fn status(&self) -> WorldStatus {
        self.world.status()
    }

    pub fn step(&mut self, steps: u64) -> Result<(WorldStatus, u64), GovernanceError> {
        let committed = self.world.step_n(steps)?;
        Ok((self.world.status(), committed))
    }

    pub fn run_to_turn(&mut self, turn: u64) -> Result<(WorldStatus, u64), GovernanceError> {
        let committed = self.world.run_to_turn(turn)?;
        Ok((self.world.status(), committed))
    }

    pub fn turns(&self) -> &[TurnRecord] {
        self.world.turn_log()
    }

    pub fn turn(&self, turn: u64) -> Option<&TurnRecord> {
        self.world.turn_log().iter().find(|record| record.turn == turn)
    }

    pub fn history(&self, turn: u64) -> &[Accountability] {
        self.world.state().history.turn(turn)
    }

    pub fn last_outcome(&self) -> Option<&CycleOutcome> {
        self.world.last_outcome()
    }

    pub fn roles(&self) -> RolesSummary {
        let state = self.world.state();
        RolesSummary {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            roles: state.roles.clone(),
            turns_in_power: state.turns_in_power.clone(),
            budgets: state.roles_budget.clone(),
        }
    }

    pub fn rules(&self) -> RulesSummary {
        let rules = self.world.cycle().rules();
        RulesSummary {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            in_play: rules.in_play_names(),
            available: rules.available_names(),
        }
    }
}
