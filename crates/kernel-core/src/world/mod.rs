//! Turn-driven island world: owns the game state and runs one harvest, one
//! governance cycle, tax collection and the survival update per turn.

mod init;
mod step;

use std::sync::Arc;

use contracts::{ClientId, CycleOutcome, LifeStatus, Resources, RunConfig, TurnRecord};

use crate::orchestration::GovernanceCycle;
use crate::state::GameState;

pub struct IslandWorld {
    config: Arc<RunConfig>,
    state: GameState,
    cycle: GovernanceCycle,
    turn_log: Vec<TurnRecord>,
    last_outcome: Option<CycleOutcome>,
    halted: Option<String>,
}

impl IslandWorld {
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn cycle(&self) -> &GovernanceCycle {
        &self.cycle
    }

    pub fn turn_log(&self) -> &[TurnRecord] {
        &self.turn_log
    }

    pub fn last_outcome(&self) -> Option<&CycleOutcome> {
        self.last_outcome.as_ref()
    }

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.config.run_id
    }
}

/// Resources a living client gathers at the start of `turn`. Depends only on
/// the seed, the turn and the client's position.
pub fn harvest_amount(config: &RunConfig, turn: u64, position: usize) -> Resources {
    let stream = (turn << 16) ^ position as u64;
    sample_range(config.seed, stream, config.harvest_min, config.harvest_max)
}

/// Next life status after the end-of-turn balance is known.
pub fn next_life_status(
    resources: Resources,
    critical_turns: u32,
    threshold: Resources,
    max_critical: u32,
) -> (LifeStatus, u32) {
    if resources >= threshold {
        return (LifeStatus::Alive, 0);
    }
    let critical_turns = critical_turns.saturating_add(1);
    if critical_turns >= max_critical {
        (LifeStatus::Dead, critical_turns)
    } else {
        (LifeStatus::Critical, critical_turns)
    }
}

fn initial_role_holder(slot: usize, island_count: usize) -> ClientId {
    ClientId::island(slot % island_count.max(1) + 1)
}

fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut value = seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    value ^= value.rotate_left(29);
    value = value.wrapping_mul(0x517C_C1B7_2722_0A95);
    value ^ (value >> 31)
}

fn sample_range(seed: u64, stream: u64, min: i64, max: i64) -> i64 {
    if max <= min {
        return min;
    }
    let span = (max - min + 1) as u64;
    min + (mix_seed(seed, stream) % span) as i64
}
