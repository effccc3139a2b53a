use super::*;

use contracts::{ClientInfo, ConfigError, Role, RoleAssignment};
use tracing::info;

use crate::roles::IslandRegistry;
use crate::rules::RuleCatalogue;
use crate::strategies::build_island;

impl IslandWorld {
    /// Validate `config` and build islands from its strategy list.
    pub fn new(config: RunConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let islands = (0..config.island_count)
            .map(|index| {
                let id = ClientId::island(index + 1);
                (id.clone(), build_island(config.strategy_for(index), id))
            })
            .collect();
        Ok(Self::with_islands(config, islands))
    }

    /// World over caller-supplied islands. `config` is trusted as given.
    pub fn with_islands(config: RunConfig, islands: IslandRegistry) -> Self {
        let clients = (1..=config.island_count)
            .map(|index| (ClientId::island(index), ClientInfo::new(config.initial_resources)))
            .collect();
        let roles = RoleAssignment {
            president: initial_role_holder(0, config.island_count),
            speaker: initial_role_holder(1, config.island_count),
            judge: initial_role_holder(2, config.island_count),
        };
        let budgets = Role::ALL
            .into_iter()
            .map(|role| {
                let budget = config
                    .governance
                    .initial_role_budgets
                    .get(&role)
                    .copied()
                    .unwrap_or(0);
                (role, budget)
            })
            .collect();
        let state = GameState::new(clients, config.initial_common_pool, roles, budgets);

        let governance = Arc::new(config.governance.clone());
        let cycle = GovernanceCycle::new(governance, islands, RuleCatalogue::with_defaults());
        info!(
            run_id = %config.run_id,
            seed = config.seed,
            islands = config.island_count,
            roles = %state.roles,
            "island world initialised"
        );

        Self {
            config: Arc::new(config),
            state,
            cycle,
            turn_log: Vec::new(),
            last_outcome: None,
            halted: None,
        }
    }
}
