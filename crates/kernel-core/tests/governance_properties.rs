use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{
    ActionCosts, ClientId, ClientInfo, GovernanceAction, GovernanceConfig, Role, RoleAssignment,
    RunConfig, StrategyKind, VotingMethod,
};
use kernel_core::base::{BaseIsland, BaseSpeaker};
use kernel_core::context::CycleContext;
use kernel_core::legislature::Legislature;
use kernel_core::monitor::Monitor;
use kernel_core::voting::Election;
use kernel_core::{
    CommonPool, DecisionGuard, GameState, GovernanceCycle, Island, IslandRegistry, IslandWorld,
    RuleCatalogue, RuleError,
};
use proptest::prelude::*;

fn islands(count: usize) -> IslandRegistry {
    (1..=count)
        .map(|index| {
            let id = ClientId::island(index);
            let island: Arc<dyn Island> = Arc::new(BaseIsland::new(id.clone()));
            (id, island)
        })
        .collect()
}

fn state(count: usize, pool: i64) -> GameState {
    let clients = (1..=count)
        .map(|index| (ClientId::island(index), ClientInfo::new(50)))
        .collect();
    let roles = RoleAssignment {
        president: ClientId::island(1),
        speaker: ClientId::island(2),
        judge: ClientId::island(3),
    };
    let budgets = Role::ALL.into_iter().map(|role| (role, 100)).collect();
    GameState::new(clients, pool, roles, budgets)
}

fn inline_governance(costs: ActionCosts) -> GovernanceConfig {
    GovernanceConfig {
        action_costs: costs,
        decision_timeout_ms: 0,
        ..GovernanceConfig::default()
    }
}

#[test]
fn pull_into_play_rejects_a_rule_already_in_play() {
    let mut catalogue = RuleCatalogue::with_defaults();
    assert_eq!(
        catalogue.pull_into_play("island_must_pay_tax"),
        Err(RuleError::NotInAvailable("island_must_pay_tax".to_string()))
    );
    assert!(catalogue.is_in_play("island_must_pay_tax"));
}

#[test]
fn degenerate_votes_produce_empty_ballot_boxes() {
    let mut game = state(3, 0);
    let registry = islands(3);
    let config = inline_governance(ActionCosts::uniform(0));
    let mut rules = RuleCatalogue::with_defaults();
    let mut monitor = Monitor::default();
    let guard = DecisionGuard::inline();
    let mut outbox = Vec::new();
    let ctx = CycleContext {
        state: &mut game,
        config: &config,
        islands: &registry,
        rules: &mut rules,
        monitor: &mut monitor,
        guard: &guard,
        outbox: &mut outbox,
    };
    let legislature = Legislature::new(ClientId::island(2), Arc::new(BaseSpeaker));
    let everyone: Vec<ClientId> = (1..=3).map(ClientId::island).collect();

    let unnamed = legislature.run_vote(&ctx, "", &everyone);
    assert!(unnamed.is_empty());
    assert!(!unnamed.count_votes_majority());

    let unattended = legislature.run_vote(&ctx, "allocations_must_be_made", &[]);
    assert!(unattended.is_empty());

    let attended = legislature.run_vote(&ctx, "allocations_must_be_made", &everyone);
    assert_eq!(attended.ballots.len(), 3);
    assert!(attended.count_votes_majority());
}

#[test]
fn plurality_two_one_zero_elects_the_leader() {
    let candidates: Vec<ClientId> = (1..=3).map(ClientId::island).collect();
    let mut election = Election::propose(Role::President, VotingMethod::Plurality)
        .open_ballot(candidates.clone(), candidates.clone());
    election.record_ballot(ClientId::island(1), vec![ClientId::island(2)]);
    election.record_ballot(ClientId::island(2), vec![ClientId::island(2)]);
    election.record_ballot(ClientId::island(3), vec![ClientId::island(1)]);
    assert_eq!(election.close_ballot(), Some(ClientId::island(2)));
}

#[test]
fn three_way_tie_goes_to_the_lowest_id() {
    let candidates: Vec<ClientId> = (1..=3).map(ClientId::island).collect();
    for method in [VotingMethod::Plurality, VotingMethod::BordaCount] {
        let mut election = Election::propose(Role::Speaker, method)
            .open_ballot(candidates.clone(), candidates.clone());
        election.record_ballot(ClientId::island(1), vec![ClientId::island(3)]);
        election.record_ballot(ClientId::island(2), vec![ClientId::island(2)]);
        election.record_ballot(ClientId::island(3), vec![ClientId::island(1)]);
        assert_eq!(election.close_ballot(), Some(ClientId::island(1)));
    }
}

#[test]
fn ties_in_large_electorates_follow_island_index() {
    let candidates: Vec<ClientId> = (1..=12).map(ClientId::island).collect();
    let mut election = Election::propose(Role::President, VotingMethod::Plurality)
        .open_ballot(candidates.clone(), candidates.clone());
    election.record_ballot(ClientId::island(1), vec![ClientId::island(10)]);
    election.record_ballot(ClientId::island(2), vec![ClientId::island(2)]);
    election.record_ballot(ClientId::island(3), vec![ClientId::island(11)]);
    assert_eq!(election.close_ballot(), Some(ClientId::island(2)));
}

#[derive(Debug, Clone, Copy)]
enum PoolOp {
    Deposit(i64),
    Withdraw(i64),
}

fn pool_op() -> impl Strategy<Value = PoolOp> {
    prop_oneof![
        (0_i64..200).prop_map(PoolOp::Deposit),
        (0_i64..300).prop_map(PoolOp::Withdraw),
    ]
}

#[derive(Debug, Clone, Copy)]
enum CatalogueOp {
    Into(usize),
    OutOf(usize),
}

proptest! {
    #[test]
    fn ledger_balance_is_conserved(initial in 0_i64..500, ops in prop::collection::vec(pool_op(), 0..40)) {
        let mut pool = CommonPool::new(initial);
        let mut expected = initial;
        for op in ops {
            match op {
                PoolOp::Deposit(amount) => {
                    pool.deposit(amount, "deposit").expect("non-negative deposit");
                    expected += amount;
                }
                PoolOp::Withdraw(amount) => {
                    let before = pool.balance();
                    match pool.withdraw(amount, "withdraw") {
                        Ok(debited) => {
                            prop_assert_eq!(debited, amount);
                            expected -= amount;
                        }
                        Err(_) => prop_assert_eq!(pool.balance(), before),
                    }
                }
            }
            prop_assert!(pool.balance() >= 0);
        }
        prop_assert_eq!(pool.balance(), expected);
    }

    #[test]
    fn catalogue_partitions_stay_disjoint(
        ops in prop::collection::vec(
            prop_oneof![
                (0_usize..16).prop_map(CatalogueOp::Into),
                (0_usize..16).prop_map(CatalogueOp::OutOf),
            ],
            0..40,
        )
    ) {
        let mut catalogue = RuleCatalogue::with_defaults();
        let mut names = catalogue.in_play_names();
        names.extend(catalogue.available_names());
        let total = names.len();
        for op in ops {
            match op {
                CatalogueOp::Into(index) => {
                    let name = &names[index % total];
                    let was_in_play = catalogue.is_in_play(name);
                    let result = catalogue.pull_into_play(name);
                    if was_in_play {
                        prop_assert!(result.is_err());
                    }
                }
                CatalogueOp::OutOf(index) => {
                    let _ = catalogue.pull_out_of_play(&names[index % total]);
                }
            }
            for name in &names {
                prop_assert!(catalogue.contains(name));
                prop_assert!(!(catalogue.is_in_play(name) && catalogue.is_available(name)));
            }
        }
    }

    #[test]
    fn plurality_winner_is_the_lowest_id_among_leaders(votes in prop::collection::vec(0_usize..3, 1..12)) {
        let candidates: Vec<ClientId> = (1..=3).map(ClientId::island).collect();
        let mut election = Election::propose(Role::Judge, VotingMethod::Plurality)
            .open_ballot(candidates.clone(), candidates.clone());
        let mut tally = [0_u32; 3];
        for (voter, choice) in votes.iter().enumerate() {
            tally[*choice] += 1;
            election.record_ballot(ClientId::island(voter + 1), vec![candidates[*choice].clone()]);
        }
        let best = tally.iter().copied().max().unwrap_or(0);
        let expected = tally.iter().position(|count| *count == best).map(|index| candidates[index].clone());
        prop_assert_eq!(election.close_ballot(), expected);
    }

    #[test]
    fn unaffordable_first_action_mutates_nothing(pool in 0_i64..20) {
        let mut costs = ActionCosts::uniform(0);
        costs.set(GovernanceAction::BroadcastTaxation, 20);
        let mut game = state(4, pool);
        let mut cycle = GovernanceCycle::new(
            Arc::new(inline_governance(costs)),
            islands(4),
            RuleCatalogue::with_defaults(),
        );
        let roles = game.roles.clone();

        let outcome = cycle.run_cycle(&mut game).expect("base islands fill every role");

        prop_assert!(!outcome.success);
        prop_assert_eq!(outcome.failed_action, Some(GovernanceAction::BroadcastTaxation));
        prop_assert_eq!(game.common_pool.balance(), pool);
        prop_assert!(game.common_pool.entries().is_empty());
        prop_assert_eq!(game.roles, roles);
        let resources: BTreeMap<_, _> = game.client_infos.iter().map(|(id, info)| (id.clone(), info.resources)).collect();
        prop_assert!(resources.values().all(|amount| *amount == 50));
    }

    #[test]
    fn same_seed_same_history(seed in 1_u64..10_000, turns in 1_u64..8) {
        let config = RunConfig {
            seed,
            island_count: 5,
            strategies: vec![StrategyKind::Cooperative, StrategyKind::Selfish, StrategyKind::Ambitious],
            governance: inline_governance(ActionCosts::default()),
            ..RunConfig::default()
        };
        let mut first = IslandWorld::new(config.clone()).expect("valid config");
        let mut second = IslandWorld::new(config).expect("valid config");
        first.step_n(turns).expect("no fatal error");
        second.step_n(turns).expect("no fatal error");
        prop_assert_eq!(first.turn_log(), second.turn_log());
    }
}
