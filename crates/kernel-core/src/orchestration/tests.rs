use super::*;

use std::time::Duration;

use contracts::{ActionCosts, LifeStatus, StrategyKind, VoteChoice};

use crate::strategies::build_island;
use crate::test_support::{base_registry, free_config, game_state, Script, ScriptedIsland};

fn cycle_with(config: GovernanceConfig, islands: IslandRegistry) -> GovernanceCycle {
    GovernanceCycle::new(Arc::new(config), islands, RuleCatalogue::with_defaults())
}

fn scripted(registry: &mut IslandRegistry, index: usize, script: Script) -> Arc<ScriptedIsland> {
    let id = ClientId::island(index);
    let island = Arc::new(ScriptedIsland::new(id.clone(), script));
    registry.insert(id, island.clone());
    island
}

fn announced(outcome: &CycleOutcome, field: CommunicationField) -> Vec<&CommunicationContent> {
    outcome
        .broadcasts
        .iter()
        .filter_map(|broadcast| broadcast.content.get(&field))
        .collect()
}

// ---------------------------------------------------------------------------
// Budget
// ---------------------------------------------------------------------------

#[test]
fn first_action_shortfall_fails_without_touching_the_ledger() {
    let mut config = free_config();
    config.action_costs = ActionCosts::uniform(3);
    let mut state = game_state(4, 50, 2);
    let mut cycle = cycle_with(config, base_registry(4));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(!outcome.success);
    assert_eq!(outcome.failed_action, Some(GovernanceAction::BroadcastTaxation));
    assert!(outcome.description.contains("broadcast_taxation"), "{}", outcome.description);
    assert_eq!(state.common_pool.balance(), 2);
    assert!(state.common_pool.entries().is_empty());
}

#[test]
fn insufficient_election_budget_keeps_roles() {
    let mut config = free_config();
    config.action_costs.set(GovernanceAction::BroadcastTaxation, 75);
    for action in GovernanceAction::ELECTIONS {
        config.action_costs.set(action, 10);
    }
    let mut state = game_state(4, 100, 100);
    let before = state.roles.clone();
    let mut cycle = cycle_with(config, base_registry(4));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(!outcome.success);
    assert_eq!(outcome.failed_action, None);
    assert!(
        outcome.description.starts_with("insufficient budget to run elections"),
        "{}",
        outcome.description
    );
    assert_eq!(state.common_pool.balance(), 25);
    assert_eq!(state.roles, before);
}

#[test]
fn budget_increment_rule_credits_the_role_budget() {
    let mut rules = RuleCatalogue::with_defaults();
    rules.pull_into_play("increment_budget_judge").expect("available");
    let mut state = game_state(3, 50, 100);
    let mut cycle = GovernanceCycle::new(Arc::new(free_config()), base_registry(3), rules);

    cycle.run_cycle(&mut state).expect("cycle runs");

    assert_eq!(state.roles_budget[&Role::Judge], 110);
    assert_eq!(state.roles_budget[&Role::President], 100);
}

// ---------------------------------------------------------------------------
// Role resolution
// ---------------------------------------------------------------------------

#[test]
fn holder_without_role_implementation_is_an_error() {
    let mut islands = base_registry(3);
    scripted(
        &mut islands,
        2,
        Script {
            without_roles: true,
            ..Script::default()
        },
    );
    let mut state = game_state(3, 50, 100);
    let mut cycle = cycle_with(free_config(), islands);

    let err = cycle.run_cycle(&mut state).expect_err("speaker has no implementation");
    assert_eq!(
        err,
        GovernanceError::MissingRoleImplementation {
            role: Role::Speaker,
            client: ClientId::island(2),
        }
    );
}

#[test]
fn unregistered_holder_is_an_error() {
    let mut islands = base_registry(3);
    islands.remove(&ClientId::island(1));
    let mut state = game_state(3, 50, 100);
    let mut cycle = cycle_with(free_config(), islands);

    let err = cycle.run_cycle(&mut state).expect_err("president is unknown");
    assert!(matches!(err, GovernanceError::UnknownRoleHolder { role: Role::President, .. }));
}

#[test]
fn dead_role_holder_is_replaced_by_lowest_living_island() {
    let mut state = game_state(4, 50, 100);
    if let Some(info) = state.client_infos.get_mut(&ClientId::island(1)) {
        info.life_status = LifeStatus::Dead;
    }
    let mut cycle = cycle_with(free_config(), base_registry(4));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert_eq!(state.roles.president, ClientId::island(2));
}

#[test]
fn no_living_clients_fails_the_cycle() {
    let mut state = game_state(2, 50, 100);
    for info in state.client_infos.values_mut() {
        info.life_status = LifeStatus::Dead;
    }
    let mut cycle = cycle_with(free_config(), base_registry(2));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");
    assert!(!outcome.success);
    assert!(state.common_pool.entries().is_empty());
}

// ---------------------------------------------------------------------------
// Full cycle
// ---------------------------------------------------------------------------

#[test]
fn full_cycle_records_reports_and_clears_the_monitor() {
    let mut state = game_state(5, 50, 200);
    let mut cycle = cycle_with(free_config(), base_registry(5));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert_eq!(outcome.description, "governance cycle completed");
    assert!(cycle.monitor().is_empty());
    assert_eq!(cycle.monitor().clear_count(), 2);
    let reporters: Vec<_> = state
        .history
        .turn(0)
        .iter()
        .filter(|record| record.values_of(VariableName::IslandActualPrivateResources).is_some())
        .map(|record| record.client_id.clone())
        .collect();
    assert_eq!(reporters.len(), 5);
    assert_eq!(cycle.caches().tax_amounts.len(), 5);
    assert_eq!(cycle.caches().tax_amounts[&ClientId::island(1)], 5);
}

#[test]
fn tenure_grows_while_no_election_is_held() {
    let mut state = game_state(3, 50, 200);
    let mut cycle = cycle_with(free_config(), base_registry(3));

    cycle.run_cycle(&mut state).expect("cycle runs");
    state.turn += 1;
    cycle.run_cycle(&mut state).expect("cycle runs");

    assert_eq!(state.turns_in_power(Role::President), 2);
}

#[test]
fn expired_terms_trigger_elections_and_reset_tenure() {
    let mut config = free_config();
    config.term_lengths = Role::ALL.into_iter().map(|role| (role, 1)).collect();
    let mut state = game_state(4, 50, 200);
    let mut cycle = cycle_with(config, base_registry(4));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    // Every base island ranks island_1 first.
    assert_eq!(state.roles.speaker, ClientId::island(1));
    assert_eq!(state.roles.judge, ClientId::island(1));
    for role in Role::ALL {
        assert_eq!(state.turns_in_power(role), 0);
    }
    assert_eq!(announced(&outcome, CommunicationField::AppointedRole).len(), 2);
}

#[test]
fn collected_taxes_land_in_the_common_pool() {
    let mut state = game_state(3, 50, 100);
    let mut cycle = cycle_with(free_config(), base_registry(3));
    cycle.run_cycle(&mut state).expect("cycle runs");

    let collected = cycle.collect_taxes(&mut state);

    assert_eq!(collected, 15);
    assert_eq!(state.common_pool.balance(), 115);
    assert_eq!(state.resources_of(&ClientId::island(2)), 45);
}

// ---------------------------------------------------------------------------
// Legislature
// ---------------------------------------------------------------------------

#[test]
fn proposed_rule_is_voted_into_play() {
    let mut islands = base_registry(3);
    scripted(
        &mut islands,
        3,
        Script {
            proposal: Some("allocations_must_be_made".into()),
            ..Script::default()
        },
    );
    let mut state = game_state(3, 50, 200);
    let mut cycle = cycle_with(free_config(), islands);

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert!(cycle.rules().is_in_play("allocations_must_be_made"));
    assert_eq!(
        announced(&outcome, CommunicationField::RuleVoteResult),
        vec![&CommunicationContent::Boolean(true)]
    );
}

#[test]
fn rejected_vote_does_not_retire_an_immutable_rule() {
    let mut islands = IslandRegistry::new();
    for index in 1..=3 {
        scripted(
            &mut islands,
            index,
            Script {
                proposal: Some("vote_result_must_be_announced".into()),
                vote: Some(VoteChoice::Against),
                ..Script::default()
            },
        );
    }
    let mut state = game_state(3, 50, 200);
    let mut cycle = cycle_with(free_config(), islands);

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert!(cycle.rules().is_in_play("vote_result_must_be_announced"));
}

// ---------------------------------------------------------------------------
// Salaries
// ---------------------------------------------------------------------------

#[test]
fn declined_salaries_leave_the_pool_alone() {
    let mut config = free_config();
    config.salaries = Role::ALL.into_iter().map(|role| (role, 5)).collect();
    let mut islands = IslandRegistry::new();
    for index in 1..=3 {
        scripted(
            &mut islands,
            index,
            Script {
                decline_salaries: true,
                ..Script::default()
            },
        );
    }
    let mut state = game_state(3, 50, 100);
    let mut cycle = cycle_with(config, islands);

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert!(state
        .common_pool
        .entries()
        .iter()
        .all(|entry| !entry.memo.starts_with("salary")));
}

#[test]
fn unpayable_salary_aborts_after_every_salary_is_attempted() {
    let mut config = free_config();
    config.salaries = Role::ALL.into_iter().map(|role| (role, 5)).collect();
    let mut state = game_state(3, 50, 12);
    let mut cycle = cycle_with(config, base_registry(3));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(!outcome.success);
    assert!(outcome.description.starts_with("cannot pay governance salaries"), "{}", outcome.description);
    assert_eq!(state.common_pool.balance(), 2);
    assert_eq!(state.resources_of(&ClientId::island(3)), 55);
    assert_eq!(state.resources_of(&ClientId::island(2)), 55);
}

// ---------------------------------------------------------------------------
// Forfeits
// ---------------------------------------------------------------------------

#[test]
fn panicking_report_is_withheld() {
    let mut islands = base_registry(3);
    let faulty = scripted(
        &mut islands,
        3,
        Script {
            panic_on_report: true,
            ..Script::default()
        },
    );
    let mut state = game_state(3, 50, 200);
    let mut cycle = cycle_with(free_config(), islands);

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert_eq!(faulty.calls("resource_report"), 1);
    let withheld = state
        .history
        .turn(0)
        .iter()
        .find(|record| {
            record.client_id == ClientId::island(3)
                && record.values_of(VariableName::HasIslandReportPrivateResources).is_some()
        })
        .expect("report recorded");
    assert_eq!(
        withheld.values_of(VariableName::HasIslandReportPrivateResources),
        Some(&[0.0][..])
    );
    assert_eq!(cycle.caches().tax_amounts[&ClientId::island(3)], 5);
}

#[test]
fn stalled_vote_counts_as_abstention() {
    let mut islands = base_registry(3);
    scripted(
        &mut islands,
        1,
        Script {
            proposal: Some("allocations_must_be_made".into()),
            ..Script::default()
        },
    );
    let slow = scripted(
        &mut islands,
        2,
        Script {
            stall_on_vote: Some(Duration::from_millis(500)),
            ..Script::default()
        },
    );
    let mut state = game_state(3, 50, 200);
    let mut cycle = cycle_with(free_config(), islands)
        .with_guard(DecisionGuard::with_timeout(Duration::from_millis(50)));

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert_eq!(slow.calls("vote_for_rule"), 1);
    assert!(cycle.rules().is_in_play("allocations_must_be_made"));
}

// ---------------------------------------------------------------------------
// Judiciary and monitoring
// ---------------------------------------------------------------------------

#[test]
fn misreporting_island_is_sanctioned_next_turn() {
    let mut islands = base_registry(3);
    islands.insert(
        ClientId::island(4),
        build_island(StrategyKind::Selfish, ClientId::island(4)),
    );
    let mut state = game_state(4, 100, 300);
    let mut cycle = cycle_with(free_config(), islands);

    cycle.run_cycle(&mut state).expect("turn 0");
    state.turn += 1;
    let outcome = cycle.run_cycle(&mut state).expect("turn 1");

    assert!(outcome.success, "{}", outcome.description);
    let offender = ClientId::island(4);
    assert_eq!(cycle.caches().sanction_amounts.get(&offender), Some(&5));
    assert_eq!(cycle.sanctions().score(&offender, 1, 3), 2);
    assert_eq!(state.resources_of(&offender), 98);
    assert!(cycle.caches().sanction_amounts.get(&ClientId::island(1)).is_none());
}

#[test]
fn self_appointing_judge_installs_itself_as_president() {
    let mut config = free_config();
    config.term_lengths = Role::ALL.into_iter().map(|role| (role, 1)).collect();
    let mut islands = base_registry(4);
    islands.insert(
        ClientId::island(3),
        build_island(StrategyKind::Ambitious, ClientId::island(3)),
    );
    let mut state = game_state(4, 50, 200);
    let mut cycle = cycle_with(config, islands);

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert_eq!(state.roles.president, ClientId::island(3));
    // The president sees the judge ignore the vote and says so.
    assert!(announced(&outcome, CommunicationField::MonitoringResult)
        .contains(&&CommunicationContent::Boolean(false)));
    assert!(announced(&outcome, CommunicationField::MonitoredClient)
        .contains(&&CommunicationContent::Text("island_3".into())));
}

#[test]
fn speaker_replaced_in_the_first_round_stays_replaced() {
    let mut islands = base_registry(4);
    scripted(
        &mut islands,
        1,
        Script {
            proposal: Some("allocations_must_be_made".into()),
            ..Script::default()
        },
    );
    scripted(
        &mut islands,
        2,
        Script {
            withhold_vote: true,
            ..Script::default()
        },
    );
    let mut state = game_state(4, 50, 200);
    let mut cycle = cycle_with(free_config(), islands);

    let outcome = cycle.run_cycle(&mut state).expect("cycle runs");

    assert!(outcome.success, "{}", outcome.description);
    assert!(announced(&outcome, CommunicationField::MonitoringResult)
        .contains(&&CommunicationContent::Boolean(false)));
    assert_ne!(state.roles.speaker, ClientId::island(2));
    assert_eq!(state.roles.speaker, ClientId::island(1));
    assert_eq!(state.turns_in_power(Role::Speaker), 0);
    assert_eq!(state.roles.judge, ClientId::island(3));
}
