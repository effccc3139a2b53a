//! Per-turn governance cycle. One call to [`GovernanceCycle::run_cycle`] runs
//! the whole institutional sequence: inspection and sanctions, reports,
//! executive and legislative business, salaries, monitoring and two election
//! rounds.
//!
//! Budget shortfalls end the cycle early with `success == false`; anything
//! already paid stays paid. Only a role holder without an implementation for
//! its role is an error.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{
    Accountability, ClientId, CommunicationContent, CommunicationField, CycleOutcome, GovernanceAction,
    GovernanceConfig, Message, ResourceReport, Resources, Role, RoleAssignment, VariableName,
    VariableValuePair,
};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::context::{BranchError, CycleContext, SalaryOutcome};
use crate::executive::Executive;
use crate::guard::DecisionGuard;
use crate::judiciary::{Judiciary, SanctionRecord};
use crate::legislature::Legislature;
use crate::monitor::{monitor_all, Monitor};
use crate::roles::{Island, IslandRegistry};
use crate::rules::{RuleCatalogue, INCREMENT_BUDGET_PREFIX};
use crate::state::GameState;
use crate::succession::{Appointed, SUCCESSION};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceError {
    #[error("{role} holder {client} is not a registered island")]
    UnknownRoleHolder { role: Role, client: ClientId },
    #[error("island {client} holds {role} but provides no {role} implementation")]
    MissingRoleImplementation { role: Role, client: ClientId },
}

/// Amounts decided during the most recent cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleCaches {
    pub tax_amounts: BTreeMap<ClientId, Resources>,
    pub allocations: BTreeMap<ClientId, Resources>,
    pub sanction_amounts: BTreeMap<ClientId, Resources>,
}

impl CycleCaches {
    fn clear(&mut self) {
        self.tax_amounts.clear();
        self.allocations.clear();
        self.sanction_amounts.clear();
    }
}

struct Branches {
    executive: Executive,
    legislature: Legislature,
    judiciary: Judiciary,
}

/// Why a cycle stopped early.
struct Abort {
    action: Option<GovernanceAction>,
    description: String,
}

impl From<BranchError> for Abort {
    fn from(err: BranchError) -> Self {
        Self {
            action: err.action(),
            description: err.to_string(),
        }
    }
}

pub struct GovernanceCycle {
    config: Arc<GovernanceConfig>,
    islands: IslandRegistry,
    rules: RuleCatalogue,
    monitor: Monitor,
    guard: DecisionGuard,
    sanctions: SanctionRecord,
    caches: CycleCaches,
}

impl GovernanceCycle {
    pub fn new(config: Arc<GovernanceConfig>, islands: IslandRegistry, rules: RuleCatalogue) -> Self {
        let guard = DecisionGuard::from_millis(config.decision_timeout_ms);
        Self {
            config,
            islands,
            rules,
            monitor: Monitor::default(),
            guard,
            sanctions: SanctionRecord::default(),
            caches: CycleCaches::default(),
        }
    }

    pub fn with_guard(mut self, guard: DecisionGuard) -> Self {
        self.guard = guard;
        self
    }

    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    pub fn islands(&self) -> &IslandRegistry {
        &self.islands
    }

    pub fn rules(&self) -> &RuleCatalogue {
        &self.rules
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    pub fn sanctions(&self) -> &SanctionRecord {
        &self.sanctions
    }

    pub fn caches(&self) -> &CycleCaches {
        &self.caches
    }

    pub fn run_cycle(&mut self, state: &mut GameState) -> Result<CycleOutcome, GovernanceError> {
        let turn = state.turn;
        let span = info_span!("governance_cycle", turn);
        let _entered = span.enter();
        self.caches.clear();

        if state.living_clients().is_empty() {
            return Ok(CycleOutcome {
                turn,
                success: false,
                description: "no living clients to govern".to_string(),
                failed_action: None,
                broadcasts: Vec::new(),
            });
        }
        replace_dead_role_holders(state);
        apply_budget_increments(state, &self.rules);
        for role in Role::ALL {
            *state.turns_in_power.entry(role).or_insert(0) += 1;
        }

        let branches = resolve_branches(&self.islands, &state.roles)?;

        let mut outbox = Vec::new();
        let mut ctx = CycleContext {
            state,
            config: &self.config,
            islands: &self.islands,
            rules: &mut self.rules,
            monitor: &mut self.monitor,
            guard: &self.guard,
            outbox: &mut outbox,
        };
        let result = run_steps(&mut ctx, branches, &mut self.sanctions, &mut self.caches);
        // The final round's election conduct never reaches the next cycle.
        ctx.monitor.discard();

        let outcome = match result {
            Ok(()) => {
                info!(roles = %ctx.state.roles, pool = ctx.state.common_pool.balance(), "governance cycle completed");
                CycleOutcome {
                    turn,
                    success: true,
                    description: "governance cycle completed".to_string(),
                    failed_action: None,
                    broadcasts: outbox,
                }
            }
            Err(abort) => {
                warn!(description = %abort.description, "governance cycle aborted");
                CycleOutcome {
                    turn,
                    success: false,
                    description: abort.description,
                    failed_action: abort.action,
                    broadcasts: outbox,
                }
            }
        };
        Ok(outcome)
    }

    /// Ask each client for the tax broadcast this cycle and deposit what it
    /// pays, capped at its resources. Returns the total collected.
    pub fn collect_taxes(&mut self, state: &mut GameState) -> Resources {
        let mut collected = 0;
        for (client, expected) in &self.caches.tax_amounts {
            if !state.is_alive(client) {
                continue;
            }
            let offered = match self.islands.get(client) {
                Some(island) => {
                    let island = island.clone();
                    let view = state.client_view(client, &self.rules);
                    let expected = *expected;
                    self.guard
                        .decide(client, "tax_contribution", move || {
                            island.tax_contribution(&view, expected)
                        })
                        .unwrap_or(0)
                }
                None => 0,
            };
            let paid = offered.clamp(0, state.resources_of(client));
            let paid = match state.collect_into_common_pool(client, paid, "tax") {
                Ok(paid) => paid,
                Err(err) => {
                    warn!(client = %client, %err, "tax payment failed");
                    0
                }
            };
            collected += paid;
            state.history.append(Accountability::new(
                client.clone(),
                state.turn,
                vec![
                    VariableValuePair::single(VariableName::ExpectedTaxContribution, *expected as f64),
                    VariableValuePair::single(VariableName::IslandTaxContribution, paid as f64),
                ],
            ));
        }
        debug!(collected, "taxes collected");
        collected
    }
}

fn resolve_branches(islands: &IslandRegistry, roles: &RoleAssignment) -> Result<Branches, GovernanceError> {
    let holder = |role: Role| -> Result<&Arc<dyn Island>, GovernanceError> {
        islands
            .get(roles.holder(role))
            .ok_or_else(|| GovernanceError::UnknownRoleHolder {
                role,
                client: roles.holder(role).clone(),
            })
    };
    let missing = |role: Role| GovernanceError::MissingRoleImplementation {
        role,
        client: roles.holder(role).clone(),
    };
    let president = holder(Role::President)?
        .president()
        .ok_or_else(|| missing(Role::President))?;
    let speaker = holder(Role::Speaker)?
        .speaker()
        .ok_or_else(|| missing(Role::Speaker))?;
    let judge = holder(Role::Judge)?
        .judge()
        .ok_or_else(|| missing(Role::Judge))?;
    Ok(Branches {
        executive: Executive::new(roles.president.clone(), president),
        legislature: Legislature::new(roles.speaker.clone(), speaker),
        judiciary: Judiciary::new(roles.judge.clone(), judge),
    })
}

/// Hand roles held by dead clients to the lowest-id living client.
fn replace_dead_role_holders(state: &mut GameState) {
    let Some(successor) = state.living_clients().into_iter().next() else {
        return;
    };
    for role in Role::ALL {
        let holder = state.roles.holder(role).clone();
        if !state.is_alive(&holder) {
            warn!(%role, dead = %holder, successor = %successor, "role holder died, seat reassigned");
            state.roles.assign(role, successor.clone());
            state.turns_in_power.insert(role, 0);
        }
    }
}

/// Credit each role's budget with the increment carried by an in-play
/// `increment_budget_<role>` rule.
fn apply_budget_increments(state: &mut GameState, rules: &RuleCatalogue) {
    for rule in rules.in_play() {
        let Some(suffix) = rule.name.strip_prefix(INCREMENT_BUDGET_PREFIX) else {
            continue;
        };
        let Some(role) = Role::ALL.into_iter().find(|role| role.as_str() == suffix) else {
            continue;
        };
        let increment = rule.cell(0, 1).unwrap_or(0.0).round() as Resources;
        *state.roles_budget.entry(role).or_insert(0) += increment;
        debug!(%role, increment, "role budget incremented");
    }
}

fn run_steps(
    ctx: &mut CycleContext<'_>,
    mut branches: Branches,
    sanctions: &mut SanctionRecord,
    caches: &mut CycleCaches,
) -> Result<(), Abort> {
    let turn = ctx.turn();
    let president_id = ctx.state.roles.president.clone();
    let speaker_id = ctx.state.roles.speaker.clone();

    if turn > 0 {
        let records = ctx.state.history.turn(turn - 1).to_vec();
        branches.judiciary.inspect_history(ctx, &records)?;
        branches.judiciary.update_sanction_score(ctx, sanctions);
        caches.sanction_amounts = branches.judiciary.apply_sanctions(ctx, sanctions);
    }

    let living = ctx.state.living_clients();
    let reports = gather_reports(ctx, &living);

    if turn > 0 {
        branches.judiciary.sanction_evaluate(ctx, sanctions, &reports);
    }

    caches.tax_amounts = branches.executive.broadcast_taxation(ctx, &reports, &living)?;
    branches.executive.request_allocation_request(ctx, &living)?;
    let allocations = branches.executive.reply_allocation_request(ctx)?;
    let allocations_made = allocations.is_some();
    caches.allocations = allocations.unwrap_or_default();
    branches.executive.request_rule_proposal(ctx, &living)?;
    let selected = branches.executive.get_rule_for_speaker(ctx)?;
    let rule_selected = selected.is_some();
    ctx.monitor.add_to_cache(
        &president_id,
        [VariableValuePair::flag(VariableName::AllocationMade, allocations_made)],
    );

    let proposed = selected.as_ref().map(|rule| rule.name.as_str());
    branches.legislature.set_rule_to_vote(ctx, proposed)?;
    let vote_called = branches.legislature.set_voting_result(ctx, &living)?;
    let result_announced = branches.legislature.announce_voting_result(ctx)?;

    let conduct = vec![
        VariableValuePair::flag(VariableName::RuleSelected, rule_selected),
        VariableValuePair::flag(VariableName::VoteCalled, vote_called),
        VariableValuePair::flag(VariableName::VoteResultAnnounced, result_announced),
    ];
    ctx.monitor.add_to_cache(&speaker_id, conduct.iter().cloned());
    ctx.record_accountability(&speaker_id, conduct);

    pay_salaries(ctx, &mut branches)?;

    let monitoring = monitor_all(ctx);
    ctx.monitor.clear_cache();

    check_election_budget(ctx)?;
    let current = ctx.state.roles.clone();
    let provisional = run_elections(ctx, &mut branches, &monitoring, &current, &living)?;
    debug!(provisional = %assignment_of(&provisional), "first election round");

    let monitoring = monitor_all(ctx);
    ctx.monitor.clear_cache();

    check_election_budget(ctx)?;
    let provisional_roles = provisional_assignment(&current, &provisional);
    let mut committed = run_elections(ctx, &mut branches, &monitoring, &provisional_roles, &living)?;
    for (role, appointed) in &mut committed {
        appointed.election_held |= provisional.get(role).is_some_and(|first| first.election_held);
    }
    commit_roles(ctx, committed);
    Ok(())
}

fn gather_reports(ctx: &mut CycleContext<'_>, living: &[ClientId]) -> BTreeMap<ClientId, ResourceReport> {
    let mut reports = BTreeMap::new();
    for client in living {
        let report = match ctx.island(client) {
            Some(island) => {
                let view = ctx.view(client);
                ctx.guard
                    .decide(client, "resource_report", move || island.resource_report(&view))
                    .unwrap_or_else(|_| ResourceReport::withheld())
            }
            None => ResourceReport::withheld(),
        };
        let actual = ctx.state.resources_of(client);
        ctx.record_accountability(
            client,
            vec![
                VariableValuePair::flag(VariableName::HasIslandReportPrivateResources, report.reported),
                VariableValuePair::single(
                    VariableName::IslandReportedPrivateResources,
                    report.reported_amount as f64,
                ),
                VariableValuePair::single(VariableName::IslandActualPrivateResources, actual as f64),
            ],
        );
        reports.insert(client.clone(), report);
    }
    reports
}

/// Every salary is attempted before any failure ends the cycle.
fn pay_salaries(ctx: &mut CycleContext<'_>, branches: &mut Branches) -> Result<(), Abort> {
    let outcomes = [
        branches.legislature.send_judge_salary(ctx),
        branches.executive.send_speaker_salary(ctx),
        branches.judiciary.send_president_salary(ctx),
    ];
    let failures: Vec<String> = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err().map(ToString::to_string))
        .collect();
    for outcome in outcomes.iter().flatten() {
        if let SalaryOutcome::Paid(amount) = outcome {
            debug!(amount, "salary paid");
        }
    }
    if failures.is_empty() {
        return Ok(());
    }
    Err(Abort {
        action: None,
        description: format!("cannot pay governance salaries: {}", failures.join("; ")),
    })
}

fn check_election_budget(ctx: &CycleContext<'_>) -> Result<(), Abort> {
    let needed = ctx.config.election_cost();
    let available = ctx.state.common_pool.balance();
    if ctx.state.common_pool.can_cover(needed) {
        return Ok(());
    }
    Err(Abort {
        action: None,
        description: format!(
            "insufficient budget to run elections: need {needed}, common pool holds {available}"
        ),
    })
}

/// One round of the three elections in succession order. Nothing is
/// committed here.
fn run_elections(
    ctx: &mut CycleContext<'_>,
    branches: &mut Branches,
    monitoring: &BTreeMap<Role, bool>,
    current: &RoleAssignment,
    candidates: &[ClientId],
) -> Result<BTreeMap<Role, Appointed>, Abort> {
    let mut round = BTreeMap::new();
    for succession in SUCCESSION {
        let role = succession.appointee;
        let behaved = monitoring.get(&role).copied().unwrap_or(true);
        let incumbent = current.holder(role);
        let appointed = match role {
            Role::Judge => branches
                .legislature
                .appoint_next_judge(ctx, behaved, incumbent, candidates)?,
            Role::Speaker => branches
                .executive
                .appoint_next_speaker(ctx, behaved, incumbent, candidates)?,
            Role::President => branches
                .judiciary
                .appoint_next_president(ctx, behaved, incumbent, candidates)?,
        };
        round.insert(role, appointed);
    }
    Ok(round)
}

/// Roles as the first round left them. The second round runs against these
/// incumbents.
fn provisional_assignment(current: &RoleAssignment, round: &BTreeMap<Role, Appointed>) -> RoleAssignment {
    let mut roles = current.clone();
    for (role, appointed) in round {
        roles.assign(*role, appointed.client.clone());
    }
    roles
}

fn assignment_of(round: &BTreeMap<Role, Appointed>) -> String {
    round
        .iter()
        .map(|(role, appointed)| format!("{role}={}", appointed.client))
        .collect::<Vec<_>>()
        .join(" ")
}

fn commit_roles(ctx: &mut CycleContext<'_>, round: BTreeMap<Role, Appointed>) {
    for succession in SUCCESSION {
        let role = succession.appointee;
        let Some(appointed) = round.get(&role) else {
            continue;
        };
        let changed = ctx.state.roles.holder(role) != &appointed.client;
        if appointed.election_held || changed {
            ctx.state.turns_in_power.insert(role, 0);
        }
        if changed {
            let mut content = Message::new();
            content.insert(CommunicationField::AppointedRole, CommunicationContent::Role(role));
            content.insert(
                CommunicationField::AppointedClient,
                CommunicationContent::Text(appointed.client.to_string()),
            );
            ctx.broadcast(succession.appointer, content);
            info!(%role, client = %appointed.client, "new role holder");
        }
    }
    for (role, appointed) in round {
        ctx.state.roles.assign(role, appointed.client);
    }
}
