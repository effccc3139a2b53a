//! Judicial branch: history inspection, sanctions, pardons and the president
//! appointment, all performed through the current judge.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use contracts::{
    Accountability, ClientId, CommunicationContent, CommunicationField, GovernanceAction, Message,
    Recipient, ResourceReport, Resources, Role, VariableName, VariableValuePair,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::{BranchError, CycleContext, SalaryOutcome};
use crate::roles::Judge;
use crate::rules::ComplianceReport;
use crate::succession::{conduct_appointment, succession_for, Appointed, Appointment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SanctionEvent {
    pub turn: u64,
    pub points: u32,
    pub reason: String,
}

/// Sanction points per client. Only events inside the memory window count
/// toward a client's score.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SanctionRecord {
    events: BTreeMap<ClientId, Vec<SanctionEvent>>,
}

impl SanctionRecord {
    pub fn add(&mut self, client: &ClientId, turn: u64, points: u32, reason: impl Into<String>) {
        if points == 0 {
            return;
        }
        self.events.entry(client.clone()).or_default().push(SanctionEvent {
            turn,
            points,
            reason: reason.into(),
        });
    }

    pub fn score(&self, client: &ClientId, turn: u64, memory: u64) -> u32 {
        let oldest = turn.saturating_sub(memory);
        self.events
            .get(client)
            .map(|events| {
                events
                    .iter()
                    .filter(|event| event.turn >= oldest && event.turn <= turn)
                    .map(|event| event.points)
                    .sum()
            })
            .unwrap_or(0)
    }

    /// Non-zero scores at `turn`.
    pub fn scores(&self, turn: u64, memory: u64) -> BTreeMap<ClientId, u32> {
        self.events
            .keys()
            .map(|client| (client.clone(), self.score(client, turn, memory)))
            .filter(|(_, score)| *score > 0)
            .collect()
    }

    pub fn pardon(&mut self, client: &ClientId) {
        self.events.remove(client);
    }

    /// Drop events that fell out of the memory window.
    pub fn prune(&mut self, turn: u64, memory: u64) {
        let oldest = turn.saturating_sub(memory);
        for events in self.events.values_mut() {
            events.retain(|event| event.turn >= oldest);
        }
        self.events.retain(|_, events| !events.is_empty());
    }

    pub fn events(&self, client: &ClientId) -> &[SanctionEvent] {
        self.events.get(client).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub struct Judiciary {
    judge_id: ClientId,
    judge: Arc<dyn Judge>,
    evaluation_results: BTreeMap<ClientId, ComplianceReport>,
}

impl Judiciary {
    pub fn new(judge_id: ClientId, judge: Arc<dyn Judge>) -> Self {
        Self {
            judge_id,
            judge,
            evaluation_results: BTreeMap::new(),
        }
    }

    pub fn evaluation_results(&self) -> &BTreeMap<ClientId, ComplianceReport> {
        &self.evaluation_results
    }

    pub fn inspect_history(
        &mut self,
        ctx: &mut CycleContext<'_>,
        records: &[Accountability],
    ) -> Result<(), BranchError> {
        ctx.incur_service_charge(GovernanceAction::InspectHistory)?;
        let view = ctx.view(&self.judge_id);
        let judge = self.judge.clone();
        let records = records.to_vec();
        let catalogue = ctx.rules.clone();
        self.evaluation_results = ctx
            .guard
            .decide(&self.judge_id, "inspect_history", move || {
                judge.inspect_history(&view, &records, &catalogue)
            })
            .ok()
            .flatten()
            .unwrap_or_default();
        let offenders = self
            .evaluation_results
            .values()
            .filter(|report| !report.is_compliant())
            .count();
        info!(inspected = self.evaluation_results.len(), offenders, "history inspected");
        Ok(())
    }

    /// Score every broken rule from the last inspection, then let the judge
    /// pardon. Pardons are broadcast.
    pub fn update_sanction_score(&mut self, ctx: &mut CycleContext<'_>, sanctions: &mut SanctionRecord) {
        let turn = ctx.turn();
        let penalty = ctx.config.rule_violation_penalty;
        for (client, report) in &self.evaluation_results {
            for rule in report.broken_rules() {
                sanctions.add(client, turn, penalty, rule);
            }
        }
        let memory = ctx.config.sanction_memory_turns;
        sanctions.prune(turn, memory);

        let scores = sanctions.scores(turn, memory);
        if scores.is_empty() {
            return;
        }
        let view = ctx.view(&self.judge_id);
        let judge = self.judge.clone();
        let pardons = ctx
            .guard
            .decide(&self.judge_id, "pardon_clients", move || judge.pardon_clients(&view, &scores))
            .unwrap_or_default();
        for client in pardons {
            sanctions.pardon(&client);
            let mut content = Message::new();
            content.insert(
                CommunicationField::PardonedClient,
                CommunicationContent::Text(client.to_string()),
            );
            ctx.broadcast(Role::Judge, content);
            info!(client = %client, "sanctions pardoned");
        }
    }

    /// Levy each sanctioned client's tier percentage of its resources. Payment
    /// is capped at what the client holds. Returns the expected amounts.
    pub fn apply_sanctions(
        &mut self,
        ctx: &mut CycleContext<'_>,
        sanctions: &SanctionRecord,
    ) -> BTreeMap<ClientId, Resources> {
        let turn = ctx.turn();
        let scores = sanctions.scores(turn, ctx.config.sanction_memory_turns);
        let mut expected_by_client = BTreeMap::new();
        for (client, score) in scores {
            if !ctx.state.is_alive(&client) {
                continue;
            }
            let percentage = Resources::from(ctx.config.sanction_percentage(score));
            let resources = ctx.state.resources_of(&client);
            let expected = resources * percentage / 100;
            if expected <= 0 {
                continue;
            }
            let mut content = Message::new();
            content.insert(CommunicationField::SanctionAmount, CommunicationContent::Integer(expected));
            ctx.send(Role::Judge, Recipient::Client(client.clone()), content);

            let offered = match ctx.island(&client) {
                Some(island) => {
                    let view = ctx.view(&client);
                    ctx.guard
                        .decide(&client, "sanction_payment", move || {
                            island.sanction_payment(&view, expected)
                        })
                        .unwrap_or(0)
                }
                None => 0,
            };
            let paid = offered.clamp(0, resources);
            let paid = match ctx.state.collect_into_common_pool(&client, paid, "sanction") {
                Ok(paid) => paid,
                Err(err) => {
                    warn!(client = %client, %err, "sanction payment failed");
                    0
                }
            };
            ctx.record_accountability(
                &client,
                vec![
                    VariableValuePair::single(VariableName::SanctionExpected, expected as f64),
                    VariableValuePair::single(VariableName::SanctionPaid, paid as f64),
                ],
            );
            debug!(client = %client, score, expected, paid, "sanction applied");
            expected_by_client.insert(client, expected);
        }
        expected_by_client
    }

    /// Flag clients whose declared resources differ from what they hold.
    pub fn sanction_evaluate(
        &mut self,
        ctx: &mut CycleContext<'_>,
        sanctions: &mut SanctionRecord,
        reports: &BTreeMap<ClientId, ResourceReport>,
    ) -> BTreeSet<ClientId> {
        let turn = ctx.turn();
        let penalty = ctx.config.misreport_penalty;
        let mut misreported = BTreeSet::new();
        for (client, report) in reports {
            if report.reported && report.reported_amount != ctx.state.resources_of(client) {
                sanctions.add(client, turn, penalty, "misreported_private_resources");
                misreported.insert(client.clone());
            }
        }
        if !misreported.is_empty() {
            info!(count = misreported.len(), "misreports sanctioned");
        }
        misreported
    }

    pub fn appoint_next_president(
        &mut self,
        ctx: &mut CycleContext<'_>,
        monitoring: bool,
        incumbent: &ClientId,
        candidates: &[ClientId],
    ) -> Result<Appointed, BranchError> {
        let call = self.judge.clone();
        let decide = self.judge.clone();
        conduct_appointment(
            ctx,
            Appointment {
                succession: succession_for(Role::President),
                appointer: &self.judge_id,
                incumbent,
                monitoring,
                candidates,
            },
            move |view, monitoring, term, candidates| {
                call.call_president_election(view, monitoring, term, candidates)
            },
            move |view, winner| decide.decide_next_president(view, winner),
        )
    }

    pub fn send_president_salary(&mut self, ctx: &mut CycleContext<'_>) -> Result<SalaryOutcome, BranchError> {
        let salary = ctx.config.salary(Role::President);
        let view = ctx.view(&self.judge_id);
        let judge = self.judge.clone();
        let decision = ctx
            .guard
            .decide(&self.judge_id, "pay_president", move || judge.pay_president(&view, salary));
        ctx.pay_salary(Role::President, decision)
    }
}
