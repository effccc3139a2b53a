//! Executive branch: taxation, allocations, rule proposals and the speaker
//! appointment, all performed through the current president.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{
    ClientId, CommunicationContent, CommunicationField, GovernanceAction, Message, Recipient,
    ResourceReport, Resources, Role, RuleMatrix,
};
use tracing::{debug, info, warn};

use crate::context::{BranchError, CycleContext, SalaryOutcome};
use crate::roles::President;
use crate::succession::{conduct_appointment, succession_for, Appointed, Appointment};

pub struct Executive {
    president_id: ClientId,
    president: Arc<dyn President>,
    resource_requests: BTreeMap<ClientId, Resources>,
    rule_proposals: Vec<String>,
}

impl Executive {
    pub fn new(president_id: ClientId, president: Arc<dyn President>) -> Self {
        Self {
            president_id,
            president,
            resource_requests: BTreeMap::new(),
            rule_proposals: Vec::new(),
        }
    }

    pub fn resource_requests(&self) -> &BTreeMap<ClientId, Resources> {
        &self.resource_requests
    }

    pub fn rule_proposals(&self) -> &[String] {
        &self.rule_proposals
    }

    /// Ask the president for expected tax per client and tell each living
    /// client its amount. Returns the expected amounts.
    pub fn broadcast_taxation(
        &mut self,
        ctx: &mut CycleContext<'_>,
        reports: &BTreeMap<ClientId, ResourceReport>,
        living: &[ClientId],
    ) -> Result<BTreeMap<ClientId, Resources>, BranchError> {
        ctx.incur_service_charge(GovernanceAction::BroadcastTaxation)?;
        let view = ctx.view(&self.president_id);
        let president = self.president.clone();
        let submitted = reports.clone();
        let levied = ctx
            .guard
            .decide(&self.president_id, "set_tax_amount", move || {
                president.set_tax_amount(&view, &submitted)
            })
            .ok()
            .flatten();
        let Some(levied) = levied else {
            debug!("president levied no tax");
            return Ok(BTreeMap::new());
        };

        let mut expected = BTreeMap::new();
        for client in living {
            let amount = levied.get(client).copied().unwrap_or(0).max(0);
            expected.insert(client.clone(), amount);
            let mut content = Message::new();
            content.insert(CommunicationField::TaxAmount, CommunicationContent::Integer(amount));
            ctx.send(Role::President, Recipient::Client(client.clone()), content);
        }
        info!(total = expected.values().sum::<Resources>(), "taxation broadcast");
        Ok(expected)
    }

    pub fn request_allocation_request(
        &mut self,
        ctx: &mut CycleContext<'_>,
        living: &[ClientId],
    ) -> Result<(), BranchError> {
        ctx.incur_service_charge(GovernanceAction::RequestAllocationRequest)?;
        self.resource_requests.clear();
        for client in living {
            let Some(island) = ctx.island(client) else {
                continue;
            };
            let view = ctx.view(client);
            let requested = ctx
                .guard
                .decide(client, "common_pool_resource_request", move || {
                    island.common_pool_resource_request(&view)
                })
                .unwrap_or(0);
            if requested > 0 {
                self.resource_requests.insert(client.clone(), requested);
            }
        }
        Ok(())
    }

    /// Disburse the president's allocations. `None` means the president made
    /// no allocation decision; transfers the pool cannot cover are skipped.
    pub fn reply_allocation_request(
        &mut self,
        ctx: &mut CycleContext<'_>,
    ) -> Result<Option<BTreeMap<ClientId, Resources>>, BranchError> {
        ctx.incur_service_charge(GovernanceAction::ReplyAllocationRequest)?;
        let available = ctx.state.common_pool.balance();
        let view = ctx.view(&self.president_id);
        let president = self.president.clone();
        let requests = self.resource_requests.clone();
        let decided = ctx
            .guard
            .decide(&self.president_id, "evaluate_allocation_requests", move || {
                president.evaluate_allocation_requests(&view, &requests, available)
            })
            .ok()
            .flatten();
        let Some(decided) = decided else {
            return Ok(None);
        };

        let mut granted = BTreeMap::new();
        for (client, amount) in decided {
            if amount <= 0 || !ctx.state.is_alive(&client) {
                continue;
            }
            match ctx.state.pay_from_common_pool(&client, amount, "allocation") {
                Ok(paid) => {
                    let mut content = Message::new();
                    content.insert(CommunicationField::AllocationAmount, CommunicationContent::Integer(paid));
                    ctx.send(Role::President, Recipient::Client(client.clone()), content);
                    granted.insert(client, paid);
                }
                Err(err) => warn!(client = %client, amount, %err, "allocation skipped"),
            }
        }
        info!(total = granted.values().sum::<Resources>(), "allocations disbursed");
        Ok(Some(granted))
    }

    pub fn request_rule_proposal(
        &mut self,
        ctx: &mut CycleContext<'_>,
        living: &[ClientId],
    ) -> Result<(), BranchError> {
        ctx.incur_service_charge(GovernanceAction::RequestRuleProposal)?;
        self.rule_proposals.clear();
        for client in living {
            let Some(island) = ctx.island(client) else {
                continue;
            };
            let view = ctx.view(client);
            let proposal = ctx
                .guard
                .decide(client, "rule_proposal", move || island.rule_proposal(&view))
                .ok()
                .flatten();
            match proposal {
                Some(rule) if !rule.is_empty() && !self.rule_proposals.contains(&rule) => {
                    self.rule_proposals.push(rule)
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// The president's pick among the proposals, if it names a catalogue rule.
    pub fn get_rule_for_speaker(
        &mut self,
        ctx: &mut CycleContext<'_>,
    ) -> Result<Option<RuleMatrix>, BranchError> {
        ctx.incur_service_charge(GovernanceAction::GetRuleForSpeaker)?;
        let view = ctx.view(&self.president_id);
        let president = self.president.clone();
        let proposals = self.rule_proposals.clone();
        let picked = ctx
            .guard
            .decide(&self.president_id, "pick_rule_to_vote", move || {
                president.pick_rule_to_vote(&view, &proposals)
            })
            .ok()
            .flatten();
        Ok(picked.and_then(|name| {
            let rule = ctx.rules.get(&name).cloned();
            if rule.is_none() {
                warn!(rule = %name, "president picked a rule outside the catalogue");
            }
            rule
        }))
    }

    pub fn appoint_next_speaker(
        &mut self,
        ctx: &mut CycleContext<'_>,
        monitoring: bool,
        incumbent: &ClientId,
        candidates: &[ClientId],
    ) -> Result<Appointed, BranchError> {
        let call = self.president.clone();
        let decide = self.president.clone();
        conduct_appointment(
            ctx,
            Appointment {
                succession: succession_for(Role::Speaker),
                appointer: &self.president_id,
                incumbent,
                monitoring,
                candidates,
            },
            move |view, monitoring, term, candidates| {
                call.call_speaker_election(view, monitoring, term, candidates)
            },
            move |view, winner| decide.decide_next_speaker(view, winner),
        )
    }

    pub fn send_speaker_salary(&mut self, ctx: &mut CycleContext<'_>) -> Result<SalaryOutcome, BranchError> {
        let salary = ctx.config.salary(Role::Speaker);
        let view = ctx.view(&self.president_id);
        let president = self.president.clone();
        let decision = ctx
            .guard
            .decide(&self.president_id, "pay_speaker", move || president.pay_speaker(&view, salary));
        ctx.pay_salary(Role::Speaker, decision)
    }
}
