//! Legislative branch: agenda, rule votes, announcements and the judge
//! appointment, all performed through the current speaker.

use std::sync::Arc;

use contracts::{
    ClientId, CommunicationContent, CommunicationField, GovernanceAction, Message, Role,
};
use tracing::{debug, info, warn};

use crate::context::{BranchError, CycleContext, SalaryOutcome};
use crate::roles::Speaker;
use crate::rules::RuleError;
use crate::succession::{conduct_appointment, succession_for, Appointed, Appointment};
use crate::voting::{BallotBox, RuleVote};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LegislativePhase {
    #[default]
    Idle,
    AgendaSet,
    VoteCalled,
    ResultAnnounced,
}

pub struct Legislature {
    speaker_id: ClientId,
    speaker: Arc<dyn Speaker>,
    rule_to_vote: Option<String>,
    ballot_box: BallotBox,
    voting_result: bool,
    phase: LegislativePhase,
}

impl Legislature {
    pub fn new(speaker_id: ClientId, speaker: Arc<dyn Speaker>) -> Self {
        Self {
            speaker_id,
            speaker,
            rule_to_vote: None,
            ballot_box: BallotBox::default(),
            voting_result: false,
            phase: LegislativePhase::Idle,
        }
    }

    pub fn phase(&self) -> LegislativePhase {
        self.phase
    }

    pub fn rule_to_vote(&self) -> Option<&str> {
        self.rule_to_vote.as_deref()
    }

    pub fn ballot_box(&self) -> &BallotBox {
        &self.ballot_box
    }

    pub fn voting_result(&self) -> bool {
        self.voting_result
    }

    /// Let the speaker settle the agenda. Only names present in the catalogue
    /// are adopted.
    pub fn set_rule_to_vote(
        &mut self,
        ctx: &mut CycleContext<'_>,
        proposed: Option<&str>,
    ) -> Result<(), BranchError> {
        ctx.incur_service_charge(GovernanceAction::SetRuleToVote)?;
        let view = ctx.view(&self.speaker_id);
        let speaker = self.speaker.clone();
        let proposed = proposed.map(str::to_string);
        let agenda = ctx
            .guard
            .decide(&self.speaker_id, "decide_agenda", move || {
                speaker.decide_agenda(&view, proposed.as_deref())
            })
            .ok()
            .flatten();

        match agenda {
            Some(rule) if ctx.rules.contains(&rule) => {
                debug!(%rule, "agenda set");
                self.rule_to_vote = Some(rule);
                self.phase = LegislativePhase::AgendaSet;
            }
            Some(rule) => warn!(%rule, "speaker put an unknown rule on the agenda"),
            None => debug!("no rule on the agenda"),
        }
        Ok(())
    }

    /// Charge for the vote and, if the speaker calls one, run it. Returns
    /// whether a vote was called.
    pub fn set_voting_result(
        &mut self,
        ctx: &mut CycleContext<'_>,
        participants: &[ClientId],
    ) -> Result<bool, BranchError> {
        ctx.incur_service_charge(GovernanceAction::SetVotingResult)?;
        let rule = self.rule_to_vote.clone().unwrap_or_default();
        let view = ctx.view(&self.speaker_id);
        let speaker = self.speaker.clone();
        let candidates = participants.to_vec();
        let decision = ctx
            .guard
            .decide(&self.speaker_id, "decide_vote", move || {
                speaker.decide_vote(&view, &rule, &candidates)
            })
            .ok()
            .flatten();

        let Some((rule, voters)) = decision else {
            return Ok(false);
        };
        self.ballot_box = self.run_vote(ctx, &rule, &voters);
        self.voting_result = self.ballot_box.count_votes_majority();
        self.phase = LegislativePhase::VoteCalled;
        Ok(true)
    }

    /// Empty rule id or empty electorate produces an empty ballot box.
    pub fn run_vote(&self, ctx: &CycleContext<'_>, rule: &str, voters: &[ClientId]) -> BallotBox {
        if rule.is_empty() || voters.is_empty() {
            return BallotBox::default();
        }
        RuleVote::new(rule, voters.to_vec()).gather_ballots(ctx)
    }

    /// If the speaker announces, charge, broadcast the result and apply it to
    /// the catalogue. Returns whether a result was announced.
    pub fn announce_voting_result(&mut self, ctx: &mut CycleContext<'_>) -> Result<bool, BranchError> {
        let rule = self.rule_to_vote.clone().unwrap_or_default();
        let result = self.voting_result;
        let view = ctx.view(&self.speaker_id);
        let speaker = self.speaker.clone();
        let announcement = ctx
            .guard
            .decide(&self.speaker_id, "decide_announcement", move || {
                speaker.decide_announcement(&view, &rule, result)
            })
            .ok()
            .flatten();

        let Some((rule, voted_in)) = announcement else {
            return Ok(false);
        };
        ctx.incur_service_charge(GovernanceAction::AnnounceVotingResult)?;
        self.reset();

        let mut content = Message::new();
        content.insert(CommunicationField::RuleName, CommunicationContent::Text(rule.clone()));
        content.insert(CommunicationField::RuleVoteResult, CommunicationContent::Boolean(voted_in));
        ctx.broadcast(Role::Speaker, content);
        info!(%rule, voted_in, "vote result announced");

        self.update_rules(ctx, &rule, voted_in)?;
        self.phase = LegislativePhase::ResultAnnounced;
        Ok(true)
    }

    /// Move a voted rule between the catalogue partitions. A rule already where
    /// the vote would put it, or an immutable rule, is left alone.
    pub fn update_rules(
        &mut self,
        ctx: &mut CycleContext<'_>,
        rule: &str,
        voted_in: bool,
    ) -> Result<(), BranchError> {
        ctx.incur_service_charge(GovernanceAction::UpdateRules)?;
        let moved = if voted_in {
            ctx.rules.pull_into_play(rule)
        } else {
            ctx.rules.pull_out_of_play(rule)
        };
        match moved {
            Ok(()) => {
                info!(%rule, in_play = voted_in, "rule catalogue updated");
                Ok(())
            }
            Err(err) if err.is_wrong_partition() => {
                debug!(%rule, %err, "rule already in target partition");
                Ok(())
            }
            Err(err @ RuleError::Immutable(_)) => {
                warn!(%rule, %err, "vote tried to retire an immutable rule");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn appoint_next_judge(
        &mut self,
        ctx: &mut CycleContext<'_>,
        monitoring: bool,
        incumbent: &ClientId,
        candidates: &[ClientId],
    ) -> Result<Appointed, BranchError> {
        let call = self.speaker.clone();
        let decide = self.speaker.clone();
        conduct_appointment(
            ctx,
            Appointment {
                succession: succession_for(Role::Judge),
                appointer: &self.speaker_id,
                incumbent,
                monitoring,
                candidates,
            },
            move |view, monitoring, term, candidates| {
                call.call_judge_election(view, monitoring, term, candidates)
            },
            move |view, winner| decide.decide_next_judge(view, winner),
        )
    }

    pub fn send_judge_salary(&mut self, ctx: &mut CycleContext<'_>) -> Result<SalaryOutcome, BranchError> {
        let salary = ctx.config.salary(Role::Judge);
        let view = ctx.view(&self.speaker_id);
        let speaker = self.speaker.clone();
        let decision = ctx
            .guard
            .decide(&self.speaker_id, "pay_judge", move || speaker.pay_judge(&view, salary));
        ctx.pay_salary(Role::Judge, decision)
    }

    fn reset(&mut self) {
        self.rule_to_vote = None;
        self.ballot_box = BallotBox::default();
        self.voting_result = false;
        self.phase = LegislativePhase::Idle;
    }
}
