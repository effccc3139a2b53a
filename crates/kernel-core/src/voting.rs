//! Rule ballots and role elections.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{ClientId, Role, VoteChoice, VotingMethod};
use serde::Serialize;
use tracing::debug;

use crate::context::CycleContext;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ballot {
    pub voter: ClientId,
    pub choice: VoteChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BallotBox {
    pub rule: Option<String>,
    pub ballots: Vec<Ballot>,
}

impl BallotBox {
    pub fn for_rule(rule: impl Into<String>) -> Self {
        Self {
            rule: Some(rule.into()),
            ballots: Vec::new(),
        }
    }

    pub fn cast(&mut self, voter: ClientId, choice: VoteChoice) {
        self.ballots.push(Ballot { voter, choice });
    }

    pub fn is_empty(&self) -> bool {
        self.ballots.is_empty()
    }

    pub fn count(&self, choice: VoteChoice) -> usize {
        self.ballots.iter().filter(|b| b.choice == choice).count()
    }

    /// Strict majority of the non-abstaining ballots.
    pub fn count_votes_majority(&self) -> bool {
        let for_votes = self.count(VoteChoice::For);
        let against = self.count(VoteChoice::Against);
        for_votes > against
    }
}

/// A yes/no vote on one rule among a fixed electorate.
#[derive(Debug, Clone)]
pub struct RuleVote {
    rule: String,
    voters: Vec<ClientId>,
}

impl RuleVote {
    pub fn new(rule: impl Into<String>, voters: Vec<ClientId>) -> Self {
        Self {
            rule: rule.into(),
            voters,
        }
    }

    /// Ask every living voter. An empty rule or electorate yields an empty box.
    pub fn gather_ballots(&self, ctx: &CycleContext<'_>) -> BallotBox {
        if self.rule.is_empty() || self.voters.is_empty() {
            return BallotBox::default();
        }
        let mut ballot_box = BallotBox::for_rule(self.rule.clone());
        let mut seen = BTreeSet::new();
        for voter in &self.voters {
            if !seen.insert(voter.clone()) || !ctx.state.is_alive(voter) {
                continue;
            }
            let Some(island) = ctx.island(voter) else {
                continue;
            };
            let view = ctx.view(voter);
            let rule = self.rule.clone();
            let choice = ctx
                .guard
                .decide(voter, "vote_for_rule", move || island.vote_for_rule(&view, &rule))
                .unwrap_or(VoteChoice::Abstain);
            ballot_box.cast(voter.clone(), choice);
        }
        debug!(
            rule = %self.rule,
            for_votes = ballot_box.count(VoteChoice::For),
            against = ballot_box.count(VoteChoice::Against),
            "rule vote gathered"
        );
        ballot_box
    }
}

/// Ranked ballots for one role.
#[derive(Debug, Clone)]
pub struct Election {
    role: Role,
    method: VotingMethod,
    candidates: Vec<ClientId>,
    voters: Vec<ClientId>,
    ballots: Vec<(ClientId, Vec<ClientId>)>,
}

impl Election {
    pub fn propose(role: Role, method: VotingMethod) -> Self {
        Self {
            role,
            method,
            candidates: Vec::new(),
            voters: Vec::new(),
            ballots: Vec::new(),
        }
    }

    pub fn open_ballot(mut self, candidates: Vec<ClientId>, voters: Vec<ClientId>) -> Self {
        self.candidates = dedup_sorted(candidates);
        self.voters = dedup_sorted(voters);
        self
    }

    pub fn record_ballot(&mut self, voter: ClientId, ranking: Vec<ClientId>) {
        self.ballots.push((voter, ranking));
    }

    /// Collect a ranking from every living voter.
    pub fn vote(&mut self, ctx: &CycleContext<'_>) {
        for voter in self.voters.clone() {
            if !ctx.state.is_alive(&voter) {
                continue;
            }
            let Some(island) = ctx.island(&voter) else {
                continue;
            };
            let view = ctx.view(&voter);
            let role = self.role;
            let candidates = self.candidates.clone();
            let ranking = ctx
                .guard
                .decide(&voter, "vote_for_election", move || {
                    island.vote_for_election(&view, role, &candidates)
                })
                .unwrap_or_default();
            self.record_ballot(voter, ranking);
        }
    }

    /// Winner by the configured method; ties go to the lowest id. `None` when
    /// nobody cast a valid preference.
    pub fn close_ballot(&self) -> Option<ClientId> {
        let scores = match self.method {
            VotingMethod::Plurality => tally_plurality(&self.ballots, &self.candidates),
            VotingMethod::BordaCount => tally_borda(&self.ballots, &self.candidates),
        };
        let winner = top_scorer(&scores);
        debug!(role = %self.role, method = ?self.method, ?winner, "election closed");
        winner
    }
}

fn dedup_sorted(ids: Vec<ClientId>) -> Vec<ClientId> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

/// The voter's ranking restricted to valid candidates, first mention kept.
fn valid_ranking<'a>(ranking: &'a [ClientId], candidates: &[ClientId]) -> Vec<&'a ClientId> {
    let mut seen = BTreeSet::new();
    ranking
        .iter()
        .filter(|id| candidates.contains(*id) && seen.insert(*id))
        .collect()
}

pub fn tally_plurality(ballots: &[(ClientId, Vec<ClientId>)], candidates: &[ClientId]) -> BTreeMap<ClientId, u32> {
    let mut scores = BTreeMap::new();
    for (_, ranking) in ballots {
        if let Some(first) = valid_ranking(ranking, candidates).first() {
            *scores.entry((*first).clone()).or_insert(0) += 1;
        }
    }
    scores
}

/// Position `i` in a ranking over `n` candidates earns `n - 1 - i` points.
pub fn tally_borda(ballots: &[(ClientId, Vec<ClientId>)], candidates: &[ClientId]) -> BTreeMap<ClientId, u32> {
    let mut scores = BTreeMap::new();
    let n = candidates.len() as u32;
    for (_, ranking) in ballots {
        let ranked = valid_ranking(ranking, candidates);
        if ranked.is_empty() {
            continue;
        }
        for (position, candidate) in ranked.into_iter().enumerate() {
            *scores.entry(candidate.clone()).or_insert(0) += n - 1 - position as u32;
        }
    }
    scores
}

fn top_scorer(scores: &BTreeMap<ClientId, u32>) -> Option<ClientId> {
    let mut best: Option<(&ClientId, u32)> = None;
    for (candidate, score) in scores {
        if best.map_or(true, |(_, top)| *score > top) {
            best = Some((candidate, *score));
        }
    }
    best.map(|(candidate, _)| candidate.clone())
}
