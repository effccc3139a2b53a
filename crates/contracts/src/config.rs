//! Run and governance configuration. Loaded once, immutable for the run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{serde_u64_string, Resources, Role, SCHEMA_VERSION_V1};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Executive,
    Legislative,
    Judiciary,
}

impl Branch {
    pub fn role(self) -> Role {
        match self {
            Branch::Executive => Role::President,
            Branch::Legislative => Role::Speaker,
            Branch::Judiciary => Role::Judge,
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Branch::Executive => "executive",
            Branch::Legislative => "legislative",
            Branch::Judiciary => "judiciary",
        })
    }
}

/// Every chargeable governance action.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceAction {
    BroadcastTaxation,
    RequestAllocationRequest,
    ReplyAllocationRequest,
    RequestRuleProposal,
    GetRuleForSpeaker,
    AppointNextSpeaker,
    SetRuleToVote,
    SetVotingResult,
    AnnounceVotingResult,
    UpdateRules,
    AppointNextJudge,
    InspectHistory,
    AppointNextPresident,
}

impl GovernanceAction {
    pub const ELECTIONS: [GovernanceAction; 3] = [
        GovernanceAction::AppointNextJudge,
        GovernanceAction::AppointNextSpeaker,
        GovernanceAction::AppointNextPresident,
    ];

    pub fn branch(self) -> Branch {
        match self {
            GovernanceAction::BroadcastTaxation
            | GovernanceAction::RequestAllocationRequest
            | GovernanceAction::ReplyAllocationRequest
            | GovernanceAction::RequestRuleProposal
            | GovernanceAction::GetRuleForSpeaker
            | GovernanceAction::AppointNextSpeaker => Branch::Executive,
            GovernanceAction::SetRuleToVote
            | GovernanceAction::SetVotingResult
            | GovernanceAction::AnnounceVotingResult
            | GovernanceAction::UpdateRules
            | GovernanceAction::AppointNextJudge => Branch::Legislative,
            GovernanceAction::InspectHistory | GovernanceAction::AppointNextPresident => {
                Branch::Judiciary
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GovernanceAction::BroadcastTaxation => "broadcast_taxation",
            GovernanceAction::RequestAllocationRequest => "request_allocation_request",
            GovernanceAction::ReplyAllocationRequest => "reply_allocation_request",
            GovernanceAction::RequestRuleProposal => "request_rule_proposal",
            GovernanceAction::GetRuleForSpeaker => "get_rule_for_speaker",
            GovernanceAction::AppointNextSpeaker => "appoint_next_speaker",
            GovernanceAction::SetRuleToVote => "set_rule_to_vote",
            GovernanceAction::SetVotingResult => "set_voting_result",
            GovernanceAction::AnnounceVotingResult => "announce_voting_result",
            GovernanceAction::UpdateRules => "update_rules",
            GovernanceAction::AppointNextJudge => "appoint_next_judge",
            GovernanceAction::InspectHistory => "inspect_history",
            GovernanceAction::AppointNextPresident => "appoint_next_president",
        }
    }
}

impl fmt::Display for GovernanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-branch service-cost tables. An action missing from its table is free.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionCosts {
    pub executive: BTreeMap<GovernanceAction, Resources>,
    pub legislative: BTreeMap<GovernanceAction, Resources>,
    pub judiciary: BTreeMap<GovernanceAction, Resources>,
}

impl ActionCosts {
    /// Every action charged the same flat cost.
    pub fn uniform(cost: Resources) -> Self {
        use GovernanceAction::*;
        let table = |actions: &[GovernanceAction]| {
            actions
                .iter()
                .map(|action| (*action, cost))
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            executive: table(&[
                BroadcastTaxation,
                RequestAllocationRequest,
                ReplyAllocationRequest,
                RequestRuleProposal,
                GetRuleForSpeaker,
                AppointNextSpeaker,
            ]),
            legislative: table(&[
                SetRuleToVote,
                SetVotingResult,
                AnnounceVotingResult,
                UpdateRules,
                AppointNextJudge,
            ]),
            judiciary: table(&[InspectHistory, AppointNextPresident]),
        }
    }

    pub fn table(&self, branch: Branch) -> &BTreeMap<GovernanceAction, Resources> {
        match branch {
            Branch::Executive => &self.executive,
            Branch::Legislative => &self.legislative,
            Branch::Judiciary => &self.judiciary,
        }
    }

    pub fn table_mut(&mut self, branch: Branch) -> &mut BTreeMap<GovernanceAction, Resources> {
        match branch {
            Branch::Executive => &mut self.executive,
            Branch::Legislative => &mut self.legislative,
            Branch::Judiciary => &mut self.judiciary,
        }
    }

    pub fn cost(&self, action: GovernanceAction) -> Resources {
        self.table(action.branch())
            .get(&action)
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, action: GovernanceAction, cost: Resources) {
        self.table_mut(action.branch()).insert(action, cost);
    }
}

impl Default for ActionCosts {
    fn default() -> Self {
        Self::uniform(3)
    }
}

/// Score threshold at which a sanction tier applies, and the share of the
/// client's resources it costs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SanctionTier {
    pub min_score: u32,
    pub percentage: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GovernanceConfig {
    #[serde(default)]
    pub action_costs: ActionCosts,
    #[serde(default = "default_salaries")]
    pub salaries: BTreeMap<Role, Resources>,
    #[serde(default = "default_term_lengths")]
    pub term_lengths: BTreeMap<Role, u64>,
    #[serde(default = "default_role_budgets")]
    pub initial_role_budgets: BTreeMap<Role, Resources>,
    #[serde(default = "default_sanction_tiers")]
    pub sanction_tiers: Vec<SanctionTier>,
    #[serde(default = "default_sanction_memory_turns")]
    pub sanction_memory_turns: u64,
    #[serde(default = "default_penalty")]
    pub rule_violation_penalty: u32,
    #[serde(default = "default_penalty")]
    pub misreport_penalty: u32,
    /// When set, a service charge also requires the acting role's budget to
    /// cover the cost.
    #[serde(default)]
    pub enforce_role_budgets: bool,
    /// Per-callback deadline. Zero runs callbacks inline without a deadline.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,
}

fn per_role<T: Copy>(value: T) -> BTreeMap<Role, T> {
    Role::ALL.into_iter().map(|role| (role, value)).collect()
}

fn default_salaries() -> BTreeMap<Role, Resources> {
    per_role(5)
}

fn default_term_lengths() -> BTreeMap<Role, u64> {
    per_role(4)
}

fn default_role_budgets() -> BTreeMap<Role, Resources> {
    per_role(100)
}

fn default_sanction_tiers() -> Vec<SanctionTier> {
    vec![
        SanctionTier {
            min_score: 1,
            percentage: 5,
        },
        SanctionTier {
            min_score: 3,
            percentage: 10,
        },
        SanctionTier {
            min_score: 6,
            percentage: 20,
        },
        SanctionTier {
            min_score: 10,
            percentage: 35,
        },
        SanctionTier {
            min_score: 15,
            percentage: 50,
        },
    ]
}

fn default_sanction_memory_turns() -> u64 {
    3
}

fn default_penalty() -> u32 {
    1
}

fn default_decision_timeout_ms() -> u64 {
    250
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            action_costs: ActionCosts::default(),
            salaries: default_salaries(),
            term_lengths: default_term_lengths(),
            initial_role_budgets: default_role_budgets(),
            sanction_tiers: default_sanction_tiers(),
            sanction_memory_turns: default_sanction_memory_turns(),
            rule_violation_penalty: default_penalty(),
            misreport_penalty: default_penalty(),
            enforce_role_budgets: false,
            decision_timeout_ms: default_decision_timeout_ms(),
        }
    }
}

impl GovernanceConfig {
    pub fn cost(&self, action: GovernanceAction) -> Resources {
        self.action_costs.cost(action)
    }

    /// Combined fee of the three appointment actions.
    pub fn election_cost(&self) -> Resources {
        GovernanceAction::ELECTIONS
            .into_iter()
            .map(|action| self.cost(action))
            .sum()
    }

    pub fn salary(&self, role: Role) -> Resources {
        self.salaries.get(&role).copied().unwrap_or(0)
    }

    pub fn term_length(&self, role: Role) -> u64 {
        self.term_lengths.get(&role).copied().unwrap_or(u64::MAX)
    }

    /// Percentage of resources owed for a sanction score (highest tier reached).
    pub fn sanction_percentage(&self, score: u32) -> u8 {
        self.sanction_tiers
            .iter()
            .filter(|tier| score >= tier.min_score)
            .map(|tier| tier.percentage)
            .max()
            .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for branch in [Branch::Executive, Branch::Legislative, Branch::Judiciary] {
            for (action, cost) in self.action_costs.table(branch) {
                if action.branch() != branch {
                    return Err(ConfigError::Invalid(format!(
                        "action {action} listed under {branch} costs but belongs to {}",
                        action.branch()
                    )));
                }
                if *cost < 0 {
                    return Err(ConfigError::Invalid(format!(
                        "action {action} has negative cost {cost}"
                    )));
                }
            }
        }
        if let Some((role, salary)) = self.salaries.iter().find(|(_, salary)| **salary < 0) {
            return Err(ConfigError::Invalid(format!(
                "{role} salary is negative ({salary})"
            )));
        }
        if self.sanction_tiers.iter().any(|tier| tier.percentage > 100) {
            return Err(ConfigError::Invalid(
                "sanction tier percentage exceeds 100".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Cooperative,
    Selfish,
    Ambitious,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    pub schema_version: String,
    pub run_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub island_count: usize,
    pub max_turns: u64,
    pub initial_resources: Resources,
    pub initial_common_pool: Resources,
    pub cost_of_living: Resources,
    pub minimum_resource_threshold: Resources,
    pub max_critical_consecutive_turns: u32,
    pub harvest_min: Resources,
    pub harvest_max: Resources,
    #[serde(default)]
    pub strategies: Vec<StrategyKind>,
    #[serde(default)]
    pub governance: GovernanceConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "run_local_001".to_string(),
            seed: 1337,
            island_count: 6,
            max_turns: 100,
            initial_resources: 100,
            initial_common_pool: 300,
            cost_of_living: 10,
            minimum_resource_threshold: 5,
            max_critical_consecutive_turns: 3,
            harvest_min: 8,
            harvest_max: 20,
            strategies: Vec::new(),
            governance: GovernanceConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: RunConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn strategy_for(&self, index: usize) -> StrategyKind {
        self.strategies.get(index).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version != SCHEMA_VERSION_V1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported schema_version {}",
                self.schema_version
            )));
        }
        if self.island_count == 0 {
            return Err(ConfigError::Invalid("island_count must be positive".to_string()));
        }
        if self.initial_common_pool < 0 || self.initial_resources < 0 {
            return Err(ConfigError::Invalid(
                "initial balances must be non-negative".to_string(),
            ));
        }
        if self.harvest_min < 0 || self.harvest_max < self.harvest_min {
            return Err(ConfigError::Invalid(format!(
                "harvest range [{}, {}] is invalid",
                self.harvest_min, self.harvest_max
            )));
        }
        self.governance.validate()
    }
}
