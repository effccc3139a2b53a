//! v1 cross-boundary contracts for the governance kernel, API and CLI.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod rules;
pub mod serde_u64_string;

pub use config::{
    ActionCosts, Branch, ConfigError, GovernanceAction, GovernanceConfig, RunConfig,
    SanctionTier, StrategyKind,
};
pub use rules::{Accountability, AuxCode, RuleMatrix, VariableName, VariableValuePair};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Whole resource units. Every balance in the simulation is integral so ledger
/// arithmetic is exact.
pub type Resources = i64;

/// Orders by name prefix, then by numeric suffix, so `island_2` sorts before
/// `island_10`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical id for the `index`-th island (1-based).
    pub fn island(index: usize) -> Self {
        Self(format!("island_{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn sort_key(&self) -> (&str, Option<u64>) {
        let prefix = self.0.trim_end_matches(|c: char| c.is_ascii_digit());
        (prefix, self.0[prefix.len()..].parse().ok())
    }
}

impl Ord for ClientId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ClientId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    President,
    Speaker,
    Judge,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::President, Role::Speaker, Role::Judge];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::President => "president",
            Role::Speaker => "speaker",
            Role::Judge => "judge",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single holder of each role. Only election commits mutate it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleAssignment {
    pub president: ClientId,
    pub speaker: ClientId,
    pub judge: ClientId,
}

impl RoleAssignment {
    pub fn holder(&self, role: Role) -> &ClientId {
        match role {
            Role::President => &self.president,
            Role::Speaker => &self.speaker,
            Role::Judge => &self.judge,
        }
    }

    pub fn assign(&mut self, role: Role, client: ClientId) {
        match role {
            Role::President => self.president = client,
            Role::Speaker => self.speaker = client,
            Role::Judge => self.judge = client,
        }
    }

    pub fn roles_held_by<'a>(&'a self, client: &'a ClientId) -> impl Iterator<Item = Role> + 'a {
        Role::ALL
            .into_iter()
            .filter(move |role| self.holder(*role) == client)
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "president={} speaker={} judge={}",
            self.president, self.speaker, self.judge
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LifeStatus {
    #[default]
    Alive,
    Critical,
    Dead,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub resources: Resources,
    pub life_status: LifeStatus,
    #[serde(default)]
    pub critical_consecutive_turns: u32,
}

impl ClientInfo {
    pub fn new(resources: Resources) -> Self {
        Self {
            resources,
            life_status: LifeStatus::Alive,
            critical_consecutive_turns: 0,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.life_status != LifeStatus::Dead
    }
}

/// A client's self-declared private resources. `reported == false` means the
/// client withheld its figure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ResourceReport {
    pub reported: bool,
    pub reported_amount: Resources,
}

impl ResourceReport {
    pub fn withheld() -> Self {
        Self::default()
    }

    pub fn declared(amount: Resources) -> Self {
        Self {
            reported: true,
            reported_amount: amount,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoteChoice {
    For,
    Against,
    #[default]
    Abstain,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VotingMethod {
    #[default]
    Plurality,
    BordaCount,
}

/// How an appointing role wants the next election run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ElectionSettings {
    pub hold_election: bool,
    pub voting_method: VotingMethod,
    pub voters: Vec<ClientId>,
}

impl ElectionSettings {
    pub fn skip() -> Self {
        Self {
            hold_election: false,
            voting_method: VotingMethod::Plurality,
            voters: Vec::new(),
        }
    }

    pub fn plurality(voters: Vec<ClientId>) -> Self {
        Self {
            hold_election: true,
            voting_method: VotingMethod::Plurality,
            voters,
        }
    }
}

// ---------------------------------------------------------------------------
// Communication
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommunicationField {
    TaxAmount,
    AllocationAmount,
    SanctionAmount,
    RuleName,
    RuleVoteResult,
    RoleMonitored,
    MonitoredClient,
    MonitoringResult,
    PardonedClient,
    AppointedRole,
    AppointedClient,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommunicationContent {
    Integer(i64),
    Text(String),
    Boolean(bool),
    Role(Role),
}

pub type Message = BTreeMap<CommunicationField, CommunicationContent>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "client_id", rename_all = "snake_case")]
pub enum Recipient {
    All,
    Client(ClientId),
}

/// A message sent by a role holder during a governance cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Broadcast {
    pub turn: u64,
    pub sender: ClientId,
    pub sender_role: Role,
    pub recipient: Recipient,
    pub content: Message,
}

// ---------------------------------------------------------------------------
// Views and outcomes
// ---------------------------------------------------------------------------

/// Public game-state view handed to every decision callback. Owned so a
/// callback can run on a worker thread under a deadline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientView {
    pub turn: u64,
    pub client_id: ClientId,
    pub own: ClientInfo,
    pub common_pool: Resources,
    pub roles: RoleAssignment,
    pub turns_in_power: BTreeMap<Role, u64>,
    pub living_clients: Vec<ClientId>,
    pub rules_in_play: Vec<String>,
    pub available_rules: Vec<String>,
}

/// Result of one governance cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleOutcome {
    pub turn: u64,
    pub success: bool,
    pub description: String,
    pub failed_action: Option<GovernanceAction>,
    pub broadcasts: Vec<Broadcast>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnRecord {
    pub turn: u64,
    pub success: bool,
    pub description: String,
    pub roles: RoleAssignment,
    pub common_pool: Resources,
    pub living_clients: usize,
    pub taxes_collected: Resources,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldStatus {
    pub schema_version: String,
    pub run_id: String,
    pub current_turn: u64,
    pub max_turns: u64,
    pub living_clients: usize,
    pub common_pool: Resources,
    pub roles: RoleAssignment,
    pub halted: Option<String>,
}

impl WorldStatus {
    pub fn is_complete(&self) -> bool {
        self.current_turn >= self.max_turns || self.living_clients == 0
    }
}

impl fmt::Display for WorldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={} turn={}/{} living={} pool={} {}",
            self.run_id,
            self.current_turn,
            self.max_turns,
            self.living_clients,
            self.common_pool,
            self.roles
        )?;
        if let Some(reason) = &self.halted {
            write!(f, " halted={reason}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// API errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RunNotFound,
    InvalidConfig,
    InvalidQuery,
    TurnOutOfRange,
    RunHalted,
    InternalError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub schema_version: String,
    pub error_code: ErrorCode,
    pub message: String,
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(error_code: ErrorCode, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            error_code,
            message: message.into(),
            details,
        }
    }
}
