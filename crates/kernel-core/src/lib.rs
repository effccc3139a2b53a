//! Institutional governance kernel: three branches run by elected islands,
//! paid for out of a shared common pool, checked by each other every turn.

pub mod base;
pub mod context;
pub mod executive;
pub mod guard;
pub mod judiciary;
pub mod ledger;
pub mod legislature;
pub mod monitor;
pub mod orchestration;
pub mod roles;
pub mod rules;
pub mod state;
pub mod strategies;
pub mod succession;
pub mod voting;
pub mod world;

#[cfg(test)]
mod test_support;

pub use guard::{DecisionGuard, Forfeit};
pub use ledger::{CommonPool, LedgerEntry, LedgerError};
pub use orchestration::{CycleCaches, GovernanceCycle, GovernanceError};
pub use roles::{Island, IslandRegistry, Judge, President, Speaker, TermStatus};
pub use rules::{ComplianceReport, RuleCatalogue, RuleError};
pub use state::{AccountabilityLog, GameState};
pub use world::IslandWorld;
