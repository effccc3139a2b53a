//! Mutable view of a run that the branches share while one cycle executes.

use contracts::{
    Accountability, Broadcast, ClientId, ClientView, GovernanceAction, GovernanceConfig, Message,
    Recipient, Resources, Role, VariableValuePair,
};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::guard::{DecisionGuard, Forfeit};
use crate::ledger::LedgerError;
use crate::monitor::Monitor;
use crate::roles::{Island, IslandRegistry};
use crate::rules::{RuleCatalogue, RuleError};
use crate::state::GameState;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BranchError {
    #[error("common pool resources insufficient for {branch} {action}", branch = .action.branch())]
    InsufficientBudget { action: GovernanceAction },
    #[error("{role} salary could not be paid: {source}")]
    SalaryUnpaid {
        role: Role,
        #[source]
        source: LedgerError,
    },
    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl BranchError {
    pub fn action(&self) -> Option<GovernanceAction> {
        match self {
            BranchError::InsufficientBudget { action } => Some(*action),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryOutcome {
    Paid(Resources),
    Declined,
}

pub struct CycleContext<'a> {
    pub state: &'a mut GameState,
    pub config: &'a GovernanceConfig,
    pub islands: &'a IslandRegistry,
    pub rules: &'a mut RuleCatalogue,
    pub monitor: &'a mut Monitor,
    pub guard: &'a DecisionGuard,
    pub outbox: &'a mut Vec<Broadcast>,
}

impl CycleContext<'_> {
    pub fn turn(&self) -> u64 {
        self.state.turn
    }

    pub fn view(&self, client: &ClientId) -> ClientView {
        self.state.client_view(client, &*self.rules)
    }

    pub fn island(&self, client: &ClientId) -> Option<Arc<dyn Island>> {
        self.islands.get(client).cloned()
    }

    /// Debit the common pool for `action` and charge the acting role's budget.
    ///
    /// Fails without touching any balance when the pool cannot cover the cost,
    /// or when role budgets are enforced and the role's budget cannot.
    pub fn incur_service_charge(&mut self, action: GovernanceAction) -> Result<(), BranchError> {
        let cost = self.config.cost(action);
        let role = action.branch().role();
        let budget = self.state.roles_budget.get(&role).copied().unwrap_or(0);
        if self.config.enforce_role_budgets && budget < cost {
            debug!(%action, cost, budget, "role budget exhausted");
            return Err(BranchError::InsufficientBudget { action });
        }
        self.state
            .common_pool
            .withdraw(cost, &format!("service_charge:{action}"))
            .map_err(|_| BranchError::InsufficientBudget { action })?;
        *self.state.roles_budget.entry(role).or_insert(0) -= cost;
        debug!(%action, cost, pool = self.state.common_pool.balance(), "service charge incurred");
        Ok(())
    }

    pub fn record_accountability(&mut self, client: &ClientId, pairs: Vec<VariableValuePair>) {
        let turn = self.turn();
        self.state
            .history
            .append(Accountability::new(client.clone(), turn, pairs));
    }

    /// Queue a message from the current holder of `sender_role` and hand it to
    /// every recipient island.
    pub fn send(&mut self, sender_role: Role, recipient: Recipient, content: Message) {
        let sender = self.state.roles.holder(sender_role).clone();
        let targets = match &recipient {
            Recipient::All => self.state.living_clients(),
            Recipient::Client(client) => vec![client.clone()],
        };
        for target in targets {
            let Some(island) = self.island(&target) else {
                continue;
            };
            let from = sender.clone();
            let message = content.clone();
            let _ = self
                .guard
                .decide(&target, "receive_communication", move || {
                    island.receive_communication(&from, &message)
                });
        }
        self.outbox.push(Broadcast {
            turn: self.turn(),
            sender,
            sender_role,
            recipient,
            content,
        });
    }

    pub fn broadcast(&mut self, sender_role: Role, content: Message) {
        self.send(sender_role, Recipient::All, content);
    }

    /// Transfer a salary the paying role agreed to. A declined or forfeited
    /// decision pays nothing and is not an error.
    pub fn pay_salary(
        &mut self,
        role: Role,
        decision: Result<Option<Resources>, Forfeit>,
    ) -> Result<SalaryOutcome, BranchError> {
        let amount = match decision {
            Ok(Some(amount)) if amount > 0 => amount,
            Ok(_) | Err(_) => {
                debug!(%role, "salary declined");
                return Ok(SalaryOutcome::Declined);
            }
        };
        let recipient = self.state.roles.holder(role).clone();
        match self
            .state
            .pay_from_common_pool(&recipient, amount, &format!("salary:{role}"))
        {
            Ok(paid) => Ok(SalaryOutcome::Paid(paid)),
            Err(source) => {
                warn!(%role, amount, %source, "salary could not be paid");
                Err(BranchError::SalaryUnpaid { role, source })
            }
        }
    }
}
