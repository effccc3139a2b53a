//! Per-turn observation cache of role-holder conduct and the cross-role
//! monitoring that reads it.

use std::collections::BTreeMap;

use contracts::{ClientId, CommunicationContent, CommunicationField, Message, Role, VariableValuePair};
use serde::Serialize;
use tracing::debug;

use crate::context::CycleContext;

/// Observer and observed role, in the order monitoring runs.
pub const MONITORING_PAIRS: [(Role, Role); 3] = [
    (Role::Judge, Role::Speaker),
    (Role::Speaker, Role::President),
    (Role::President, Role::Judge),
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct Monitor {
    cache: BTreeMap<ClientId, Vec<VariableValuePair>>,
    clears: u64,
}

impl Monitor {
    pub fn add_to_cache(&mut self, client: &ClientId, pairs: impl IntoIterator<Item = VariableValuePair>) {
        self.cache.entry(client.clone()).or_default().extend(pairs);
    }

    pub fn observations(&self, client: &ClientId) -> &[VariableValuePair] {
        self.cache.get(client).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.clears += 1;
    }

    /// Drop leftover observations between cycles. Not counted as a clear.
    pub fn discard(&mut self) {
        self.cache.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// How many times the cache has been cleared over the run.
    pub fn clear_count(&self) -> u64 {
        self.clears
    }
}

/// Let the holder of `observer` check the cached conduct of the holder of
/// `observed`. A role that is not monitored counts as having behaved.
pub fn monitor_role(ctx: &mut CycleContext<'_>, observer: Role, observed: Role) -> bool {
    let observer_id = ctx.state.roles.holder(observer).clone();
    let observed_id = ctx.state.roles.holder(observed).clone();
    let Some(island) = ctx.island(&observer_id) else {
        return true;
    };

    let view = ctx.view(&observer_id);
    let decider = island.clone();
    let decision_view = view.clone();
    let monitoring = ctx
        .guard
        .decide(&observer_id, "monitor_iigo_role", move || {
            decider.monitor_iigo_role(&decision_view, observed)
        })
        .unwrap_or(false);
    if !monitoring {
        return true;
    }

    let report = ctx.rules.evaluate_client(ctx.monitor.observations(&observed_id));
    let behaved = report.is_compliant();
    debug!(%observer, %observed, client = %observed_id, behaved, "role monitored");

    let announcement = ctx
        .guard
        .decide(&observer_id, "decide_monitoring_announcement", move || {
            island.decide_monitoring_announcement(&view, observed, behaved)
        })
        .ok()
        .flatten();
    if let Some(shared) = announcement {
        let mut content = Message::new();
        content.insert(CommunicationField::RoleMonitored, CommunicationContent::Role(observed));
        content.insert(
            CommunicationField::MonitoredClient,
            CommunicationContent::Text(observed_id.to_string()),
        );
        content.insert(CommunicationField::MonitoringResult, CommunicationContent::Boolean(shared));
        ctx.broadcast(observer, content);
    }
    behaved
}

/// Monitoring result keyed by the observed role.
pub fn monitor_all(ctx: &mut CycleContext<'_>) -> BTreeMap<Role, bool> {
    MONITORING_PAIRS
        .into_iter()
        .map(|(observer, observed)| (observed, monitor_role(ctx, observer, observed)))
        .collect()
}

#[cfg(test)]
mod tests {
    use contracts::VariableName;

    use super::*;

    #[test]
    fn cache_accumulates_and_clears() {
        let mut monitor = Monitor::default();
        let speaker = ClientId::island(2);
        monitor.add_to_cache(&speaker, [VariableValuePair::flag(VariableName::RuleSelected, true)]);
        monitor.add_to_cache(&speaker, [VariableValuePair::flag(VariableName::VoteCalled, false)]);
        assert_eq!(monitor.observations(&speaker).len(), 2);

        monitor.clear_cache();
        assert!(monitor.is_empty());
        assert!(monitor.observations(&speaker).is_empty());
        assert_eq!(monitor.clear_count(), 1);
    }

    #[test]
    fn second_pass_sees_only_election_conduct() {
        let mut monitor = Monitor::default();
        let speaker = ClientId::island(2);
        monitor.add_to_cache(&speaker, [VariableValuePair::flag(VariableName::VoteCalled, false)]);
        monitor.clear_cache();

        monitor.add_to_cache(&speaker, [VariableValuePair::flag(VariableName::ElectionHeld, true)]);
        let second = monitor.observations(&speaker);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].variable, VariableName::ElectionHeld);

        monitor.clear_cache();
        monitor.discard();
        assert_eq!(monitor.clear_count(), 2);
    }

    #[test]
    fn every_role_is_observed_exactly_once() {
        let observed: Vec<Role> = MONITORING_PAIRS.iter().map(|(_, role)| *role).collect();
        for role in Role::ALL {
            assert_eq!(observed.iter().filter(|r| **r == role).count(), 1);
        }
        assert!(MONITORING_PAIRS.iter().all(|(observer, observed)| observer != observed));
    }
}
