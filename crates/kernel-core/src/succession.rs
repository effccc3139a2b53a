//! Who appoints whom, and the election procedure every appointing branch runs.

use contracts::{
    ClientId, ClientView, ElectionSettings, GovernanceAction, Role, VariableName,
    VariableValuePair,
};
use tracing::{info, warn};

use crate::context::{BranchError, CycleContext};
use crate::roles::TermStatus;
use crate::voting::Election;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Succession {
    pub appointer: Role,
    pub appointee: Role,
    pub action: GovernanceAction,
}

/// Elections run in this order. No role appoints its own successor.
pub const SUCCESSION: [Succession; 3] = [
    Succession {
        appointer: Role::Speaker,
        appointee: Role::Judge,
        action: GovernanceAction::AppointNextJudge,
    },
    Succession {
        appointer: Role::President,
        appointee: Role::Speaker,
        action: GovernanceAction::AppointNextSpeaker,
    },
    Succession {
        appointer: Role::Judge,
        appointee: Role::President,
        action: GovernanceAction::AppointNextPresident,
    },
];

pub fn succession_for(appointee: Role) -> Succession {
    match appointee {
        Role::Judge => SUCCESSION[0],
        Role::Speaker => SUCCESSION[1],
        Role::President => SUCCESSION[2],
    }
}

/// Outcome of one appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointed {
    pub client: ClientId,
    pub election_held: bool,
}

pub(crate) struct Appointment<'r> {
    pub succession: Succession,
    pub appointer: &'r ClientId,
    pub incumbent: &'r ClientId,
    pub monitoring: bool,
    pub candidates: &'r [ClientId],
}

/// Charge for the appointment, let the appointer decide whether to hold an
/// election, run it and let the appointer name the successor.
///
/// Election conduct lands in the monitor cache under the appointer's id.
pub(crate) fn conduct_appointment<C, D>(
    ctx: &mut CycleContext<'_>,
    appointment: Appointment<'_>,
    call_election: C,
    decide_next: D,
) -> Result<Appointed, BranchError>
where
    C: FnOnce(&ClientView, bool, TermStatus, &[ClientId]) -> ElectionSettings + Send + 'static,
    D: FnOnce(&ClientView, &ClientId) -> ClientId + Send + 'static,
{
    let Succession {
        appointee, action, ..
    } = appointment.succession;
    ctx.incur_service_charge(action)?;

    let term = TermStatus {
        turns_in_power: ctx.state.turns_in_power(appointee),
        term_length: ctx.config.term_length(appointee),
    };
    let view = ctx.view(appointment.appointer);
    let monitoring = appointment.monitoring;
    let candidates = appointment.candidates.to_vec();
    let settings = {
        let view = view.clone();
        ctx.guard
            .decide(appointment.appointer, "call_election", move || {
                call_election(&view, monitoring, term, &candidates)
            })
            .unwrap_or_else(|_| ElectionSettings::skip())
    };

    if !settings.hold_election {
        ctx.monitor.add_to_cache(
            appointment.appointer,
            [
                VariableValuePair::flag(VariableName::TermEnded, term.expired()),
                VariableValuePair::flag(VariableName::ElectionHeld, false),
                VariableValuePair::flag(VariableName::AppointmentMatchesVote, true),
            ],
        );
        return Ok(Appointed {
            client: appointment.incumbent.clone(),
            election_held: false,
        });
    }

    let voters = if settings.voters.is_empty() {
        appointment.candidates.to_vec()
    } else {
        settings.voters
    };
    let mut election = Election::propose(appointee, settings.voting_method)
        .open_ballot(appointment.candidates.to_vec(), voters);
    election.vote(ctx);
    let winner = election
        .close_ballot()
        .unwrap_or_else(|| appointment.incumbent.clone());

    let chosen = {
        let elected = winner.clone();
        ctx.guard
            .decide(appointment.appointer, "decide_next", move || decide_next(&view, &elected))
            .unwrap_or_else(|_| winner.clone())
    };
    let appointed = if ctx.state.is_alive(&chosen) {
        chosen
    } else {
        warn!(role = %appointee, client = %chosen, "appointee is not a living client");
        winner.clone()
    };

    ctx.monitor.add_to_cache(
        appointment.appointer,
        [
            VariableValuePair::flag(VariableName::TermEnded, term.expired()),
            VariableValuePair::flag(VariableName::ElectionHeld, true),
            VariableValuePair::flag(VariableName::AppointmentMatchesVote, appointed == winner),
        ],
    );
    info!(role = %appointee, winner = %winner, appointed = %appointed, "appointment decided");
    Ok(Appointed {
        client: appointed,
        election_held: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_is_appointed_once_by_another_role() {
        for role in Role::ALL {
            let entries = SUCCESSION
                .iter()
                .filter(|succession| succession.appointee == role)
                .collect::<Vec<_>>();
            assert_eq!(entries.len(), 1);
            assert_ne!(entries[0].appointer, role);
            assert_eq!(*entries[0], succession_for(role));
            assert_eq!(entries[0].action.branch().role(), entries[0].appointer);
        }
    }
}
