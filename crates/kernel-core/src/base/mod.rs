//! Default strategies. Every island and role holder starts from these; custom
//! strategies hold one and delegate whatever they do not override.

mod island;
mod judge;
mod president;
mod speaker;

pub use island::{BaseIsland, IslandMemory, COMFORT_LEVEL};
pub use judge::{merge_records, BaseJudge};
pub use president::{BasePresident, FLAT_TAX, TAX_PERCENTAGE};
pub use speaker::BaseSpeaker;

use contracts::{ClientId, ElectionSettings};

use crate::roles::TermStatus;

/// Hold a plurality election among all candidates when the incumbent's term
/// is over or monitoring caught misconduct.
pub fn default_election_settings(
    monitoring: bool,
    term: TermStatus,
    candidates: &[ClientId],
) -> ElectionSettings {
    if !monitoring || term.expired() {
        ElectionSettings::plurality(candidates.to_vec())
    } else {
        ElectionSettings::skip()
    }
}
