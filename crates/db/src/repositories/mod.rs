//! Repositories over the engine's tables.

mod cast;
mod committee_member;
mod vote;

pub use cast::{CastRepository, ChoiceCount};
pub use committee_member::CommitteeMemberRepository;
pub use vote::{ChoiceSnapshot, VoteRepository};
