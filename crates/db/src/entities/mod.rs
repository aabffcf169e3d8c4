//! Database entities.

pub mod committee_member;
pub mod vote;
pub mod vote_cast;
pub mod vote_choice;

pub use committee_member::Entity as CommitteeMember;
pub use vote::Entity as Vote;
pub use vote_cast::Entity as VoteCast;
pub use vote_choice::Entity as VoteChoice;
