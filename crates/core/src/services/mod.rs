//! Business logic services.

#![allow(missing_docs)]

pub mod committee;
pub mod tally;
pub mod vote;

pub use committee::{CommitteeService, ListMembersInput, MemberInput, MemberView};
pub use tally::{ChoiceTally, TallyView};
pub use vote::{
    CastInput, CastView, ChoiceView, CreateVoteInput, ListVotesInput, UpdateVoteInput, VoteService, VoteView,
};
