//! Vote entity: the governed question and its lifecycle flags.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state derived from the `is_started` / `is_ended` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteState {
    /// Created, still editable, not castable.
    NotStarted,
    /// Casts are accepted.
    InProgress,
    /// Frozen; the snapshot on the choices is authoritative.
    Ended,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Committee whose members are eligible to cast.
    #[sea_orm(indexed)]
    pub committee_id: String,

    /// Meeting this vote accompanies, if any.
    #[sea_orm(nullable, indexed)]
    pub meeting_id: Option<String>,

    /// The question being voted on.
    #[sea_orm(column_type = "Text")]
    pub question: String,

    /// Scheduled opening (informational only).
    #[sea_orm(nullable)]
    pub start_date: Option<DateTimeWithTimeZone>,

    /// Scheduled closing (informational only).
    #[sea_orm(nullable)]
    pub end_date: Option<DateTimeWithTimeZone>,

    pub is_started: bool,

    pub is_ended: bool,

    /// Set when the vote ended with a single winning choice.
    #[sea_orm(nullable)]
    pub winner_choice_id: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub started_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub ended_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> VoteState {
        match (self.is_started, self.is_ended) {
            (_, true) => VoteState::Ended,
            (true, false) => VoteState::InProgress,
            (false, false) => VoteState::NotStarted,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vote_choice::Entity")]
    Choices,
    #[sea_orm(has_many = "super::vote_cast::Entity")]
    Casts,
}

impl Related<super::vote_choice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Choices.def()
    }
}

impl Related<super::vote_cast::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Casts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
