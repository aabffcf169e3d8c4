//! Vote cast entity: one member's current selection for a vote.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote_cast")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Vote cast on. Unique together with `member_id`.
    #[sea_orm(indexed)]
    pub vote_id: String,

    /// Member who cast
    pub member_id: String,

    /// Currently selected choice
    #[sea_orm(indexed)]
    pub choice_id: String,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vote::Entity",
        from = "Column::VoteId",
        to = "super::vote::Column::Id",
        on_delete = "Cascade"
    )]
    Vote,

    #[sea_orm(
        belongs_to = "super::vote_choice::Entity",
        from = "Column::ChoiceId",
        to = "super::vote_choice::Column::Id",
        on_delete = "Cascade"
    )]
    Choice,
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::vote_choice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Choice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
