//! Vote choice entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote_choice")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Owning vote
    #[sea_orm(indexed)]
    pub vote_id: String,

    /// Display order within the vote (0-based)
    pub position: i32,

    #[sea_orm(column_type = "Text")]
    pub text: String,

    /// Snapshot: number of casts, written when the vote ends
    #[sea_orm(nullable)]
    pub vote_count: Option<i32>,

    /// Snapshot: rounded share of all casts, written when the vote ends
    #[sea_orm(nullable)]
    pub percentage: Option<i32>,

    /// Snapshot: whether this choice won, written when the vote ends
    #[sea_orm(nullable)]
    pub is_winner: Option<bool>,
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
    #[sea_orm(has_many = "super::vote_cast::Entity")]
    Casts,
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::vote_cast::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Casts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
