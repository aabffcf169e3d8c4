//! Create vote_cast table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(VoteCast::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(VoteCast::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(VoteCast::VoteId).string_len(32).not_null())
                    .col(ColumnDef::new(VoteCast::MemberId).string_len(64).not_null())
                    .col(ColumnDef::new(VoteCast::ChoiceId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(VoteCast::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(VoteCast::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_cast_vote")
                            .from(VoteCast::Table, VoteCast::VoteId)
                            .to(Vote::Table, Vote::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_cast_choice")
                            .from(VoteCast::Table, VoteCast::ChoiceId)
                            .to(VoteChoice::Table, VoteChoice::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (vote_id, member_id) - the upsert conflict target
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_cast_unique")
                    .table(VoteCast::Table)
                    .col(VoteCast::VoteId)
                    .col(VoteCast::MemberId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: choice_id (for per-choice aggregation)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_cast_choice_id")
                    .table(VoteCast::Table)
                    .col(VoteCast::ChoiceId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VoteCast::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum VoteCast {
    Table,
    Id,
    VoteId,
    MemberId,
    ChoiceId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Vote {
    Table,
    Id,
}

#[derive(Iden)]
enum VoteChoice {
    Table,
    Id,
}
