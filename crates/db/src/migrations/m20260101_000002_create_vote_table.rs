//! Create vote and vote_choice tables migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create vote table
        manager
            .create_table(
                Table::create()
                    .table(Vote::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Vote::Id).string_len(32).not_null().primary_key())
                    .col(ColumnDef::new(Vote::CommitteeId).string_len(64).not_null())
                    .col(ColumnDef::new(Vote::MeetingId).string_len(64))
                    .col(ColumnDef::new(Vote::Question).text().not_null())
                    .col(ColumnDef::new(Vote::StartDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Vote::EndDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Vote::IsStarted).boolean().not_null().default(false))
                    .col(ColumnDef::new(Vote::IsEnded).boolean().not_null().default(false))
                    .col(ColumnDef::new(Vote::WinnerChoiceId).string_len(32))
                    .col(
                        ColumnDef::new(Vote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Vote::UpdatedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Vote::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Vote::EndedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index: committee_id (for listing a committee's votes)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_committee_id")
                    .table(Vote::Table)
                    .col(Vote::CommitteeId)
                    .to_owned(),
            )
            .await?;

        // Index: meeting_id (for listing a meeting's votes)
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_meeting_id")
                    .table(Vote::Table)
                    .col(Vote::MeetingId)
                    .to_owned(),
            )
            .await?;

        // Create vote_choice table
        manager
            .create_table(
                Table::create()
                    .table(VoteChoice::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(VoteChoice::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(VoteChoice::VoteId).string_len(32).not_null())
                    .col(ColumnDef::new(VoteChoice::Position).integer().not_null())
                    .col(ColumnDef::new(VoteChoice::Text).text().not_null())
                    .col(ColumnDef::new(VoteChoice::VoteCount).integer())
                    .col(ColumnDef::new(VoteChoice::Percentage).integer())
                    .col(ColumnDef::new(VoteChoice::IsWinner).boolean())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_vote_choice_vote")
                            .from(VoteChoice::Table, VoteChoice::VoteId)
                            .to(Vote::Table, Vote::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (vote_id, position) - one choice per slot
        manager
            .create_index(
                Index::create()
                    .name("idx_vote_choice_position")
                    .table(VoteChoice::Table)
                    .col(VoteChoice::VoteId)
                    .col(VoteChoice::Position)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(VoteChoice::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Vote::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Vote {
    Table,
    Id,
    CommitteeId,
    MeetingId,
    Question,
    StartDate,
    EndDate,
    IsStarted,
    IsEnded,
    WinnerChoiceId,
    CreatedAt,
    UpdatedAt,
    StartedAt,
    EndedAt,
}

#[derive(Iden)]
enum VoteChoice {
    Table,
    Id,
    VoteId,
    Position,
    Text,
    VoteCount,
    Percentage,
    IsWinner,
}
