//! Create committee_member table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommitteeMember::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CommitteeMember::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CommitteeMember::CommitteeId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommitteeMember::MemberId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CommitteeMember::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (committee_id, member_id) - a member is on a roster once
        manager
            .create_index(
                Index::create()
                    .name("idx_committee_member_unique")
                    .table(CommitteeMember::Table)
                    .col(CommitteeMember::CommitteeId)
                    .col(CommitteeMember::MemberId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: member_id (for finding a member's committees)
        manager
            .create_index(
                Index::create()
                    .name("idx_committee_member_member_id")
                    .table(CommitteeMember::Table)
                    .col(CommitteeMember::MemberId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommitteeMember::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum CommitteeMember {
    Table,
    Id,
    CommitteeId,
    MemberId,
    JoinedAt,
}
