//! Cast repository: the Cast Ledger.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    FromQueryResult, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};

use crate::entities::{VoteCast, vote_cast};

/// Number of casts currently selecting one choice.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct ChoiceCount {
    pub choice_id: String,
    pub count: i64,
}

/// Repository for member casts.
#[derive(Clone)]
pub struct CastRepository {
    db: Arc<DatabaseConnection>,
}

impl CastRepository {
    /// Create a new cast repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a member's cast on a vote.
    pub async fn find_by_vote_and_member(
        &self,
        vote_id: &str,
        member_id: &str,
    ) -> AppResult<Option<vote_cast::Model>> {
        find_by_vote_and_member(self.db.as_ref(), vote_id, member_id).await
    }

    /// Get all casts for a vote, in the order they were first made.
    pub async fn find_by_vote(&self, vote_id: &str) -> AppResult<Vec<vote_cast::Model>> {
        VoteCast::find()
            .filter(vote_cast::Column::VoteId.eq(vote_id))
            .order_by(vote_cast::Column::CreatedAt, Order::Asc)
            .order_by(vote_cast::Column::MemberId, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count casts for a vote.
    pub async fn count_by_vote(&self, vote_id: &str) -> AppResult<u64> {
        VoteCast::find()
            .filter(vote_cast::Column::VoteId.eq(vote_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Per-choice cast counts for a vote, read without locking.
    ///
    /// Choices nobody selected are absent from the result.
    pub async fn count_by_choice(&self, vote_id: &str) -> AppResult<Vec<ChoiceCount>> {
        count_by_choice(self.db.as_ref(), vote_id).await
    }

    /// Per-choice cast counts for a vote, consistent with the given transaction.
    pub async fn count_by_choice_in(
        &self,
        txn: &DatabaseTransaction,
        vote_id: &str,
    ) -> AppResult<Vec<ChoiceCount>> {
        count_by_choice(txn, vote_id).await
    }

    /// Insert a cast, or overwrite the member's existing selection.
    ///
    /// Relies on the unique `(vote_id, member_id)` index: two concurrent
    /// upserts for the same pair serialize on that index and leave exactly
    /// one row. A uniqueness violation that still surfaces is reported as
    /// [`AppError::Conflict`].
    pub async fn upsert(
        &self,
        txn: &DatabaseTransaction,
        id: String,
        vote_id: &str,
        member_id: &str,
        choice_id: &str,
    ) -> AppResult<vote_cast::Model> {
        let now = Utc::now().fixed_offset();
        let model = vote_cast::ActiveModel {
            id: Set(id),
            vote_id: Set(vote_id.to_string()),
            member_id: Set(member_id.to_string()),
            choice_id: Set(choice_id.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        VoteCast::insert(model)
            .on_conflict(
                OnConflict::columns([vote_cast::Column::VoteId, vote_cast::Column::MemberId])
                    .update_columns([vote_cast::Column::ChoiceId, vote_cast::Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(txn)
            .await
            .map_err(AppError::from)?;

        find_by_vote_and_member(txn, vote_id, member_id)
            .await?
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Cast for member {member_id} on vote {vote_id} vanished after upsert"
                ))
            })
    }
}

async fn find_by_vote_and_member<C: ConnectionTrait>(
    conn: &C,
    vote_id: &str,
    member_id: &str,
) -> AppResult<Option<vote_cast::Model>> {
    VoteCast::find()
        .filter(vote_cast::Column::VoteId.eq(vote_id))
        .filter(vote_cast::Column::MemberId.eq(member_id))
        .one(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

async fn count_by_choice<C: ConnectionTrait>(
    conn: &C,
    vote_id: &str,
) -> AppResult<Vec<ChoiceCount>> {
    VoteCast::find()
        .filter(vote_cast::Column::VoteId.eq(vote_id))
        .select_only()
        .column(vote_cast::Column::ChoiceId)
        .column_as(Expr::col(vote_cast::Column::Id).count(), "count")
        .group_by(vote_cast::Column::ChoiceId)
        .into_model::<ChoiceCount>()
        .all(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
