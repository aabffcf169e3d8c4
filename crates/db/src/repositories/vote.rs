//! Vote repository: the Vote Record Store.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::Expr,
};

use crate::entities::{Vote, VoteCast, VoteChoice, vote, vote_cast, vote_choice};

/// Frozen result for one choice, written when a vote ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceSnapshot {
    pub choice_id: String,
    pub vote_count: i32,
    pub percentage: i32,
    pub is_winner: bool,
}

/// Repository for votes and their choices.
///
/// Methods taking a [`DatabaseTransaction`] are the building blocks of the
/// lifecycle transitions and must run inside the caller's transaction.
#[derive(Clone)]
pub struct VoteRepository {
    db: Arc<DatabaseConnection>,
}

impl VoteRepository {
    /// Create a new vote repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Begin a transaction on the underlying connection.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db.begin().await.map_err(AppError::from)
    }

    // ==================== Vote Operations ====================

    /// Find a vote by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<vote::Model>> {
        Vote::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a vote by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<vote::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vote not found: {id}")))
    }

    /// Find votes of a committee, newest first.
    pub async fn find_by_committee(
        &self,
        committee_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::CommitteeId.eq(committee_id))
            .order_by(vote::Column::CreatedAt, Order::Desc)
            .order_by(vote::Column::Id, Order::Desc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find votes attached to a meeting, oldest first (agenda order).
    pub async fn find_by_meeting(
        &self,
        meeting_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<vote::Model>> {
        Vote::find()
            .filter(vote::Column::MeetingId.eq(meeting_id))
            .order_by(vote::Column::CreatedAt, Order::Asc)
            .order_by(vote::Column::Id, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a vote together with its choices in one transaction.
    pub async fn create_with_choices(
        &self,
        vote: vote::ActiveModel,
        choices: Vec<vote_choice::ActiveModel>,
    ) -> AppResult<(vote::Model, Vec<vote_choice::Model>)> {
        let txn = self.begin().await?;

        let vote = vote
            .insert(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        VoteChoice::insert_many(choices)
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let choices = self.find_choices_in(&txn, &vote.id).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok((vote, choices))
    }

    /// Delete a vote with its choices and casts.
    ///
    /// Returns `false` if no such vote existed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let txn = self.begin().await?;

        VoteCast::delete_many()
            .filter(vote_cast::Column::VoteId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        VoteChoice::delete_many()
            .filter(vote_choice::Column::VoteId.eq(id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let deleted = Vote::delete_by_id(id)
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(deleted.rows_affected > 0)
    }

    /// Flip `is_started` if the vote has not been started yet.
    ///
    /// Returns `false` when the guard did not match (already started or missing).
    pub async fn mark_started(&self, id: &str) -> AppResult<bool> {
        let timestamp = Utc::now().fixed_offset();

        let result = Vote::update_many()
            .col_expr(vote::Column::IsStarted, Expr::value(true))
            .col_expr(vote::Column::StartedAt, Expr::value(Some(timestamp)))
            .col_expr(vote::Column::UpdatedAt, Expr::value(Some(timestamp)))
            .filter(vote::Column::Id.eq(id))
            .filter(vote::Column::IsStarted.eq(false))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected == 1)
    }

    // ==================== Transactional Building Blocks ====================

    /// Read a vote under a shared row lock.
    ///
    /// Concurrent shared lockers (casts) do not block each other, but they
    /// block and are blocked by [`Self::mark_ended`] on the same row.
    ///
    /// `SQLite` has no row locks. There the transaction claims the database
    /// write lock before reading, so it never has to upgrade a read lock
    /// while another writer is active.
    pub async fn find_for_share(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
    ) -> AppResult<Option<vote::Model>> {
        if txn.get_database_backend() == DbBackend::Sqlite {
            Self::claim_write_lock(txn, id).await?;
            return Vote::find_by_id(id).one(txn).await.map_err(AppError::from);
        }

        Vote::find_by_id(id)
            .lock_shared()
            .one(txn)
            .await
            .map_err(AppError::from)
    }

    /// Read a vote under an exclusive row lock.
    pub async fn find_for_update(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
    ) -> AppResult<Option<vote::Model>> {
        if txn.get_database_backend() == DbBackend::Sqlite {
            Self::claim_write_lock(txn, id).await?;
            return Vote::find_by_id(id).one(txn).await.map_err(AppError::from);
        }

        Vote::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(AppError::from)
    }

    /// No-op write on the vote row. On `SQLite` this takes the database
    /// write lock, waiting out the busy timeout if another writer holds it.
    async fn claim_write_lock(txn: &DatabaseTransaction, id: &str) -> AppResult<()> {
        Vote::update_many()
            .col_expr(vote::Column::UpdatedAt, Expr::col(vote::Column::UpdatedAt).into())
            .filter(vote::Column::Id.eq(id))
            .exec(txn)
            .await
            .map_err(AppError::from)?;
        Ok(())
    }

    /// Write a modified vote inside a transaction.
    pub async fn update_in(
        &self,
        txn: &DatabaseTransaction,
        model: vote::ActiveModel,
    ) -> AppResult<vote::Model> {
        model
            .update(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Replace the full choice set of a vote inside a transaction.
    pub async fn replace_choices_in(
        &self,
        txn: &DatabaseTransaction,
        vote_id: &str,
        choices: Vec<vote_choice::ActiveModel>,
    ) -> AppResult<Vec<vote_choice::Model>> {
        VoteChoice::delete_many()
            .filter(vote_choice::Column::VoteId.eq(vote_id))
            .exec(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        VoteChoice::insert_many(choices)
            .exec_without_returning(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_choices_in(txn, vote_id).await
    }

    /// Flip `is_ended` if the vote is started and not yet ended.
    ///
    /// Returns `false` when the guard did not match. On PostgreSQL the
    /// update holds the row lock until the transaction finishes, so casts
    /// waiting on [`Self::find_for_share`] observe the ended vote.
    pub async fn mark_ended(&self, txn: &DatabaseTransaction, id: &str) -> AppResult<bool> {
        let timestamp = Utc::now().fixed_offset();

        let result = Vote::update_many()
            .col_expr(vote::Column::IsEnded, Expr::value(true))
            .col_expr(vote::Column::EndedAt, Expr::value(Some(timestamp)))
            .col_expr(vote::Column::UpdatedAt, Expr::value(Some(timestamp)))
            .filter(vote::Column::Id.eq(id))
            .filter(vote::Column::IsStarted.eq(true))
            .filter(vote::Column::IsEnded.eq(false))
            .exec(txn)
            .await
            .map_err(AppError::from)?;

        Ok(result.rows_affected == 1)
    }

    /// Persist the frozen tally onto the choices and the winner onto the vote.
    pub async fn write_snapshot(
        &self,
        txn: &DatabaseTransaction,
        vote_id: &str,
        winner_choice_id: Option<String>,
        snapshots: &[ChoiceSnapshot],
    ) -> AppResult<()> {
        for snapshot in snapshots {
            let result = VoteChoice::update_many()
                .col_expr(
                    vote_choice::Column::VoteCount,
                    Expr::value(Some(snapshot.vote_count)),
                )
                .col_expr(
                    vote_choice::Column::Percentage,
                    Expr::value(Some(snapshot.percentage)),
                )
                .col_expr(
                    vote_choice::Column::IsWinner,
                    Expr::value(Some(snapshot.is_winner)),
                )
                .filter(vote_choice::Column::Id.eq(snapshot.choice_id.as_str()))
                .filter(vote_choice::Column::VoteId.eq(vote_id))
                .exec(txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;

            if result.rows_affected != 1 {
                return Err(AppError::Internal(format!(
                    "Snapshot target {} is not a choice of vote {vote_id}",
                    snapshot.choice_id
                )));
            }
        }

        Vote::update_many()
            .col_expr(vote::Column::WinnerChoiceId, Expr::value(winner_choice_id))
            .filter(vote::Column::Id.eq(vote_id))
            .exec(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    // ==================== Choice Operations ====================

    /// Find the choices of a vote in display order.
    pub async fn find_choices(&self, vote_id: &str) -> AppResult<Vec<vote_choice::Model>> {
        VoteChoice::find()
            .filter(vote_choice::Column::VoteId.eq(vote_id))
            .order_by(vote_choice::Column::Position, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the choices of a vote in display order, inside a transaction.
    pub async fn find_choices_in(
        &self,
        txn: &DatabaseTransaction,
        vote_id: &str,
    ) -> AppResult<Vec<vote_choice::Model>> {
        VoteChoice::find()
            .filter(vote_choice::Column::VoteId.eq(vote_id))
            .order_by(vote_choice::Column::Position, Order::Asc)
            .all(txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a single choice by ID.
    pub async fn find_choice_by_id(&self, id: &str) -> AppResult<Option<vote_choice::Model>> {
        VoteChoice::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
