//! Committee roster repository.

use std::sync::Arc;

use agora_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};

use crate::entities::{CommitteeMember, committee_member};

/// Repository for committee membership.
#[derive(Clone)]
pub struct CommitteeMemberRepository {
    db: Arc<DatabaseConnection>,
}

impl CommitteeMemberRepository {
    /// Create a new committee member repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a roster entry.
    pub async fn find(
        &self,
        committee_id: &str,
        member_id: &str,
    ) -> AppResult<Option<committee_member::Model>> {
        CommitteeMember::find()
            .filter(committee_member::Column::CommitteeId.eq(committee_id))
            .filter(committee_member::Column::MemberId.eq(member_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check whether a member sits on a committee.
    pub async fn is_member(&self, committee_id: &str, member_id: &str) -> AppResult<bool> {
        Ok(self.find(committee_id, member_id).await?.is_some())
    }

    /// Add a member to a committee.
    ///
    /// Adding an existing member returns the existing entry unchanged.
    pub async fn add(
        &self,
        id: String,
        committee_id: &str,
        member_id: &str,
    ) -> AppResult<committee_member::Model> {
        if let Some(existing) = self.find(committee_id, member_id).await? {
            return Ok(existing);
        }

        let model = committee_member::ActiveModel {
            id: Set(id),
            committee_id: Set(committee_id.to_string()),
            member_id: Set(member_id.to_string()),
            joined_at: Set(Utc::now().fixed_offset()),
        };

        match model.insert(self.db.as_ref()).await.map_err(AppError::from) {
            Ok(inserted) => Ok(inserted),
            // Lost the race against a concurrent add of the same member.
            Err(AppError::Conflict(_)) => self.find(committee_id, member_id).await?.ok_or_else(|| {
                AppError::Conflict(format!(
                    "Membership of {member_id} in {committee_id} changed concurrently"
                ))
            }),
            Err(e) => Err(e),
        }
    }

    /// Remove a member from a committee.
    ///
    /// Returns `false` if the member was not on the roster.
    pub async fn remove(&self, committee_id: &str, member_id: &str) -> AppResult<bool> {
        let result = CommitteeMember::delete_many()
            .filter(committee_member::Column::CommitteeId.eq(committee_id))
            .filter(committee_member::Column::MemberId.eq(member_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// List the members of a committee in joining order.
    pub async fn list(
        &self,
        committee_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<committee_member::Model>> {
        CommitteeMember::find()
            .filter(committee_member::Column::CommitteeId.eq(committee_id))
            .order_by(committee_member::Column::JoinedAt, Order::Asc)
            .order_by(committee_member::Column::MemberId, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count the members of a committee.
    pub async fn count(&self, committee_id: &str) -> AppResult<u64> {
        CommitteeMember::find()
            .filter(committee_member::Column::CommitteeId.eq(committee_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
