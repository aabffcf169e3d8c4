//! Committee roster service.

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{entities::committee_member, repositories::CommitteeMemberRepository};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

/// Input naming one member of one committee.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MemberInput {
    #[validate(length(min = 1, max = 64))]
    pub committee_id: String,
    #[validate(length(min = 1, max = 64))]
    pub member_id: String,
}

/// Input for listing a committee's roster.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListMembersInput {
    #[validate(length(min = 1, max = 64))]
    pub committee_id: String,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

/// A roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberView {
    pub committee_id: String,
    pub member_id: String,
    pub joined_at: DateTime<FixedOffset>,
}

impl From<committee_member::Model> for MemberView {
    fn from(m: committee_member::Model) -> Self {
        Self {
            committee_id: m.committee_id,
            member_id: m.member_id,
            joined_at: m.joined_at,
        }
    }
}

/// Service managing who may cast in a committee's votes.
#[derive(Clone)]
pub struct CommitteeService {
    member_repo: CommitteeMemberRepository,
    id_gen: IdGenerator,
}

impl CommitteeService {
    /// Create a new committee service.
    #[must_use]
    pub const fn new(member_repo: CommitteeMemberRepository) -> Self {
        Self {
            member_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Put a member on a committee's roster. Adding twice is harmless.
    pub async fn add_member(&self, input: MemberInput) -> AppResult<MemberView> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let member = self
            .member_repo
            .add(self.id_gen.generate(), &input.committee_id, &input.member_id)
            .await?;

        info!(committee_id = %member.committee_id, member_id = %member.member_id, "Member on roster");
        Ok(member.into())
    }

    /// Take a member off a committee's roster. Their casts stay.
    pub async fn remove_member(&self, input: MemberInput) -> AppResult<()> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if !self
            .member_repo
            .remove(&input.committee_id, &input.member_id)
            .await?
        {
            return Err(AppError::NotFound(format!(
                "{} is not a member of committee {}",
                input.member_id, input.committee_id
            )));
        }

        info!(committee_id = %input.committee_id, member_id = %input.member_id, "Member removed from roster");
        Ok(())
    }

    /// Whether a member sits on a committee.
    pub async fn is_member(&self, committee_id: &str, member_id: &str) -> AppResult<bool> {
        self.member_repo.is_member(committee_id, member_id).await
    }

    pub async fn list_members(&self, input: ListMembersInput) -> AppResult<Vec<MemberView>> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let members = self
            .member_repo
            .list(&input.committee_id, input.limit, input.offset)
            .await?;
        Ok(members.into_iter().map(MemberView::from).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_member_validates_ids() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let svc = CommitteeService::new(CommitteeMemberRepository::new(db));

        let result = svc
            .add_member(MemberInput {
                committee_id: String::new(),
                member_id: "alice".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_remove_unknown_member_is_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );
        let svc = CommitteeService::new(CommitteeMemberRepository::new(db));

        let result = svc
            .remove_member(MemberInput {
                committee_id: "cmt1".to_string(),
                member_id: "ghost".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
