//! Vote service: the lifecycle controller and cast protocol.

use agora_common::{AppError, AppResult, IdGenerator, config::VotingConfig};
use agora_db::{
    entities::{
        vote::{self, VoteState},
        vote_cast, vote_choice,
    },
    repositories::{CastRepository, CommitteeMemberRepository, VoteRepository},
};
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use validator::Validate;

use super::tally::{self, TallyView};

const DEFAULT_LIST_LIMIT: u64 = 20;

// ==================== Inputs ====================

/// Input for creating a vote.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVoteInput {
    #[validate(length(min = 1, max = 64))]
    pub committee_id: String,
    #[validate(length(min = 1, max = 64))]
    pub meeting_id: Option<String>,
    pub question: String,
    pub choices: Vec<String>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
}

/// Input for updating a vote.
///
/// Every field is resent on each update; absent optional fields clear the
/// stored value.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVoteInput {
    pub vote_id: String,
    #[validate(length(min = 1, max = 64))]
    pub meeting_id: Option<String>,
    pub question: String,
    pub choices: Vec<String>,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
}

/// Input for listing votes of a committee or a meeting.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListVotesInput {
    pub committee_id: Option<String>,
    pub meeting_id: Option<String>,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    DEFAULT_LIST_LIMIT
}

/// Input for casting or changing a selection.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CastInput {
    pub vote_id: String,
    pub choice_id: String,
}

// ==================== Views ====================

/// A choice as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceView {
    pub id: String,
    pub position: i32,
    pub text: String,
    pub vote_count: Option<i32>,
    pub percentage: Option<i32>,
    pub is_winner: Option<bool>,
}

impl From<vote_choice::Model> for ChoiceView {
    fn from(c: vote_choice::Model) -> Self {
        Self {
            id: c.id,
            position: c.position,
            text: c.text,
            vote_count: c.vote_count,
            percentage: c.percentage,
            is_winner: c.is_winner,
        }
    }
}

/// A vote with its ordered choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    pub id: String,
    pub committee_id: String,
    pub meeting_id: Option<String>,
    pub question: String,
    pub start_date: Option<DateTime<FixedOffset>>,
    pub end_date: Option<DateTime<FixedOffset>>,
    pub state: VoteState,
    pub is_started: bool,
    pub is_ended: bool,
    pub winner_choice_id: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: Option<DateTime<FixedOffset>>,
    pub started_at: Option<DateTime<FixedOffset>>,
    pub ended_at: Option<DateTime<FixedOffset>>,
    pub choices: Vec<ChoiceView>,
}

impl VoteView {
    #[must_use]
    pub fn from_parts(vote: vote::Model, choices: Vec<vote_choice::Model>) -> Self {
        Self {
            state: vote.state(),
            id: vote.id,
            committee_id: vote.committee_id,
            meeting_id: vote.meeting_id,
            question: vote.question,
            start_date: vote.start_date,
            end_date: vote.end_date,
            is_started: vote.is_started,
            is_ended: vote.is_ended,
            winner_choice_id: vote.winner_choice_id,
            created_at: vote.created_at,
            updated_at: vote.updated_at,
            started_at: vote.started_at,
            ended_at: vote.ended_at,
            choices: choices.into_iter().map(ChoiceView::from).collect(),
        }
    }
}

/// A member's current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CastView {
    pub id: String,
    pub vote_id: String,
    pub member_id: String,
    pub choice_id: String,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<vote_cast::Model> for CastView {
    fn from(c: vote_cast::Model) -> Self {
        Self {
            id: c.id,
            vote_id: c.vote_id,
            member_id: c.member_id,
            choice_id: c.choice_id,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

// ==================== Service ====================

/// Service owning vote lifecycles, casts and tallies.
#[derive(Clone)]
pub struct VoteService {
    vote_repo: VoteRepository,
    cast_repo: CastRepository,
    member_repo: CommitteeMemberRepository,
    limits: VotingConfig,
    id_gen: IdGenerator,
}

impl VoteService {
    /// Create a new vote service.
    #[must_use]
    pub const fn new(
        vote_repo: VoteRepository,
        cast_repo: CastRepository,
        member_repo: CommitteeMemberRepository,
        limits: VotingConfig,
    ) -> Self {
        Self {
            vote_repo,
            cast_repo,
            member_repo,
            limits,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Record Store ====================

    /// Create a vote with its choices. The vote starts out not started.
    pub async fn create(&self, input: CreateVoteInput) -> AppResult<VoteView> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let question = self.normalize_question(&input.question)?;
        let texts = self.normalize_choices(&input.choices)?;

        let vote_id = self.id_gen.generate();
        let model = vote::ActiveModel {
            id: Set(vote_id.clone()),
            committee_id: Set(input.committee_id),
            meeting_id: Set(input.meeting_id),
            question: Set(question),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            is_started: Set(false),
            is_ended: Set(false),
            winner_choice_id: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
            updated_at: Set(None),
            started_at: Set(None),
            ended_at: Set(None),
        };
        let choices = self.choice_models(&vote_id, texts);

        let (vote, choices) = self.vote_repo.create_with_choices(model, choices).await?;

        info!(
            vote_id = %vote.id,
            committee_id = %vote.committee_id,
            choices = choices.len(),
            "Vote created"
        );

        Ok(VoteView::from_parts(vote, choices))
    }

    /// Replace the editable fields of a vote.
    ///
    /// Question and choices can change only before the vote starts. While it
    /// is in progress they must be resent unchanged and only the scheduling
    /// metadata is written. An ended vote cannot be updated.
    pub async fn update(&self, input: UpdateVoteInput) -> AppResult<VoteView> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let question = self.normalize_question(&input.question)?;
        let texts = self.normalize_choices(&input.choices)?;

        let txn = self.vote_repo.begin().await?;
        let vote = self
            .vote_repo
            .find_for_update(&txn, &input.vote_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vote not found: {}", input.vote_id)))?;
        let stored_choices = self.vote_repo.find_choices_in(&txn, &vote.id).await?;
        let choices_changed = stored_choices
            .iter()
            .map(|c| c.text.as_str())
            .ne(texts.iter().map(String::as_str));

        let state = vote.state();
        match state {
            VoteState::Ended => {
                return Err(AppError::IllegalState(format!(
                    "Vote {} has ended and can no longer be edited",
                    vote.id
                )));
            }
            VoteState::InProgress if question != vote.question || choices_changed => {
                return Err(AppError::IllegalState(format!(
                    "Vote {} is in progress; its question and choices are fixed",
                    vote.id
                )));
            }
            VoteState::InProgress | VoteState::NotStarted => {}
        }

        let vote_id = vote.id.clone();
        let mut active: vote::ActiveModel = vote.into();
        active.meeting_id = Set(input.meeting_id);
        active.start_date = Set(input.start_date);
        active.end_date = Set(input.end_date);
        active.updated_at = Set(Some(Utc::now().fixed_offset()));
        if state == VoteState::NotStarted {
            active.question = Set(question);
        }

        let vote = self.vote_repo.update_in(&txn, active).await?;
        let replace_choices = state == VoteState::NotStarted && choices_changed;
        let choices = if replace_choices {
            let models = self.choice_models(&vote_id, texts);
            self.vote_repo
                .replace_choices_in(&txn, &vote_id, models)
                .await?
        } else {
            stored_choices
        };

        txn.commit().await.map_err(AppError::from)?;

        info!(vote_id = %vote_id, choices_replaced = replace_choices, "Vote updated");

        Ok(VoteView::from_parts(vote, choices))
    }

    /// Delete a vote with its choices and casts. Allowed in every state.
    pub async fn delete(&self, vote_id: &str) -> AppResult<()> {
        if !self.vote_repo.delete(vote_id).await? {
            return Err(AppError::NotFound(format!("Vote not found: {vote_id}")));
        }

        info!(vote_id = %vote_id, "Vote deleted");
        Ok(())
    }

    /// Get a vote with its choices.
    pub async fn get(&self, vote_id: &str) -> AppResult<VoteView> {
        let vote = self.vote_repo.get_by_id(vote_id).await?;
        let choices = self.vote_repo.find_choices(vote_id).await?;
        Ok(VoteView::from_parts(vote, choices))
    }

    /// List the votes of a committee (newest first) or of a meeting (agenda order).
    pub async fn list(&self, input: ListVotesInput) -> AppResult<Vec<VoteView>> {
        input
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let votes = match (&input.committee_id, &input.meeting_id) {
            (Some(committee_id), None) => {
                self.vote_repo
                    .find_by_committee(committee_id, input.limit, input.offset)
                    .await?
            }
            (None, Some(meeting_id)) => {
                self.vote_repo
                    .find_by_meeting(meeting_id, input.limit, input.offset)
                    .await?
            }
            _ => {
                return Err(AppError::Validation(
                    "Exactly one of committeeId or meetingId is required".to_string(),
                ));
            }
        };

        let mut views = Vec::with_capacity(votes.len());
        for vote in votes {
            let choices = self.vote_repo.find_choices(&vote.id).await?;
            views.push(VoteView::from_parts(vote, choices));
        }
        Ok(views)
    }

    // ==================== Lifecycle ====================

    /// Open a vote for casting.
    pub async fn start(&self, vote_id: &str) -> AppResult<VoteView> {
        let vote = self.vote_repo.get_by_id(vote_id).await?;
        if vote.is_started {
            return Err(AppError::IllegalState(format!(
                "Vote {vote_id} has already been started"
            )));
        }

        if !self.vote_repo.mark_started(vote_id).await? {
            // Started (or deleted) between the read and the flip.
            self.vote_repo.get_by_id(vote_id).await?;
            return Err(AppError::IllegalState(format!(
                "Vote {vote_id} has already been started"
            )));
        }

        info!(vote_id = %vote_id, "Vote started");
        self.get(vote_id).await
    }

    /// Close a vote and freeze its result.
    ///
    /// The flip of `is_ended`, the count aggregation and the snapshot writes
    /// share one transaction, so a failure leaves the vote untouched.
    pub async fn end(&self, vote_id: &str) -> AppResult<TallyView> {
        let vote = self.vote_repo.get_by_id(vote_id).await?;
        match vote.state() {
            VoteState::NotStarted => {
                return Err(AppError::IllegalState(format!(
                    "Vote {vote_id} has not been started"
                )));
            }
            VoteState::Ended => {
                return Err(AppError::IllegalState(format!(
                    "Vote {vote_id} has already ended"
                )));
            }
            VoteState::InProgress => {}
        }

        let txn = self.vote_repo.begin().await?;
        if !self.vote_repo.mark_ended(&txn, vote_id).await? {
            return Err(AppError::Conflict(format!(
                "Vote {vote_id} changed state while ending"
            )));
        }

        let choices = self.vote_repo.find_choices_in(&txn, vote_id).await?;
        let counts = self.cast_repo.count_by_choice_in(&txn, vote_id).await?;
        let result = tally::compute(vote_id, &choices, &counts, true);

        self.vote_repo
            .write_snapshot(
                &txn,
                vote_id,
                result.winner_choice_id.clone(),
                &result.snapshots(),
            )
            .await?;

        txn.commit().await.map_err(AppError::from)?;

        info!(
            vote_id = %vote_id,
            total_casts = result.total_casts,
            winner = ?result.winner_choice_id,
            "Vote ended"
        );

        Ok(result)
    }

    // ==================== Casts ====================

    /// Record a member's selection, replacing any earlier one.
    ///
    /// A uniqueness conflict or lock contention is retried once before it
    /// is returned.
    pub async fn cast_or_update(
        &self,
        member_id: &str,
        vote_id: &str,
        choice_id: &str,
    ) -> AppResult<CastView> {
        match self.try_cast(member_id, vote_id, choice_id).await {
            Err(e) if e.is_retryable() => {
                warn!(vote_id = %vote_id, member_id = %member_id, error = %e, "Retrying cast after conflict");
                self.try_cast(member_id, vote_id, choice_id).await
            }
            result => result,
        }
    }

    async fn try_cast(
        &self,
        member_id: &str,
        vote_id: &str,
        choice_id: &str,
    ) -> AppResult<CastView> {
        let vote = self.vote_repo.get_by_id(vote_id).await?;

        let choice = self
            .vote_repo
            .find_choice_by_id(choice_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Choice not found: {choice_id}")))?;
        if choice.vote_id != vote.id {
            return Err(AppError::Validation(format!(
                "Choice {choice_id} does not belong to vote {vote_id}"
            )));
        }

        if !self
            .member_repo
            .is_member(&vote.committee_id, member_id)
            .await?
        {
            return Err(AppError::Forbidden(format!(
                "{member_id} is not a member of committee {}",
                vote.committee_id
            )));
        }

        let txn = self.vote_repo.begin().await?;
        let locked = self
            .vote_repo
            .find_for_share(&txn, vote_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Vote not found: {vote_id}")))?;

        match locked.state() {
            VoteState::InProgress => {}
            VoteState::NotStarted => {
                return Err(AppError::IllegalState(format!(
                    "Vote {vote_id} has not been started"
                )));
            }
            VoteState::Ended => {
                return Err(AppError::IllegalState(format!("Vote {vote_id} has ended")));
            }
        }

        let cast = self
            .cast_repo
            .upsert(&txn, self.id_gen.generate(), vote_id, member_id, choice_id)
            .await?;

        txn.commit().await.map_err(AppError::from)?;

        debug!(vote_id = %vote_id, member_id = %member_id, choice_id = %choice_id, "Cast recorded");

        Ok(cast.into())
    }

    /// List the casts of a vote in the order they were first made.
    pub async fn list_casts(&self, vote_id: &str) -> AppResult<Vec<CastView>> {
        self.vote_repo.get_by_id(vote_id).await?;
        let casts = self.cast_repo.find_by_vote(vote_id).await?;
        Ok(casts.into_iter().map(CastView::from).collect())
    }

    /// Get a member's current selection on a vote, if any.
    pub async fn get_member_cast(
        &self,
        vote_id: &str,
        member_id: &str,
    ) -> AppResult<Option<CastView>> {
        self.vote_repo.get_by_id(vote_id).await?;
        let cast = self
            .cast_repo
            .find_by_vote_and_member(vote_id, member_id)
            .await?;
        Ok(cast.map(CastView::from))
    }

    // ==================== Tally ====================

    /// Current result: computed from the casts while the vote is open,
    /// read back from the snapshot once it has ended.
    pub async fn get_tally(&self, vote_id: &str) -> AppResult<TallyView> {
        let vote = self.vote_repo.get_by_id(vote_id).await?;
        let choices = self.vote_repo.find_choices(vote_id).await?;

        if vote.is_ended {
            return tally::from_snapshot(&vote, &choices);
        }

        let counts = self.cast_repo.count_by_choice(vote_id).await?;
        debug!(vote_id = %vote_id, "Computed live tally");
        Ok(tally::compute(vote_id, &choices, &counts, false))
    }

    // ==================== Helpers ====================

    fn normalize_question(&self, question: &str) -> AppResult<String> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question cannot be empty".to_string()));
        }
        if question.chars().count() > self.limits.max_question_length {
            return Err(AppError::Validation(format!(
                "Question is too long (max {} chars)",
                self.limits.max_question_length
            )));
        }
        Ok(question.to_string())
    }

    fn normalize_choices(&self, choices: &[String]) -> AppResult<Vec<String>> {
        let texts: Vec<String> = choices
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        if texts.is_empty() {
            return Err(AppError::Validation(
                "A vote needs at least one non-empty choice".to_string(),
            ));
        }
        if texts.len() > self.limits.max_choices {
            return Err(AppError::Validation(format!(
                "A vote cannot have more than {} choices",
                self.limits.max_choices
            )));
        }
        for (i, text) in texts.iter().enumerate() {
            if text.chars().count() > self.limits.max_choice_length {
                return Err(AppError::Validation(format!(
                    "Choice is too long (max {} chars)",
                    self.limits.max_choice_length
                )));
            }
            if texts[..i].contains(text) {
                return Err(AppError::Validation(format!("Duplicate choice: {text}")));
            }
        }

        Ok(texts)
    }

    fn choice_models(&self, vote_id: &str, texts: Vec<String>) -> Vec<vote_choice::ActiveModel> {
        texts
            .into_iter()
            .enumerate()
            .map(|(position, text)| vote_choice::ActiveModel {
                id: Set(self.id_gen.generate()),
                vote_id: Set(vote_id.to_string()),
                position: Set(position as i32),
                text: Set(text),
                vote_count: Set(None),
                percentage: Set(None),
                is_winner: Set(None),
            })
            .collect()
    }
}
