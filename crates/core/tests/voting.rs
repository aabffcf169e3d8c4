//! Voting engine tests against a migrated in-memory database.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use agora_common::{AppError, config::VotingConfig};
use agora_core::services::{
    CommitteeService, CreateVoteInput, ListVotesInput, MemberInput, UpdateVoteInput, VoteService,
    VoteView,
};
use agora_db::{
    entities::vote::VoteState,
    repositories::{CastRepository, CommitteeMemberRepository, VoteRepository},
    test_utils::TestDatabase,
};

const COMMITTEE: &str = "cmt1";

struct Engine {
    votes: VoteService,
    committees: CommitteeService,
}

async fn setup(members: &[&str]) -> Engine {
    let db = TestDatabase::in_memory().await.unwrap().pool();
    let member_repo = CommitteeMemberRepository::new(Arc::clone(&db));

    let engine = Engine {
        votes: VoteService::new(
            VoteRepository::new(Arc::clone(&db)),
            CastRepository::new(Arc::clone(&db)),
            member_repo.clone(),
            VotingConfig::default(),
        ),
        committees: CommitteeService::new(member_repo),
    };

    for member in members {
        engine
            .committees
            .add_member(MemberInput {
                committee_id: COMMITTEE.to_string(),
                member_id: (*member).to_string(),
            })
            .await
            .unwrap();
    }

    engine
}

fn create_input(question: &str, choices: &[&str]) -> CreateVoteInput {
    CreateVoteInput {
        committee_id: COMMITTEE.to_string(),
        meeting_id: None,
        question: question.to_string(),
        choices: choices.iter().map(|c| (*c).to_string()).collect(),
        start_date: None,
        end_date: None,
    }
}

async fn started_vote(engine: &Engine, choices: &[&str]) -> VoteView {
    let vote = engine
        .votes
        .create(create_input("Adopt the budget?", choices))
        .await
        .unwrap();
    engine.votes.start(&vote.id).await.unwrap()
}

fn choice_id(vote: &VoteView, text: &str) -> String {
    vote.choices
        .iter()
        .find(|c| c.text == text)
        .map(|c| c.id.clone())
        .unwrap()
}

// ==================== Scenarios ====================

#[tokio::test]
async fn test_majority_wins() {
    let engine = setup(&["alice", "bob", "carol"]).await;
    let vote = started_vote(&engine, &["Yes", "No"]).await;
    let yes = choice_id(&vote, "Yes");
    let no = choice_id(&vote, "No");

    engine.votes.cast_or_update("alice", &vote.id, &yes).await.unwrap();
    engine.votes.cast_or_update("bob", &vote.id, &yes).await.unwrap();
    engine.votes.cast_or_update("carol", &vote.id, &no).await.unwrap();

    let live = engine.votes.get_tally(&vote.id).await.unwrap();
    assert!(!live.is_ended);
    assert_eq!(live.total_casts, 3);
    assert_eq!((live.choices[0].count, live.choices[0].percentage), (2, 67));
    assert_eq!((live.choices[1].count, live.choices[1].percentage), (1, 33));
    assert!(live.choices.iter().all(|c| !c.is_winner));

    let frozen = engine.votes.end(&vote.id).await.unwrap();
    assert!(frozen.is_ended);
    assert!(frozen.choices[0].is_winner);
    assert!(!frozen.choices[1].is_winner);
    assert_eq!(frozen.winner_choice_id, Some(yes.clone()));

    let stored = engine.votes.get(&vote.id).await.unwrap();
    assert_eq!(stored.state, VoteState::Ended);
    assert_eq!(stored.winner_choice_id, Some(yes));
    assert_eq!(stored.choices[0].vote_count, Some(2));
    assert_eq!(stored.choices[0].percentage, Some(67));
    assert_eq!(stored.choices[1].is_winner, Some(false));
}

#[tokio::test]
async fn test_tie_has_no_winner() {
    let engine = setup(&["alice", "bob"]).await;
    let vote = started_vote(&engine, &["A", "B"]).await;

    engine
        .votes
        .cast_or_update("alice", &vote.id, &choice_id(&vote, "A"))
        .await
        .unwrap();
    engine
        .votes
        .cast_or_update("bob", &vote.id, &choice_id(&vote, "B"))
        .await
        .unwrap();

    let frozen = engine.votes.end(&vote.id).await.unwrap();
    assert!(frozen.winner_choice_id.is_none());
    assert!(frozen.choices.iter().all(|c| !c.is_winner && c.percentage == 50));

    let stored = engine.votes.get(&vote.id).await.unwrap();
    assert!(stored.winner_choice_id.is_none());
    assert!(stored.choices.iter().all(|c| c.is_winner == Some(false)));
}

#[tokio::test]
async fn test_recast_replaces_selection() {
    let engine = setup(&["alice"]).await;
    let vote = started_vote(&engine, &["A", "B"]).await;
    let a = choice_id(&vote, "A");
    let b = choice_id(&vote, "B");

    let first = engine.votes.cast_or_update("alice", &vote.id, &a).await.unwrap();
    let second = engine.votes.cast_or_update("alice", &vote.id, &b).await.unwrap();
    assert_eq!(first.id, second.id);

    let casts = engine.votes.list_casts(&vote.id).await.unwrap();
    assert_eq!(casts.len(), 1);
    assert_eq!(casts[0].choice_id, b);

    let tally = engine.votes.get_tally(&vote.id).await.unwrap();
    assert_eq!(tally.total_casts, 1);
    assert_eq!(tally.choices[0].count, 0);
    assert_eq!(tally.choices[1].count, 1);
}

#[tokio::test]
async fn test_cast_after_end_is_rejected() {
    let engine = setup(&["alice", "bob"]).await;
    let vote = started_vote(&engine, &["Yes", "No"]).await;
    let yes = choice_id(&vote, "Yes");
    let no = choice_id(&vote, "No");

    engine.votes.cast_or_update("alice", &vote.id, &yes).await.unwrap();
    let ended = engine.votes.end(&vote.id).await.unwrap();

    let late = engine.votes.cast_or_update("bob", &vote.id, &no).await;
    assert!(matches!(late, Err(AppError::IllegalState(_))));

    let change = engine.votes.cast_or_update("alice", &vote.id, &no).await;
    assert!(matches!(change, Err(AppError::IllegalState(_))));

    assert_eq!(engine.votes.list_casts(&vote.id).await.unwrap().len(), 1);
    let mine = engine.votes.get_member_cast(&vote.id, "alice").await.unwrap();
    assert_eq!(mine.unwrap().choice_id, yes);
    assert!(engine.votes.get_member_cast(&vote.id, "bob").await.unwrap().is_none());
    assert_eq!(engine.votes.get_tally(&vote.id).await.unwrap(), ended);
}

// ==================== Idempotence ====================

#[tokio::test]
async fn test_repeated_cast_is_idempotent() {
    let engine = setup(&["alice"]).await;
    let vote = started_vote(&engine, &["A", "B"]).await;
    let a = choice_id(&vote, "A");

    let first = engine.votes.cast_or_update("alice", &vote.id, &a).await.unwrap();
    let before = engine.votes.get_tally(&vote.id).await.unwrap();
    let again = engine.votes.cast_or_update("alice", &vote.id, &a).await.unwrap();
    let after = engine.votes.get_tally(&vote.id).await.unwrap();

    assert_eq!(first.id, again.id);
    assert_eq!(first.choice_id, again.choice_id);
    assert_eq!(before, after);
}

// ==================== Lifecycle ====================

#[tokio::test]
async fn test_lifecycle_errors() {
    let engine = setup(&["alice"]).await;
    let vote = engine
        .votes
        .create(create_input("Adopt?", &["Yes"]))
        .await
        .unwrap();
    assert_eq!(vote.state, VoteState::NotStarted);

    assert!(matches!(
        engine.votes.end(&vote.id).await,
        Err(AppError::IllegalState(_))
    ));
    assert!(matches!(
        engine
            .votes
            .cast_or_update("alice", &vote.id, &vote.choices[0].id)
            .await,
        Err(AppError::IllegalState(_))
    ));

    let started = engine.votes.start(&vote.id).await.unwrap();
    assert_eq!(started.state, VoteState::InProgress);
    assert!(started.started_at.is_some());
    assert!(matches!(
        engine.votes.start(&vote.id).await,
        Err(AppError::IllegalState(_))
    ));

    engine.votes.end(&vote.id).await.unwrap();
    assert!(matches!(
        engine.votes.end(&vote.id).await,
        Err(AppError::IllegalState(_))
    ));
    assert!(matches!(
        engine.votes.start(&vote.id).await,
        Err(AppError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_unknown_vote_is_not_found() {
    let engine = setup(&[]).await;

    assert!(matches!(engine.votes.start("nope").await, Err(AppError::NotFound(_))));
    assert!(matches!(engine.votes.end("nope").await, Err(AppError::NotFound(_))));
    assert!(matches!(engine.votes.get_tally("nope").await, Err(AppError::NotFound(_))));
    assert!(matches!(engine.votes.delete("nope").await, Err(AppError::NotFound(_))));
    assert!(matches!(
        engine.votes.cast_or_update("alice", "nope", "c").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_frozen_result_is_byte_identical() {
    let engine = setup(&["alice", "bob", "carol"]).await;
    let vote = started_vote(&engine, &["A", "B", "C"]).await;

    engine
        .votes
        .cast_or_update("alice", &vote.id, &choice_id(&vote, "A"))
        .await
        .unwrap();
    engine
        .votes
        .cast_or_update("bob", &vote.id, &choice_id(&vote, "B"))
        .await
        .unwrap();
    engine
        .votes
        .cast_or_update("carol", &vote.id, &choice_id(&vote, "B"))
        .await
        .unwrap();

    let at_end = serde_json::to_vec(&engine.votes.end(&vote.id).await.unwrap()).unwrap();
    let first = serde_json::to_vec(&engine.votes.get_tally(&vote.id).await.unwrap()).unwrap();

    let rejected = engine
        .votes
        .cast_or_update("alice", &vote.id, &choice_id(&vote, "C"))
        .await;
    assert!(rejected.is_err());

    let second = serde_json::to_vec(&engine.votes.get_tally(&vote.id).await.unwrap()).unwrap();
    assert_eq!(at_end, first);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_ending_without_casts_has_no_winner() {
    let engine = setup(&[]).await;
    let vote = started_vote(&engine, &["Only"]).await;

    let frozen = engine.votes.end(&vote.id).await.unwrap();
    assert_eq!(frozen.total_casts, 0);
    assert_eq!(frozen.choices[0].count, 0);
    assert_eq!(frozen.choices[0].percentage, 0);
    assert!(frozen.winner_choice_id.is_none());
}

// ==================== Cast preconditions ====================

#[tokio::test]
async fn test_cast_preconditions() {
    let engine = setup(&["alice"]).await;
    let vote = started_vote(&engine, &["Yes", "No"]).await;
    let other = started_vote(&engine, &["Elsewhere"]).await;
    let yes = choice_id(&vote, "Yes");

    assert!(matches!(
        engine.votes.cast_or_update("alice", &vote.id, "missing").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        engine
            .votes
            .cast_or_update("alice", &vote.id, &other.choices[0].id)
            .await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        engine.votes.cast_or_update("mallory", &vote.id, &yes).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(engine.votes.list_casts(&vote.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_removed_member_keeps_cast_but_cannot_recast() {
    let engine = setup(&["alice"]).await;
    let vote = started_vote(&engine, &["Yes", "No"]).await;

    engine
        .votes
        .cast_or_update("alice", &vote.id, &choice_id(&vote, "Yes"))
        .await
        .unwrap();
    engine
        .committees
        .remove_member(MemberInput {
            committee_id: COMMITTEE.to_string(),
            member_id: "alice".to_string(),
        })
        .await
        .unwrap();

    assert!(matches!(
        engine
            .votes
            .cast_or_update("alice", &vote.id, &choice_id(&vote, "No"))
            .await,
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(engine.votes.get_tally(&vote.id).await.unwrap().total_casts, 1);
}

// ==================== Record store ====================

#[tokio::test]
async fn test_create_validates_input() {
    let engine = setup(&[]).await;

    assert!(matches!(
        engine.votes.create(create_input("   ", &["Yes"])).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        engine.votes.create(create_input("Adopt?", &["", "  "])).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        engine.votes.create(create_input("Adopt?", &["Yes", "Yes"])).await,
        Err(AppError::Validation(_))
    ));

    let vote = engine
        .votes
        .create(create_input(" Adopt? ", &["Yes", " ", "No"]))
        .await
        .unwrap();
    assert_eq!(vote.question, "Adopt?");
    let texts: Vec<_> = vote.choices.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, ["Yes", "No"]);
    assert!(vote.choices.iter().all(|c| c.vote_count.is_none() && c.is_winner.is_none()));
}

fn update_input(vote: &VoteView, question: &str, choices: &[&str]) -> UpdateVoteInput {
    UpdateVoteInput {
        vote_id: vote.id.clone(),
        meeting_id: vote.meeting_id.clone(),
        question: question.to_string(),
        choices: choices.iter().map(|c| (*c).to_string()).collect(),
        start_date: vote.start_date,
        end_date: vote.end_date,
    }
}

#[tokio::test]
async fn test_update_before_start_replaces_everything() {
    let engine = setup(&[]).await;
    let vote = engine
        .votes
        .create(create_input("Adopt?", &["Yes", "No"]))
        .await
        .unwrap();

    let updated = engine
        .votes
        .update(update_input(&vote, "Adopt the amended budget?", &["Yes", "No", "Abstain"]))
        .await
        .unwrap();

    assert_eq!(updated.question, "Adopt the amended budget?");
    assert_eq!(updated.choices.len(), 3);
    assert_eq!(updated.choices[2].text, "Abstain");
    assert_eq!(updated.choices[2].position, 2);
    assert!(updated.updated_at.is_some());

    // Unchanged choices keep their ids.
    let same = engine
        .votes
        .update(update_input(&updated, "Adopt the amended budget?", &["Yes", "No", "Abstain"]))
        .await
        .unwrap();
    assert_eq!(same.choices, updated.choices);
}

#[tokio::test]
async fn test_update_in_progress_only_touches_schedule() {
    let engine = setup(&[]).await;
    let vote = started_vote(&engine, &["Yes", "No"]).await;

    assert!(matches!(
        engine
            .votes
            .update(update_input(&vote, "Something else?", &["Yes", "No"]))
            .await,
        Err(AppError::IllegalState(_))
    ));
    assert!(matches!(
        engine
            .votes
            .update(update_input(&vote, &vote.question, &["No", "Yes"]))
            .await,
        Err(AppError::IllegalState(_))
    ));

    let mut input = update_input(&vote, &vote.question, &["Yes", "No"]);
    input.meeting_id = Some("mtg7".to_string());
    let updated = engine.votes.update(input).await.unwrap();

    assert_eq!(updated.meeting_id.as_deref(), Some("mtg7"));
    assert_eq!(updated.choices, vote.choices);
    assert_eq!(updated.state, VoteState::InProgress);
}

#[tokio::test]
async fn test_update_after_end_is_rejected() {
    let engine = setup(&[]).await;
    let vote = started_vote(&engine, &["Yes"]).await;
    engine.votes.end(&vote.id).await.unwrap();

    assert!(matches!(
        engine
            .votes
            .update(update_input(&vote, &vote.question, &["Yes"]))
            .await,
        Err(AppError::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_delete_cascades_in_every_state() {
    let engine = setup(&["alice"]).await;

    let fresh = engine.votes.create(create_input("Q1?", &["Yes"])).await.unwrap();
    engine.votes.delete(&fresh.id).await.unwrap();

    let vote = started_vote(&engine, &["Yes", "No"]).await;
    engine
        .votes
        .cast_or_update("alice", &vote.id, &choice_id(&vote, "Yes"))
        .await
        .unwrap();
    engine.votes.end(&vote.id).await.unwrap();
    engine.votes.delete(&vote.id).await.unwrap();

    assert!(matches!(engine.votes.get(&vote.id).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        engine.votes.list_casts(&vote.id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_list_by_committee_and_meeting() {
    let engine = setup(&[]).await;

    let mut in_meeting = create_input("Q1?", &["Yes"]);
    in_meeting.meeting_id = Some("mtg1".to_string());
    let first = engine.votes.create(in_meeting).await.unwrap();
    let second = engine.votes.create(create_input("Q2?", &["Yes"])).await.unwrap();

    let by_committee = engine
        .votes
        .list(ListVotesInput {
            committee_id: Some(COMMITTEE.to_string()),
            meeting_id: None,
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    let ids: Vec<_> = by_committee.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id.as_str()) && ids.contains(&second.id.as_str()));

    let by_meeting = engine
        .votes
        .list(ListVotesInput {
            committee_id: None,
            meeting_id: Some("mtg1".to_string()),
            limit: 10,
            offset: 0,
        })
        .await
        .unwrap();
    assert_eq!(by_meeting.len(), 1);
    assert_eq!(by_meeting[0].id, first.id);
}
