//! Tally engine.
//!
//! Turns per-choice cast counts into counts, percentages and a winner. The
//! computation is pure; [`super::vote::VoteService`] feeds it from the cast
//! ledger (live) or from the snapshot stored on the choices (frozen).

use std::collections::HashMap;

use agora_common::{AppError, AppResult};
use agora_db::{
    entities::{vote, vote_choice},
    repositories::{ChoiceCount, ChoiceSnapshot},
};
use serde::Serialize;

/// Tally line for one choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceTally {
    pub id: String,
    pub text: String,
    pub count: i64,
    pub percentage: i32,
    pub is_winner: bool,
}

/// Result of a vote, live or frozen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyView {
    pub vote_id: String,
    pub choices: Vec<ChoiceTally>,
    pub total_casts: i64,
    pub is_ended: bool,
    pub winner_choice_id: Option<String>,
}

impl TallyView {
    /// Snapshot rows to persist for this tally.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ChoiceSnapshot> {
        self.choices
            .iter()
            .map(|c| ChoiceSnapshot {
                choice_id: c.id.clone(),
                vote_count: c.count as i32,
                percentage: c.percentage,
                is_winner: c.is_winner,
            })
            .collect()
    }
}

/// Share of `count` in `total`, in whole percent, rounded half up.
///
/// Returns 0 when there are no casts.
#[must_use]
pub const fn percentage(count: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((count * 200 + total) / (2 * total)) as i32
}

/// The single choice holding the highest count.
///
/// A tie at the top, or no casts at all, yields no winner.
#[must_use]
pub fn winner(choices: &[ChoiceTally]) -> Option<&ChoiceTally> {
    let max = choices.iter().map(|c| c.count).max()?;
    if max == 0 {
        return None;
    }

    let mut leaders = choices.iter().filter(|c| c.count == max);
    let first = leaders.next()?;
    match leaders.next() {
        Some(_) => None,
        None => Some(first),
    }
}

/// Compute a tally from aggregated cast counts.
///
/// Choices absent from `counts` have zero casts. When `freeze` is set the
/// winner is determined and flagged; a live tally never has one.
#[must_use]
pub fn compute(
    vote_id: &str,
    choices: &[vote_choice::Model],
    counts: &[ChoiceCount],
    freeze: bool,
) -> TallyView {
    let by_choice: HashMap<&str, i64> = counts
        .iter()
        .map(|c| (c.choice_id.as_str(), c.count))
        .collect();
    let total: i64 = counts.iter().map(|c| c.count).sum();

    let mut lines: Vec<ChoiceTally> = choices
        .iter()
        .map(|choice| {
            let count = by_choice.get(choice.id.as_str()).copied().unwrap_or(0);
            ChoiceTally {
                id: choice.id.clone(),
                text: choice.text.clone(),
                count,
                percentage: percentage(count, total),
                is_winner: false,
            }
        })
        .collect();

    let winner_choice_id = if freeze {
        winner(&lines).map(|w| w.id.clone())
    } else {
        None
    };

    if let Some(ref winner_id) = winner_choice_id {
        for line in &mut lines {
            line.is_winner = line.id == *winner_id;
        }
    }

    TallyView {
        vote_id: vote_id.to_string(),
        choices: lines,
        total_casts: total,
        is_ended: freeze,
        winner_choice_id,
    }
}

/// Rebuild the frozen tally from the snapshot stored on an ended vote.
pub fn from_snapshot(vote: &vote::Model, choices: &[vote_choice::Model]) -> AppResult<TallyView> {
    let mut lines = Vec::with_capacity(choices.len());
    for choice in choices {
        let (Some(count), Some(pct), Some(is_winner)) =
            (choice.vote_count, choice.percentage, choice.is_winner)
        else {
            return Err(AppError::Internal(format!(
                "Vote {} is ended but choice {} has no snapshot",
                vote.id, choice.id
            )));
        };

        lines.push(ChoiceTally {
            id: choice.id.clone(),
            text: choice.text.clone(),
            count: i64::from(count),
            percentage: pct,
            is_winner,
        });
    }

    Ok(TallyView {
        vote_id: vote.id.clone(),
        total_casts: lines.iter().map(|c| c.count).sum(),
        choices: lines,
        is_ended: true,
        winner_choice_id: vote.winner_choice_id.clone(),
    })
}
