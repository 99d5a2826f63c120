use tracing::warn;

use crate::models::{Attempt, AttemptDetail, QuizActivity, TagScore};

pub const FULL_SCORE: f64 = 10.0;

/// (tag, score) observations for one graded attempt.
///
/// Text and file attempts contribute their grade once per activity tag. Quiz
/// attempts are re-scored per question (10.0 or 0.0) and contribute once per
/// question tag; quiz activity-level tags are not consulted.
pub fn tag_scores(attempt: &Attempt) -> Vec<TagScore> {
    match &attempt.detail {
        AttemptDetail::Text { activity, .. } | AttemptDetail::File { activity, .. } => {
            let Some(grade) = attempt.grade else {
                return Vec::new();
            };
            activity
                .tags
                .iter()
                .map(|tag| TagScore {
                    tag: tag.clone(),
                    score: grade,
                })
                .collect()
        }
        AttemptDetail::Quiz {
            activity,
            selected_answer_ids,
        } => quiz_tag_scores(attempt.id, activity, selected_answer_ids),
    }
}

fn quiz_tag_scores(
    attempt_id: i64,
    quiz: &QuizActivity,
    selected_answer_ids: &[i64],
) -> Vec<TagScore> {
    let mut scores = Vec::new();

    for question in &quiz.questions {
        let Some(correct) = question.correct_alternative() else {
            warn!(
                attempt_id,
                question_id = question.id,
                "question has no correct alternative, skipping"
            );
            continue;
        };

        let score = if selected_answer_ids.contains(&correct.id) {
            FULL_SCORE
        } else {
            0.0
        };

        scores.extend(question.tags.iter().map(|tag| TagScore {
            tag: tag.clone(),
            score,
        }));
    }

    scores
}

/// Observations for every attempt, concatenated.
pub fn extract_all(attempts: &[Attempt]) -> Vec<TagScore> {
    attempts.iter().flat_map(tag_scores).collect()
}
