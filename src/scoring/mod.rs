//! Scoring engine
//!
//! Reproduces the service's judgement of a challenge answer: correctness per
//! question kind, time-decayed points, the streak bonus and the standings.

pub mod evaluate;
pub mod points;
pub mod rank;

pub use evaluate::{evaluate, AnswerOverrides, Evaluation, Submission};
pub use points::{js_round, raw_score, streak_bonus};
pub use rank::{replay_history, standing, Replay, Standing};

use log::debug;

use crate::challenge::models::{PlayerProgressEntry, Question, QuestionKind};
use crate::error::Result;

/// Running score of one player
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreState {
    pub score: f64,
    /// Unknown until derived from history on the first submission
    pub streak: Option<u32>,
    pub question_index: usize,
}

/// Everything the service needs to know about one scored answer
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAnswer {
    pub evaluation: Evaluation,
    pub reaction_ms: u64,
    /// Points for the answer alone, before streak bonus
    pub points: f64,
    pub streak_bonus: u32,
    pub previous_streak: u32,
    pub streak: u32,
    pub total_score: f64,
}

impl ScoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a participation found in history. The streak is left for
    /// `ensure_streak` to derive.
    pub fn restore(&mut self, replay: &Replay) {
        self.question_index = replay.answered;
        self.score = replay.score;
    }

    pub fn streak(&self) -> u32 {
        self.streak.unwrap_or(0)
    }

    /// Derive streak and score from history the first time they are needed
    pub fn ensure_streak(&mut self, entries: &[PlayerProgressEntry], questions: &[Question], player: &str) {
        if self.streak.is_some() {
            return;
        }
        let replay = replay_history(entries, questions, player);
        if replay.answered > 0 {
            debug!(
                "Rebuilt streak {} and score {} from {} answered questions",
                replay.streak, replay.score, replay.answered
            );
            self.score = replay.score;
        }
        self.streak = Some(replay.streak);
    }

    /// Unanswered question: the streak is broken
    pub fn record_miss(&mut self) {
        self.streak = Some(0);
    }

    pub fn advance(&mut self) {
        self.question_index += 1;
    }
}

/// Judge and score one submission, updating the running state
pub fn score_answer(
    question: &Question,
    submission: &Submission,
    reaction_ms: u64,
    state: &mut ScoreState,
    overrides: &AnswerOverrides,
) -> Result<ScoredAnswer> {
    let evaluation = evaluate(question, submission, overrides)?;

    let raw = overrides.points.unwrap_or_else(|| {
        raw_score(
            reaction_ms,
            question.time,
            question.points_multiplier,
            question.points_enabled(),
        )
    });
    let points = if !evaluation.correct {
        0.0
    } else if question.kind == QuestionKind::MultipleSelectQuiz {
        raw * evaluation.percent_correct
    } else {
        raw
    };

    let previous_streak = state.streak();
    let streak = if evaluation.correct { previous_streak + 1 } else { 0 };
    let bonus = if question.points_enabled() {
        streak_bonus(streak)
    } else {
        0
    };

    state.streak = Some(streak);
    state.score += points + bonus as f64;

    Ok(ScoredAnswer {
        evaluation,
        reaction_ms,
        points,
        streak_bonus: bonus,
        previous_streak,
        streak,
        total_score: state.score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::models::Choice;
    use std::collections::BTreeMap;

    fn quiz() -> Question {
        Question {
            kind: QuestionKind::Quiz,
            question: None,
            time: 20_000,
            points: None,
            points_multiplier: 1.0,
            choices: vec![
                Choice {
                    answer: "yes".to_string(),
                    correct: true,
                },
                Choice {
                    answer: "no".to_string(),
                    correct: false,
                },
            ],
            layout: None,
            question_format: None,
            video: None,
        }
    }

    #[test]
    fn test_streak_grows_and_resets() {
        let q = quiz();
        let mut state = ScoreState::new();
        let none = AnswerOverrides::default();

        let first = score_answer(&q, &Submission::Index(0), 0, &mut state, &none).unwrap();
        assert_eq!(first.points, 1000.0);
        assert_eq!(first.streak, 1);
        assert_eq!(first.streak_bonus, 0);

        let second = score_answer(&q, &Submission::Index(0), 0, &mut state, &none).unwrap();
        assert_eq!(second.streak_bonus, 100);
        assert_eq!(state.score, 2100.0);

        let miss = score_answer(&q, &Submission::Index(1), 0, &mut state, &none).unwrap();
        assert_eq!(miss.points, 0.0);
        assert_eq!(miss.streak, 0);
        assert_eq!(miss.previous_streak, 2);
        assert_eq!(state.score, 2100.0);
    }

    #[test]
    fn test_multiple_select_half_credit() {
        let q = Question {
            kind: QuestionKind::MultipleSelectQuiz,
            choices: vec![
                Choice {
                    answer: "a".to_string(),
                    correct: true,
                },
                Choice {
                    answer: "b".to_string(),
                    correct: true,
                },
            ],
            ..quiz()
        };
        let mut state = ScoreState::new();
        let scored = score_answer(&q, &Submission::Selection(vec![0]), 0, &mut state, &AnswerOverrides::default()).unwrap();
        assert!(scored.evaluation.correct);
        assert_eq!(scored.points, 500.0);
    }

    #[test]
    fn test_points_override() {
        let mut state = ScoreState::new();
        let overrides = AnswerOverrides {
            force_correct: false,
            points: Some(42.0),
        };
        let scored = score_answer(&quiz(), &Submission::Index(0), 19_000, &mut state, &overrides).unwrap();
        assert_eq!(scored.points, 42.0);
    }

    #[test]
    fn test_ensure_streak_from_history() {
        let entries: Vec<PlayerProgressEntry> = [300.0, 900.0]
            .iter()
            .map(|s| PlayerProgressEntry {
                question_metrics: BTreeMap::from([("me".to_string(), *s)]),
            })
            .collect();
        let mut state = ScoreState::new();
        state.ensure_streak(&entries, &[], "me");
        assert_eq!(state.streak, Some(2));
        assert_eq!(state.score, 900.0);

        // Only derived once
        state.ensure_streak(&[], &[], "me");
        assert_eq!(state.streak, Some(2));
    }
}
