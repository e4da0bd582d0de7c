use serde_json::json;

use kahoot_client::challenge::models::{PlayerProgressEntry, Question};
use kahoot_client::scoring::{
    replay_history, score_answer, standing, AnswerOverrides, ScoreState, Submission,
};

fn question(value: serde_json::Value) -> Question {
    serde_json::from_value(value).unwrap()
}

fn entry(value: serde_json::Value) -> PlayerProgressEntry {
    serde_json::from_value(json!({ "questionMetrics": value })).unwrap()
}

#[test]
fn test_mixed_quiz_accumulates_score_and_streak() {
    let quiz = question(json!({
        "type": "quiz",
        "time": 20000,
        "choices": [{"answer": "A", "correct": false}, {"answer": "B", "correct": true}]
    }));
    let jumble = question(json!({
        "type": "jumble",
        "time": 10000,
        "choices": [{"answer": "1"}, {"answer": "2"}, {"answer": "3"}]
    }));
    let poll = question(json!({
        "type": "quiz",
        "time": 20000,
        "points": false,
        "choices": [{"answer": "x", "correct": true}]
    }));
    let open = question(json!({
        "type": "open_ended",
        "time": 20000,
        "pointsMultiplier": 2,
        "choices": [{"answer": "Eiffel Tower", "correct": true}]
    }));

    let mut state = ScoreState::new();
    let none = AnswerOverrides::default();

    // Half the time used: 750 points, first in the streak
    let first = score_answer(&quiz, &Submission::Index(1), 10_000, &mut state, &none).unwrap();
    assert_eq!(first.points, 750.0);
    assert_eq!(first.streak_bonus, 0);

    let second = score_answer(&jumble, &Submission::Order(vec![0, 1, 2]), 0, &mut state, &none).unwrap();
    assert_eq!(second.points, 1000.0);
    assert_eq!(second.streak, 2);
    assert_eq!(second.streak_bonus, 100);

    // A question without points keeps the streak going but awards nothing
    let third = score_answer(&poll, &Submission::Index(0), 0, &mut state, &none).unwrap();
    assert_eq!(third.points, 0.0);
    assert_eq!(third.streak_bonus, 0);
    assert_eq!(third.streak, 3);

    let fourth = score_answer(
        &open,
        &Submission::Text("eiffel tower!".to_string()),
        0,
        &mut state,
        &none,
    )
    .unwrap();
    assert!(fourth.evaluation.correct);
    assert_eq!(fourth.points, 2000.0);
    assert_eq!(fourth.streak_bonus, 300);

    assert_eq!(state.score, 750.0 + 1100.0 + 0.0 + 2300.0);
    assert_eq!(fourth.total_score, state.score);
}

#[test]
fn test_wrong_jumble_order_breaks_the_streak() {
    let jumble = question(json!({
        "type": "jumble",
        "time": 10000,
        "choices": [{"answer": "1"}, {"answer": "2"}]
    }));
    let mut state = ScoreState {
        streak: Some(4),
        ..ScoreState::default()
    };
    let scored = score_answer(
        &jumble,
        &Submission::Order(vec![1, 0]),
        0,
        &mut state,
        &AnswerOverrides::default(),
    )
    .unwrap();
    assert!(!scored.evaluation.correct);
    assert_eq!(scored.previous_streak, 4);
    assert_eq!(scored.streak, 0);
    assert_eq!(state.score, 0.0);
}

#[test]
fn test_mismatched_submission_is_an_error() {
    let quiz = question(json!({
        "type": "quiz",
        "time": 20000,
        "choices": [{"answer": "A", "correct": true}]
    }));
    let mut state = ScoreState::new();
    let mismatched = score_answer(
        &quiz,
        &Submission::Text("A".to_string()),
        0,
        &mut state,
        &AnswerOverrides::default(),
    );
    assert!(mismatched.is_err());
    assert_eq!(state, ScoreState::new());
}

#[test]
fn test_history_resume_and_standing() {
    let history = vec![
        entry(json!({"me": 900.0, "ana": 950.0, "bo": 400.0})),
        entry(json!({"me": 900.0, "ana": 1800.0, "bo": 1300.0})),
        entry(json!({"ana": 2700.0, "bo": 2100.0})),
    ];

    // The walk stops at the first entry without the player
    let replay = replay_history(&history, &[], "me");
    assert_eq!(replay.answered, 2);
    assert_eq!(replay.score, 900.0);
    assert_eq!(replay.streak, 0);

    let mut state = ScoreState::new();
    state.restore(&replay);
    assert_eq!(state.question_index, 2);
    assert_eq!(state.streak, None);

    let at_second = standing(history.get(1), "me", 900.0);
    assert_eq!(at_second.rank, 3);
    let nemesis = at_second.nemesis.unwrap();
    assert_eq!(nemesis.name, "ana");
    assert_eq!(nemesis.total_score, 1800.0);

    let leading = standing(history.first(), "me", 1000.0);
    assert_eq!(leading.rank, 1);
    assert!(leading.nemesis.is_none());
}
