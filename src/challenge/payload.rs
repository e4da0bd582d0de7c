//! Body of the challenge answer submission

use serde_json::{json, Value};

use crate::challenge::models::{ChallengeData, Question};
use crate::config::DeviceProfile;
use crate::scoring::ScoredAnswer;

/// Who answered what, and when
pub struct AnswerContext<'a> {
    pub data: &'a ChallengeData,
    pub question: &'a Question,
    pub question_index: usize,
    pub scored: &'a ScoredAnswer,
    pub player: &'a str,
    pub player_cid: &'a str,
    pub session_id: &'a str,
    pub device: &'a DeviceProfile,
    /// Epoch milliseconds at which the question was shown
    pub received_time: i64,
}

pub fn answer_payload(ctx: &AnswerContext<'_>) -> Value {
    let question = ctx.question;
    let scored = ctx.scored;
    let progress = &ctx.data.progress;

    json!({
        "device": {
            "screen": {"width": ctx.device.screen_width, "height": ctx.device.screen_height},
            "userAgent": ctx.device.user_agent,
        },
        "gameMode": progress.game_mode,
        "gameOptions": progress.game_options,
        "hostOrganizationId": null,
        "kickedPlayers": [],
        "numQuestions": ctx.data.question_count(),
        "organizationId": "",
        "question": {
            "answers": [{
                "bonusPoints": {"answerStreakBonus": scored.streak_bonus},
                "choiceIndex": scored.evaluation.choice_index,
                "isCorrect": scored.evaluation.correct,
                "playerCid": ctx.player_cid,
                "playerId": ctx.player,
                "points": scored.points,
                "reactionTime": scored.reaction_ms,
                "receivedTime": ctx.received_time,
                "text": scored.evaluation.text,
            }],
            "choices": question.choices,
            "duration": question.time,
            "format": question.question_format,
            "index": ctx.question_index,
            "lag": 0,
            "layout": question.layout,
            "playerCount": 1,
            "pointsQuestion": question.points_enabled(),
            "skipped": false,
            "startTime": 0,
            "title": question.question,
            "type": question.kind,
            "video": question.video,
        },
        "quizId": ctx.data.kahoot.uuid,
        "quizMaster": ctx.data.challenge.quiz_master,
        "quizTitle": ctx.data.kahoot.title,
        "quizType": progress.quiz_type,
        "sessionId": ctx.session_id,
        "startTime": progress.timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::challenge::models::QuestionKind;
    use crate::scoring::Evaluation;

    #[test]
    fn test_payload_carries_scored_answer() {
        let mut data = ChallengeData::default();
        data.kahoot.uuid = "quiz-uuid".to_string();
        let question: Question = serde_json::from_value(json!({
            "type": "quiz",
            "question": "Capital of France?",
            "time": 20000,
            "choices": [{"answer": "Paris", "correct": true}]
        }))
        .unwrap();
        let scored = ScoredAnswer {
            evaluation: Evaluation {
                correct: true,
                text: "Paris".to_string(),
                choice_index: 0,
                percent_correct: 1.0,
            },
            reaction_ms: 1,
            points: 1000.0,
            streak_bonus: 100,
            previous_streak: 1,
            streak: 2,
            total_score: 2100.0,
        };
        let device = DeviceProfile::default();
        let payload = answer_payload(&AnswerContext {
            data: &data,
            question: &question,
            question_index: 2,
            scored: &scored,
            player: "me",
            player_cid: "cid-1",
            session_id: "0123456",
            device: &device,
            received_time: 1_700_000_000_000,
        });

        let answer = &payload["question"]["answers"][0];
        assert_eq!(answer["points"], 1000.0);
        assert_eq!(answer["bonusPoints"]["answerStreakBonus"], 100);
        assert_eq!(answer["playerCid"], "cid-1");
        assert_eq!(payload["question"]["index"], 2);
        assert_eq!(payload["question"]["type"], QuestionKind::Quiz.as_str());
        assert_eq!(payload["quizId"], "quiz-uuid");
        assert_eq!(payload["device"]["screen"]["width"], 1920);
    }
}
