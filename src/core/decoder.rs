//! Maps frames pushed by the live service onto session events

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::constants::{DISCONNECT_CHANNEL, PLAYER_CHANNEL, STATUS_CHANNEL};
use crate::core::message::CometdMessage;
use crate::core::message_types::SessionEvent;

/// Event ids carried in `data.id` of `/service/player` frames
pub mod player_event {
    pub const QUESTION_READY: u16 = 1;
    pub const QUESTION_START: u16 = 2;
    pub const QUIZ_END: u16 = 3;
    pub const TIME_OVER: u16 = 4;
    pub const GAME_RESET: u16 = 5;
    pub const QUESTION_END: u16 = 8;
    pub const QUIZ_START: u16 = 9;
    pub const FEEDBACK_REQUEST: u16 = 12;
    pub const PODIUM: u16 = 13;
    pub const NAME_ACCEPT: u16 = 14;
    pub const RECOVERY_DATA: u16 = 17;
    pub const TEAM_ACCEPT: u16 = 19;
    pub const TEAM_TALK: u16 = 20;
    pub const TWO_FACTOR_WRONG: u16 = 51;
    pub const TWO_FACTOR_CORRECT: u16 = 52;
    pub const TWO_FACTOR_RESET: u16 = 53;
}

/// Event ids of commands sent on `/service/controller`
pub mod controller_event {
    pub const FEEDBACK: u16 = 11;
    pub const TEAM_ROSTER: u16 = 18;
    pub const ANSWER: u16 = 45;
    pub const TWO_FACTOR_ANSWER: u16 = 50;
}

fn typed<T: DeserializeOwned>(content: Value, event_id: u16) -> Option<T> {
    match serde_json::from_value(content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Failed to decode player event {}: {}", event_id, e);
            None
        }
    }
}

/// Decode one frame. Meta traffic and unknown player events yield `None`.
pub fn decode_frame(message: &CometdMessage) -> Option<SessionEvent> {
    match message.channel.as_str() {
        STATUS_CHANNEL => message.data.clone().map(SessionEvent::Status),
        DISCONNECT_CHANNEL => Some(SessionEvent::Disconnect {
            reason: message
                .error
                .clone()
                .unwrap_or_else(|| "Disconnected by server".to_string()),
        }),
        PLAYER_CHANNEL => decode_player_event(message),
        _ => None,
    }
}

fn decode_player_event(message: &CometdMessage) -> Option<SessionEvent> {
    use player_event::*;

    let event_id = message.data_event_id()?;
    let content = message.data_content().unwrap_or(Value::Null);

    let event = match event_id {
        QUESTION_READY => SessionEvent::QuestionReady(typed(content, event_id)?),
        QUESTION_START => SessionEvent::QuestionStart(typed(content, event_id)?),
        QUIZ_END => SessionEvent::QuizEnd(typed(content, event_id)?),
        TIME_OVER => SessionEvent::TimeOver(content),
        GAME_RESET => SessionEvent::GameReset,
        QUESTION_END => SessionEvent::QuestionEnd(typed(content, event_id)?),
        QUIZ_START => SessionEvent::QuizStart(typed(content, event_id)?),
        FEEDBACK_REQUEST => SessionEvent::Feedback(content),
        PODIUM => SessionEvent::Podium(typed(content, event_id)?),
        NAME_ACCEPT => SessionEvent::NameAccept(content),
        RECOVERY_DATA => SessionEvent::RecoveryData(content),
        TEAM_ACCEPT => SessionEvent::TeamAccept(content),
        TEAM_TALK => SessionEvent::TeamTalk(content),
        TWO_FACTOR_WRONG => SessionEvent::TwoFactorWrong,
        TWO_FACTOR_CORRECT => SessionEvent::TwoFactorCorrect,
        TWO_FACTOR_RESET => SessionEvent::TwoFactorReset,
        other => {
            debug!("Ignoring player event {}", other);
            return None;
        }
    };
    Some(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player_frame(id: u16, content: Value) -> CometdMessage {
        CometdMessage {
            data: Some(json!({"id": id, "content": content.to_string()})),
            ..CometdMessage::new(PLAYER_CHANNEL)
        }
    }

    #[test]
    fn test_decode_question_ready() {
        let frame = player_frame(
            player_event::QUESTION_READY,
            json!({"questionIndex": 3, "timeLeft": 5000, "gameBlockType": "quiz", "quizQuestionAnswers": [4, 4, 2, 4]}),
        );
        match decode_frame(&frame) {
            Some(SessionEvent::QuestionReady(ready)) => {
                assert_eq!(ready.question_index, 3);
                assert_eq!(ready.time_left, 5000);
                assert_eq!(ready.quiz_question_answers, vec![4, 4, 2, 4]);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_decode_status_and_meta() {
        let status = CometdMessage {
            data: Some(json!({"status": "LOCKED"})),
            ..CometdMessage::new(STATUS_CHANNEL)
        };
        assert_eq!(
            decode_frame(&status),
            Some(SessionEvent::Status(json!({"status": "LOCKED"})))
        );
        assert_eq!(decode_frame(&CometdMessage::new("/meta/connect")), None);
    }

    #[test]
    fn test_unknown_player_event_is_skipped() {
        assert_eq!(decode_frame(&player_frame(99, json!({}))), None);
    }

    #[test]
    fn test_two_factor_events() {
        assert_eq!(
            decode_frame(&player_frame(player_event::TWO_FACTOR_CORRECT, json!({}))),
            Some(SessionEvent::TwoFactorCorrect)
        );
    }
}
