//! Controller commands a player sends during a game

use serde_json::{json, Value};

use crate::core::decoder::controller_event;
use crate::core::message::CometdMessage;

/// How the team roster is handled when joining a team game
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamRoster {
    /// Send the default four placeholder members
    Default,
    Members(Vec<String>),
    /// Do not send a roster
    Skip,
}

impl TeamRoster {
    pub fn members(&self) -> Option<Vec<String>> {
        match self {
            Self::Default => Some(
                crate::constants::DEFAULT_TEAM
                    .iter()
                    .map(|m| m.to_string())
                    .collect(),
            ),
            Self::Members(members) => Some(members.clone()),
            Self::Skip => None,
        }
    }
}

impl Default for TeamRoster {
    fn default() -> Self {
        Self::Default
    }
}

/// Host feedback ratings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feedback {
    /// 1 to 5
    pub fun: u8,
    pub learned: bool,
    pub recommend: bool,
    /// -1, 0 or 1
    pub overall: i8,
}

/// Content of an answer command
pub fn answer_content(question_index: usize, kind: &str, choice: &Value, lag_ms: u64) -> Value {
    json!({
        "type": kind,
        "choice": choice,
        "questionIndex": question_index,
        "meta": {"lag": lag_ms},
    })
}

pub fn answer(channel_id: &str, pin: &str, content: &Value) -> CometdMessage {
    CometdMessage::controller(channel_id, pin, controller_event::ANSWER, content)
}

pub fn team_roster(channel_id: &str, pin: &str, members: &[String]) -> CometdMessage {
    CometdMessage::controller(channel_id, pin, controller_event::TEAM_ROSTER, &json!(members))
}

/// Two-factor code as the sequence of tapped shapes
pub fn two_factor(channel_id: &str, pin: &str, steps: &[u8]) -> CometdMessage {
    let sequence: String = steps.iter().map(|s| s.to_string()).collect();
    CometdMessage::controller(
        channel_id,
        pin,
        controller_event::TWO_FACTOR_ANSWER,
        &json!({"sequence": sequence}),
    )
}

pub fn feedback(channel_id: &str, pin: &str, nickname: &str, rating: &Feedback) -> CometdMessage {
    CometdMessage::controller(
        channel_id,
        pin,
        controller_event::FEEDBACK,
        &json!({
            "totalScore": 0,
            "fun": rating.fun,
            "learning": u8::from(rating.learned),
            "recommend": u8::from(rating.recommend),
            "overall": rating.overall,
            "nickname": nickname,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_command() {
        let content = answer_content(3, "jumble", &json!([0, 1, 2, 3]), 12);
        let msg = answer("cid", "123456", &content);
        assert_eq!(msg.data_event_id(), Some(controller_event::ANSWER));
        let decoded = msg.data_content().unwrap();
        assert_eq!(decoded["questionIndex"], 3);
        assert_eq!(decoded["choice"], json!([0, 1, 2, 3]));
        assert_eq!(decoded["meta"]["lag"], 12);
    }

    #[test]
    fn test_two_factor_sequence() {
        let msg = two_factor("cid", "123456", &[3, 1, 0, 2]);
        assert_eq!(msg.data_content().unwrap()["sequence"], "3102");
    }

    #[test]
    fn test_default_roster() {
        let members = TeamRoster::Default.members().unwrap();
        assert_eq!(members.len(), 4);
        assert_eq!(members[0], "Player 1");
        assert!(TeamRoster::Skip.members().is_none());
    }
}
