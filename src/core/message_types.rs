//! Typed events delivered to the consumer of a session
//!
//! Both transports produce these: live frames are decoded into them, the
//! challenge state machine synthesizes them directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Modules;

/// Settings negotiated for the game before joining
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameSettings {
    pub two_factor_auth: bool,
    pub namerator: bool,
    pub participant_id: bool,
    pub smart_practice: bool,
    pub game_mode: Option<String>,
}

impl GameSettings {
    pub fn is_team_mode(&self) -> bool {
        self.game_mode.as_deref() == Some("team")
    }
}

/// Quiz metadata announced when the quiz begins
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizStart {
    pub quiz_name: String,
    pub quiz_type: Option<String>,
    /// Choice count of every question, in order
    pub quiz_question_answers: Vec<usize>,
}

impl QuizStart {
    pub fn question_count(&self) -> usize {
        self.quiz_question_answers.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionReady {
    pub question_index: usize,
    pub game_block_type: Option<String>,
    pub game_block_layout: Option<String>,
    pub quiz_question_answers: Vec<usize>,
    /// Milliseconds until the question opens
    pub time_left: u64,
    /// Milliseconds the player has to answer
    pub time_available: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionStart {
    pub question_index: usize,
    pub game_block_type: Option<String>,
    pub time_available: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StreakPoints {
    pub streak_level: u32,
    pub streak_bonus: f64,
    pub total_streak_points: f64,
    pub previous_streak_level: u32,
    pub previous_streak_bonus: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointsData {
    pub total_points_without_bonuses: f64,
    pub total_points_with_bonuses: f64,
    pub question_points: f64,
    pub answer_streak_points: StreakPoints,
}

/// Closest competitor at or above the player's score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Nemesis {
    pub name: String,
    pub total_score: f64,
    pub is_ghost: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionEnd {
    pub choice: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub is_correct: bool,
    pub text: String,
    pub points: f64,
    pub total_score: f64,
    pub points_data: PointsData,
    pub rank: usize,
    pub nemesis: Option<Nemesis>,
    pub correct_answers: Vec<String>,
}

/// Final standings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizEnd {
    pub rank: usize,
    pub player_count: usize,
    pub quiz_id: String,
    pub total_score: f64,
    pub correct_count: u32,
    pub incorrect_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Podium {
    pub podium_medal_type: Option<String>,
}

impl Podium {
    /// Medal awarded for a final rank
    pub fn for_rank(rank: usize) -> Self {
        let medal = match rank {
            1 => Some("gold"),
            2 => Some("silver"),
            3 => Some("bronze"),
            _ => None,
        };
        Self {
            podium_medal_type: medal.map(str::to_string),
        }
    }
}

/// Events a session emits to its consumer
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Transport is ready to join (challenge snapshot accepted)
    Ready,
    Joined(GameSettings),
    Status(Value),
    QuizStart(QuizStart),
    QuestionReady(QuestionReady),
    QuestionStart(QuestionStart),
    /// The answer was accepted by the service
    QuestionSubmit,
    TimeOver(Value),
    QuestionEnd(QuestionEnd),
    QuizEnd(QuizEnd),
    Podium(Podium),
    Feedback(Value),
    GameReset,
    NameAccept(Value),
    TeamAccept(Value),
    TeamTalk(Value),
    RecoveryData(Value),
    TwoFactorReset,
    TwoFactorWrong,
    TwoFactorCorrect,
    Disconnect { reason: String },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Joined(_) => "joined",
            Self::Status(_) => "status",
            Self::QuizStart(_) => "quizStart",
            Self::QuestionReady(_) => "questionReady",
            Self::QuestionStart(_) => "questionStart",
            Self::QuestionSubmit => "questionSubmit",
            Self::TimeOver(_) => "timeOver",
            Self::QuestionEnd(_) => "questionEnd",
            Self::QuizEnd(_) => "quizEnd",
            Self::Podium(_) => "podium",
            Self::Feedback(_) => "feedback",
            Self::GameReset => "gameReset",
            Self::NameAccept(_) => "nameAccept",
            Self::TeamAccept(_) => "teamAccept",
            Self::TeamTalk(_) => "teamTalk",
            Self::RecoveryData(_) => "recoveryData",
            Self::TwoFactorReset => "twoFactorReset",
            Self::TwoFactorWrong => "twoFactorWrong",
            Self::TwoFactorCorrect => "twoFactorCorrect",
            Self::Disconnect { .. } => "disconnect",
        }
    }

    /// Whether the module owning this event is enabled
    pub fn allowed_by(&self, modules: &Modules) -> bool {
        match self {
            Self::QuizEnd(_) => modules.quiz_end,
            Self::Podium(_) => modules.podium,
            Self::TimeOver(_) => modules.time_over,
            Self::QuestionReady(_) => modules.question_ready,
            Self::QuestionStart(_) => modules.question_start,
            Self::QuestionEnd(_) => modules.question_end,
            Self::Feedback(_) => modules.feedback,
            Self::GameReset => modules.game_reset,
            Self::NameAccept(_) => modules.name_accept,
            Self::TeamAccept(_) => modules.team_accept,
            Self::TeamTalk(_) => modules.team_talk,
            Self::RecoveryData(_) => modules.backup,
            Self::TwoFactorReset | Self::TwoFactorWrong | Self::TwoFactorCorrect => {
                modules.two_factor
            }
            _ => true,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnect { .. })
    }
}
