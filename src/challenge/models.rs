//! Data returned by the challenge REST endpoints

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Question kinds with their own correctness rules; anything else is `Other`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum QuestionKind {
    Quiz,
    Jumble,
    MultipleSelectQuiz,
    OpenEnded,
    WordCloud,
    Other(String),
}

impl From<String> for QuestionKind {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "quiz" => Self::Quiz,
            "jumble" => Self::Jumble,
            "multiple_select_quiz" => Self::MultipleSelectQuiz,
            "open_ended" => Self::OpenEnded,
            "word_cloud" => Self::WordCloud,
            _ => Self::Other(raw),
        }
    }
}

impl From<QuestionKind> for String {
    fn from(kind: QuestionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl QuestionKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Quiz => "quiz",
            Self::Jumble => "jumble",
            Self::MultipleSelectQuiz => "multiple_select_quiz",
            Self::OpenEnded => "open_ended",
            Self::WordCloud => "word_cloud",
            Self::Other(raw) => raw,
        }
    }
}

impl Default for QuestionKind {
    fn default() -> Self {
        Self::Quiz
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub correct: bool,
}

fn default_multiplier() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    /// Question title
    #[serde(default)]
    pub question: Option<String>,
    /// Time budget in milliseconds
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub points: Option<bool>,
    #[serde(default = "default_multiplier")]
    pub points_multiplier: f64,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub layout: Option<String>,
    #[serde(default)]
    pub question_format: Option<Value>,
    #[serde(default)]
    pub video: Option<Value>,
}

impl Question {
    /// Absent flag means the question awards points
    pub fn points_enabled(&self) -> bool {
        self.points.unwrap_or(true)
    }

    pub fn correct_answers(&self) -> Vec<String> {
        self.choices
            .iter()
            .filter(|c| c.correct)
            .map(|c| c.answer.clone())
            .collect()
    }
}

/// The quiz a challenge is built on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuizDefinition {
    pub uuid: String,
    pub title: String,
    pub quiz_type: Option<String>,
    pub questions: Vec<Question>,
}

impl QuizDefinition {
    pub fn choice_counts(&self) -> Vec<usize> {
        self.questions.iter().map(|q| q.choices.len()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeUser {
    pub nickname: String,
    #[serde(rename = "playerCId", alias = "playerCid")]
    pub player_cid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeGameOptions {
    /// When false the game imposes no per-question timer
    pub question_timer: bool,
}

impl Default for ChallengeGameOptions {
    fn default() -> Self {
        Self {
            question_timer: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeInfo {
    pub challenge_id: String,
    pub pin: Option<String>,
    /// Epoch milliseconds after which no answers are accepted
    pub end_time: i64,
    pub max_players: usize,
    pub challenge_users_list: Vec<ChallengeUser>,
    pub quiz_master: Option<Value>,
    pub game_options: ChallengeGameOptions,
}

impl ChallengeInfo {
    pub fn has_ended(&self, now_ms: i64) -> bool {
        self.end_time > 0 && self.end_time <= now_ms
    }

    pub fn is_full(&self) -> bool {
        self.max_players > 0 && self.challenge_users_list.len() >= self.max_players
    }

    pub fn player_cid(&self, nickname: &str) -> Option<&str> {
        self.challenge_users_list
            .iter()
            .find(|u| u.nickname == nickname)
            .map(|u| u.player_cid.as_str())
    }
}

/// Cumulative scores of every player after one question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerProgressEntry {
    pub question_metrics: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerProgress {
    pub player_progress_entries: Vec<PlayerProgressEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeProgress {
    pub player_progress: PlayerProgress,
    pub game_mode: Option<String>,
    pub game_options: Option<Value>,
    pub quiz_type: Option<String>,
    pub timestamp: Option<i64>,
}

impl ChallengeProgress {
    pub fn entries(&self) -> &[PlayerProgressEntry] {
        &self.player_progress.player_progress_entries
    }

    pub fn latest(&self) -> Option<&PlayerProgressEntry> {
        self.entries().last()
    }
}

/// Response of the progress endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSnapshot {
    pub challenge: ChallengeInfo,
    pub kahoot: QuizDefinition,
    pub progress: ChallengeProgress,
}

/// Response of the resolve-by-pin endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeLookup {
    pub challenge: ChallengeInfo,
    pub kahoot: QuizDefinition,
}

/// Everything known about the challenge, merged from lookup and snapshots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeData {
    pub challenge: ChallengeInfo,
    pub kahoot: QuizDefinition,
    pub progress: ChallengeProgress,
}

impl ChallengeData {
    pub fn from_lookup(lookup: ChallengeLookup) -> Self {
        Self {
            challenge: lookup.challenge,
            kahoot: lookup.kahoot,
            progress: ChallengeProgress::default(),
        }
    }

    /// Take the newest progress; challenge and quiz only replace what we
    /// hold when the snapshot actually carries them
    pub fn absorb(&mut self, snapshot: ProgressSnapshot) {
        if !snapshot.challenge.challenge_id.is_empty() {
            self.challenge = snapshot.challenge;
        }
        if !snapshot.kahoot.questions.is_empty() {
            self.kahoot = snapshot.kahoot;
        }
        self.progress = snapshot.progress;
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.kahoot.questions.get(index)
    }

    pub fn question_count(&self) -> usize {
        self.kahoot.questions.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JoinResponse {
    pub player_cid: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_question_defaults() {
        let q: Question = serde_json::from_value(json!({
            "type": "quiz",
            "time": 20000,
            "choices": [{"answer": "a", "correct": true}, {"answer": "b"}]
        }))
        .unwrap();
        assert_eq!(q.kind, QuestionKind::Quiz);
        assert!(q.points_enabled());
        assert_eq!(q.points_multiplier, 1.0);
        assert_eq!(q.correct_answers(), vec!["a".to_string()]);
    }

    #[test]
    fn test_unknown_kind_round_trips_its_name() {
        let q: Question = serde_json::from_value(json!({"type": "slider"})).unwrap();
        assert_eq!(q.kind, QuestionKind::Other("slider".to_string()));
        assert_eq!(serde_json::to_value(&q.kind).unwrap(), json!("slider"));
    }

    #[test]
    fn test_challenge_lifecycle_checks() {
        let info: ChallengeInfo = serde_json::from_value(json!({
            "challengeId": "abc",
            "endTime": 1000,
            "maxPlayers": 2,
            "challengeUsersList": [{"nickname": "a", "playerCId": "1"}, {"nickname": "b", "playerCId": "2"}]
        }))
        .unwrap();
        assert!(info.has_ended(1000));
        assert!(!info.has_ended(999));
        assert!(info.is_full());
        assert_eq!(info.player_cid("b"), Some("2"));
        assert!(info.game_options.question_timer);
    }

    #[test]
    fn test_absorb_keeps_quiz_when_snapshot_has_none() {
        let mut data = ChallengeData::from_lookup(ChallengeLookup {
            challenge: ChallengeInfo {
                challenge_id: "abc".to_string(),
                ..ChallengeInfo::default()
            },
            kahoot: QuizDefinition {
                questions: vec![serde_json::from_value(json!({"type": "quiz"})).unwrap()],
                ..QuizDefinition::default()
            },
        });
        let snapshot: ProgressSnapshot = serde_json::from_value(json!({
            "progress": {"playerProgress": {"playerProgressEntries": [{"questionMetrics": {"me": 900}}]}}
        }))
        .unwrap();
        data.absorb(snapshot);
        assert_eq!(data.challenge.challenge_id, "abc");
        assert_eq!(data.question_count(), 1);
        assert_eq!(data.progress.entries().len(), 1);
    }
}
