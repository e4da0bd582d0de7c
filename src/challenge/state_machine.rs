//! Phase machine that replays a challenge as if a host were running it
//!
//! start -> ready -> answer -> leaderboard -> (ready ... ) -> close -> complete
//!
//! Each phase performs its entry action and, with auto-continue on, arms the
//! single timer that moves it on. Without auto-continue the consumer advances
//! manually; only the settle delay after an answer is always armed.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::challenge::api::ChallengeApi;
use crate::challenge::models::{ChallengeData, Question};
use crate::challenge::payload::{answer_payload, AnswerContext};
use crate::challenge::scheduler::{PhaseScheduler, TimerAction};
use crate::config::ClientConfig;
use crate::constants::FULL_SCORE_REACTION_MS;
use crate::core::events::{EventBus, TransportEvent};
use crate::core::message_types::{
    Podium, PointsData, QuestionEnd, QuestionReady, QuestionStart, QuizEnd, QuizStart,
    SessionEvent, StreakPoints,
};
use crate::error::{KahootError, Result};
use crate::scoring::{
    replay_history, score_answer, standing, streak_bonus, AnswerOverrides, ScoreState,
    ScoredAnswer, Standing, Submission,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChallengePhase {
    Start,
    Ready,
    Answer,
    Leaderboard,
    Close,
    Complete,
}

impl ChallengePhase {
    fn can_transition_to(self, next: ChallengePhase) -> bool {
        use ChallengePhase::*;
        matches!(
            (self, next),
            (Start, Ready)
                | (Start, Close)
                | (Ready, Answer)
                | (Answer, Leaderboard)
                | (Leaderboard, Ready)
                | (Leaderboard, Close)
                | (Close, Complete)
        )
    }
}

impl fmt::Display for ChallengePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Ready => "ready",
            Self::Answer => "answer",
            Self::Leaderboard => "leaderboard",
            Self::Close => "close",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Bound one service call so a slow response fails before the caller's
/// deadline
async fn within<T>(budget: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(budget, call)
        .await
        .map_err(|_| KahootError::Timeout)?
}

/// An answer the service accepted. Its result is revealed once the
/// standings have been refreshed.
pub struct AcceptedAnswer {
    question: Question,
    choice: Value,
    scored: ScoredAnswer,
}

/// The question currently open for answers
struct OpenQuestion {
    shown_at: Instant,
    shown_at_epoch_ms: i64,
    deadline: Option<Instant>,
    answered: bool,
}

pub struct ChallengeStateMachine {
    config: Arc<ClientConfig>,
    api: Arc<dyn ChallengeApi>,
    bus: EventBus,
    data: ChallengeData,
    session_id: String,
    player: String,
    player_cid: String,
    score: ScoreState,
    scheduler: PhaseScheduler,
    phase: Option<ChallengePhase>,
    open_question: Option<OpenQuestion>,
    pending_result: Option<QuestionEnd>,
    correct_count: u32,
    incorrect_count: u32,
    closed: bool,
}

impl ChallengeStateMachine {
    pub fn new(
        config: Arc<ClientConfig>,
        api: Arc<dyn ChallengeApi>,
        bus: EventBus,
        data: ChallengeData,
        session_id: &str,
    ) -> Self {
        Self {
            config,
            api,
            bus,
            data,
            session_id: session_id.to_string(),
            player: String::new(),
            player_cid: String::new(),
            score: ScoreState::new(),
            scheduler: PhaseScheduler::new(),
            phase: None,
            open_question: None,
            pending_result: None,
            correct_count: 0,
            incorrect_count: 0,
            closed: false,
        }
    }

    pub fn phase(&self) -> Option<ChallengePhase> {
        self.phase
    }

    pub fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn data(&self) -> &ChallengeData {
        &self.data
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.scheduler
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn emit(&self, event: SessionEvent) {
        self.bus.dispatch(TransportEvent::Session(event));
    }

    fn enter(&mut self, next: ChallengePhase) -> Result<()> {
        if let Some(current) = self.phase {
            if !current.can_transition_to(next) {
                return Err(KahootError::ValidationError(format!(
                    "Invalid challenge transition {} -> {}",
                    current, next
                )));
            }
        }
        debug!("Challenge {}: entering {}", self.session_id, next);
        self.phase = Some(next);
        Ok(())
    }

    /// Arm a phase timer when the machine drives itself
    fn arm_auto(&mut self, delay: Duration, action: TimerAction) {
        if self.config.challenge_auto_continue {
            self.scheduler.arm(delay, action);
        }
    }

    fn current_question(&self) -> Result<&Question> {
        let index = self.score.question_index;
        self.data.question(index).ok_or_else(|| {
            KahootError::QuizDataError(format!(
                "Question {} missing from a quiz of {}",
                index,
                self.data.question_count()
            ))
        })
    }

    fn current_standing(&self) -> Standing {
        standing(self.data.progress.latest(), &self.player, self.score.score)
    }

    /// Join as `name`, or resume the participation history already holds.
    /// Returns the player cid.
    pub async fn login(&mut self, name: &str) -> Result<String> {
        self.player = name.to_string();
        let replay = replay_history(self.data.progress.entries(), &self.data.kahoot.questions, name);

        if replay.answered > 0 {
            info!(
                "Resuming challenge {} as {} after {} answered questions",
                self.session_id, name, replay.answered
            );
            self.score.restore(&replay);
            self.player_cid = self
                .data
                .challenge
                .player_cid(name)
                .unwrap_or_default()
                .to_string();
        } else {
            let joined = within(
                self.config.http_budget(),
                self.api.join(&self.data.challenge.challenge_id, name),
            )
            .await?;
            self.player_cid = joined.player_cid;
        }
        Ok(self.player_cid.clone())
    }

    /// Enter the first phase
    pub fn begin(&mut self) -> Result<()> {
        self.enter(ChallengePhase::Start)?;
        self.emit(SessionEvent::QuizStart(QuizStart {
            quiz_name: self.data.kahoot.title.clone(),
            quiz_type: self.data.progress.quiz_type.clone(),
            quiz_question_answers: self.data.kahoot.choice_counts(),
        }));
        self.arm_auto(self.config.phase_delay, TimerAction::StartDone);
        Ok(())
    }

    fn enter_ready(&mut self) -> Result<()> {
        self.enter(ChallengePhase::Ready)?;
        let question = self.current_question()?;
        let ready = QuestionReady {
            question_index: self.score.question_index,
            game_block_type: Some(question.kind.to_string()),
            game_block_layout: question.layout.clone(),
            quiz_question_answers: self.data.kahoot.choice_counts(),
            time_left: self.config.phase_delay.as_millis() as u64,
            time_available: question.time,
        };
        self.emit(SessionEvent::QuestionReady(ready));
        self.arm_auto(self.config.phase_delay, TimerAction::ReadyDone);
        Ok(())
    }

    fn answer_window(&self, question: &Question) -> Duration {
        if self.data.challenge.game_options.question_timer && question.time > 0 {
            Duration::from_millis(question.time)
        } else {
            self.config.answer_fallback
        }
    }

    fn enter_answer(&mut self) -> Result<()> {
        self.enter(ChallengePhase::Answer)?;
        let question = self.current_question()?;
        let start = QuestionStart {
            question_index: self.score.question_index,
            game_block_type: Some(question.kind.to_string()),
            time_available: question.time,
        };
        let window = self.answer_window(question);

        self.open_question = Some(OpenQuestion {
            shown_at: Instant::now(),
            shown_at_epoch_ms: chrono::Utc::now().timestamp_millis(),
            deadline: self
                .config
                .challenge_auto_continue
                .then(|| Instant::now() + window),
            answered: false,
        });
        self.emit(SessionEvent::QuestionStart(start));
        self.arm_auto(window, TimerAction::AnswerTimeout);
        Ok(())
    }

    fn enter_leaderboard(&mut self) -> Result<()> {
        self.enter(ChallengePhase::Leaderboard)?;
        self.open_question = None;
        self.score.advance();
        self.arm_auto(self.config.phase_delay, TimerAction::LeaderboardDone);
        Ok(())
    }

    fn enter_close(&mut self) -> Result<()> {
        self.enter(ChallengePhase::Close)?;
        let standing = self.current_standing();
        let player_count = self
            .data
            .progress
            .latest()
            .map(|e| e.question_metrics.len())
            .unwrap_or(self.data.challenge.challenge_users_list.len())
            .max(1);

        self.emit(SessionEvent::QuizEnd(QuizEnd {
            rank: standing.rank,
            player_count,
            quiz_id: self.data.kahoot.uuid.clone(),
            total_score: self.score.score,
            correct_count: self.correct_count,
            incorrect_count: self.incorrect_count,
        }));
        self.emit(SessionEvent::Podium(Podium::for_rank(standing.rank)));
        self.arm_auto(self.config.phase_delay, TimerAction::CloseDone);
        Ok(())
    }

    fn enter_complete(&mut self) -> Result<()> {
        self.enter(ChallengePhase::Complete)?;
        info!("Challenge {} complete", self.session_id);
        self.shutdown(Some("Challenge complete".to_string()));
        Ok(())
    }

    fn ready_or_close(&mut self) -> Result<()> {
        if self.score.question_index >= self.data.question_count() {
            self.enter_close()
        } else {
            self.enter_ready()
        }
    }

    /// Unanswered question: no submission is made and the streak breaks
    fn time_over(&mut self) -> Result<()> {
        let already_answered = self
            .open_question
            .as_ref()
            .map(|q| q.answered)
            .unwrap_or(true);
        if already_answered {
            return Ok(());
        }
        if let Some(open) = self.open_question.as_mut() {
            open.answered = true;
        }
        self.scheduler.cancel();

        let question = self.current_question()?;
        let kind = question.kind.to_string();
        let correct_answers = question.correct_answers();

        self.score.record_miss();
        self.incorrect_count += 1;
        let standing = self.current_standing();

        self.emit(SessionEvent::TimeOver(json!({
            "questionIndex": self.score.question_index,
        })));
        self.pending_result = Some(QuestionEnd {
            choice: None,
            kind: Some(kind),
            is_correct: false,
            text: String::new(),
            points: 0.0,
            total_score: self.score.score,
            points_data: PointsData {
                total_points_without_bonuses: self.score.score,
                total_points_with_bonuses: self.score.score,
                ..PointsData::default()
            },
            rank: standing.rank,
            nemesis: standing.nemesis,
            correct_answers,
        });
        self.scheduler.arm(self.config.settle_delay, TimerAction::Settle);
        Ok(())
    }

    fn settle(&mut self) -> Result<()> {
        if let Some(result) = self.pending_result.take() {
            self.emit(SessionEvent::QuestionEnd(result));
        }
        self.enter_leaderboard()
    }

    /// Apply a fired timer
    pub fn on_timer(&mut self, action: TimerAction) -> Result<()> {
        debug!("Challenge {}: timer {:?}", self.session_id, action);
        match action {
            TimerAction::StartDone | TimerAction::LeaderboardDone => self.ready_or_close(),
            TimerAction::ReadyDone => self.enter_answer(),
            TimerAction::AnswerTimeout => self.time_over(),
            TimerAction::Settle => self.settle(),
            TimerAction::CloseDone => self.enter_complete(),
        }
    }

    pub async fn next_timer(&mut self) -> TimerAction {
        self.scheduler.next_fire().await
    }

    /// Manual progression when auto-continue is off
    pub fn advance(&mut self) -> Result<()> {
        if self.scheduler.pending() == Some(TimerAction::Settle) {
            return Err(KahootError::ValidationError(
                "Result is being revealed; nothing to advance".to_string(),
            ));
        }
        match self.phase {
            Some(ChallengePhase::Start) => self.on_timer(TimerAction::StartDone),
            Some(ChallengePhase::Ready) => self.on_timer(TimerAction::ReadyDone),
            Some(ChallengePhase::Answer) => self.on_timer(TimerAction::AnswerTimeout),
            Some(ChallengePhase::Leaderboard) => self.on_timer(TimerAction::LeaderboardDone),
            Some(ChallengePhase::Close) => self.on_timer(TimerAction::CloseDone),
            Some(ChallengePhase::Complete) | None => Err(KahootError::ValidationError(
                "Challenge is not running".to_string(),
            )),
        }
    }

    /// Score an answer to the open question and submit it. Nothing is
    /// committed unless the service accepts the submission in time.
    pub async fn submit(&mut self, choice: &Value, overrides: &AnswerOverrides) -> Result<AcceptedAnswer> {
        let open = match self.open_question.as_ref() {
            Some(open) if self.phase == Some(ChallengePhase::Answer) && !open.answered => open,
            _ => {
                return Err(KahootError::ValidationError(
                    "No question is open for answers".to_string(),
                ))
            }
        };
        let shown_at = open.shown_at;
        let received_time = open.shown_at_epoch_ms;
        let deadline = open.deadline;

        let question = self.current_question()?.clone();
        let submission = Submission::from_value(&question.kind, choice)?;
        let reaction_ms = if self.config.challenge_get_full_score {
            FULL_SCORE_REACTION_MS
        } else {
            shown_at.elapsed().as_millis() as u64
        };

        self.score
            .ensure_streak(self.data.progress.entries(), &self.data.kahoot.questions, &self.player);
        let mut next = self.score.clone();
        let scored = score_answer(&question, &submission, reaction_ms, &mut next, overrides)?;

        // A valid answer stops the clock before it is sent
        self.scheduler.cancel();

        let payload = answer_payload(&AnswerContext {
            data: &self.data,
            question: &question,
            question_index: self.score.question_index,
            scored: &scored,
            player: &self.player,
            player_cid: &self.player_cid,
            session_id: &self.session_id,
            device: &self.config.device,
            received_time,
        });
        let sent = within(
            self.config.http_budget(),
            self.api.submit_answers(&self.data.challenge.challenge_id, &payload),
        )
        .await;
        if let Err(e) = sent {
            warn!("Answer submission failed: {}", e);
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                self.scheduler.arm(remaining, TimerAction::AnswerTimeout);
            }
            return Err(e);
        }

        self.score = next;
        if let Some(open) = self.open_question.as_mut() {
            open.answered = true;
        }
        if scored.evaluation.correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.emit(SessionEvent::QuestionSubmit);

        Ok(AcceptedAnswer {
            question,
            choice: choice.clone(),
            scored,
        })
    }

    /// Refresh the standings for an accepted answer and arm the settle delay
    /// that reveals its result
    pub async fn reveal(&mut self, accepted: AcceptedAnswer) {
        let index = self.score.question_index;
        let refreshed = within(
            self.config.http_budget(),
            self.api.progress(&self.data.challenge.challenge_id, Some(index)),
        )
        .await;
        match refreshed {
            Ok(snapshot) => self.data.absorb(snapshot),
            Err(e) => warn!("Progress refresh failed, ranking on cached standings: {}", e),
        }

        let AcceptedAnswer { question, choice, scored } = accepted;
        self.pending_result = Some(self.question_end(&question, &choice, &scored));
        self.scheduler.arm(self.config.settle_delay, TimerAction::Settle);
    }

    fn question_end(&self, question: &Question, choice: &Value, scored: &ScoredAnswer) -> QuestionEnd {
        let standing = self.current_standing();
        let bonus = f64::from(scored.streak_bonus);
        QuestionEnd {
            choice: Some(choice.clone()),
            kind: Some(question.kind.to_string()),
            is_correct: scored.evaluation.correct,
            text: scored.evaluation.text.clone(),
            points: scored.points + bonus,
            total_score: scored.total_score,
            points_data: PointsData {
                total_points_without_bonuses: scored.total_score - bonus,
                total_points_with_bonuses: scored.total_score,
                question_points: scored.points,
                answer_streak_points: StreakPoints {
                    streak_level: scored.streak,
                    streak_bonus: bonus,
                    total_streak_points: bonus,
                    previous_streak_level: scored.previous_streak,
                    previous_streak_bonus: f64::from(streak_bonus(scored.previous_streak)),
                },
            },
            rank: standing.rank,
            nemesis: standing.nemesis,
            correct_answers: question.correct_answers(),
        }
    }

    /// Stop all timers and announce the close once
    pub fn shutdown(&mut self, reason: Option<String>) {
        self.scheduler.cancel();
        if self.closed {
            return;
        }
        self.closed = true;
        self.bus.dispatch(TransportEvent::Closed { reason });
    }
}
