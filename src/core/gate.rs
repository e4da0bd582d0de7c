//! Delivery gate between the transports and the consumer's event channel
//!
//! Game events that arrive before the session is active are not lost: the most
//! recent one is held and released when the gate opens, so a late joiner
//! still sees the question in progress.

use std::sync::{Arc, Mutex};

use log::{debug, error};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::Modules;
use crate::core::message_types::{QuestionReady, QuizStart, SessionEvent};

/// What the session has learned about the running quiz from its events
#[derive(Debug, Clone, Default)]
pub struct QuizTracker {
    pub quiz: Option<QuizStart>,
    pub current_question: Option<QuestionReady>,
    pub feedback_requested_at: Option<Instant>,
    pub two_factor_reset_at: Option<Instant>,
}

impl QuizTracker {
    fn observe(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::QuizStart(start) => self.quiz = Some(start.clone()),
            SessionEvent::QuestionReady(ready) => self.current_question = Some(ready.clone()),
            SessionEvent::QuestionStart(start) => {
                let question = self.current_question.get_or_insert_with(QuestionReady::default);
                question.question_index = start.question_index;
                if start.game_block_type.is_some() {
                    question.game_block_type = start.game_block_type.clone();
                }
            }
            SessionEvent::Feedback(_) => self.feedback_requested_at = Some(Instant::now()),
            SessionEvent::TwoFactorReset => self.two_factor_reset_at = Some(Instant::now()),
            SessionEvent::GameReset => {
                self.quiz = None;
                self.current_question = None;
            }
            _ => {}
        }
    }
}

#[derive(Default)]
struct GateState {
    open: bool,
    held: Option<SessionEvent>,
    tracker: QuizTracker,
}

#[derive(Clone)]
pub struct EventGate {
    state: Arc<Mutex<GateState>>,
    out: mpsc::UnboundedSender<SessionEvent>,
    modules: Modules,
}

impl EventGate {
    pub fn new(out: mpsc::UnboundedSender<SessionEvent>, modules: Modules) -> Self {
        Self {
            state: Arc::new(Mutex::new(GateState::default())),
            out,
            modules,
        }
    }

    fn bypasses_hold(event: &SessionEvent) -> bool {
        matches!(
            event,
            SessionEvent::Ready
                | SessionEvent::Joined(_)
                | SessionEvent::Status(_)
                | SessionEvent::QuestionSubmit
                | SessionEvent::TwoFactorReset
                | SessionEvent::TwoFactorWrong
                | SessionEvent::TwoFactorCorrect
                | SessionEvent::Disconnect { .. }
        )
    }

    fn send(&self, event: SessionEvent) {
        if self.out.send(event).is_err() {
            debug!("Event consumer is gone, dropping event");
        }
    }

    /// Route an event to the consumer, holding it while the gate is closed
    pub fn deliver(&self, event: SessionEvent) {
        if !event.allowed_by(&self.modules) {
            debug!("Module disabled, suppressing {}", event.name());
            return;
        }

        let release = {
            let mut state = match self.state.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("Failed to acquire gate lock: {}", e);
                    return;
                }
            };
            state.tracker.observe(&event);

            if state.open || Self::bypasses_hold(&event) {
                Some(event)
            } else {
                debug!("Session not active yet, holding {}", event.name());
                state.held = Some(event);
                None
            }
        };

        if let Some(event) = release {
            self.send(event);
        }
    }

    /// Open the gate and release the held event, if any
    pub fn open(&self) {
        let held = match self.state.lock() {
            Ok(mut state) => {
                state.open = true;
                state.held.take()
            }
            Err(e) => {
                error!("Failed to acquire gate lock: {}", e);
                return;
            }
        };
        if let Some(event) = held {
            self.send(event);
        }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().map(|s| s.open).unwrap_or(false)
    }

    pub fn tracker(&self) -> QuizTracker {
        self.state
            .lock()
            .map(|s| s.tracker.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message_types::{GameSettings, QuestionStart};

    #[test]
    fn test_latest_pre_join_event_is_released_on_open() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = EventGate::new(tx, Modules::default());

        gate.deliver(SessionEvent::QuestionReady(QuestionReady::default()));
        gate.deliver(SessionEvent::QuestionStart(QuestionStart {
            question_index: 2,
            ..QuestionStart::default()
        }));
        gate.deliver(SessionEvent::Joined(GameSettings::default()));

        assert!(matches!(rx.try_recv(), Ok(SessionEvent::Joined(_))));
        assert!(rx.try_recv().is_err());

        gate.open();
        match rx.try_recv() {
            Ok(SessionEvent::QuestionStart(start)) => assert_eq!(start.question_index, 2),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(gate.tracker().current_question.unwrap().question_index, 2);
    }

    #[test]
    fn test_open_gate_passes_through() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let gate = EventGate::new(tx, Modules::default());
        gate.open();
        gate.deliver(SessionEvent::GameReset);
        assert_eq!(rx.try_recv().ok(), Some(SessionEvent::GameReset));
    }
}
