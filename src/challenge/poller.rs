//! Transport stand-in for challenge sessions
//!
//! Speaks just enough Bayeux to satisfy the join protocol and the client's
//! correlated commands, and turns the rest into HTTP calls. All mutable
//! challenge state lives in one actor task; the handle only forwards
//! commands to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::challenge::api::ChallengeApi;
use crate::challenge::models::{ChallengeData, ChallengeLookup};
use crate::challenge::state_machine::ChallengeStateMachine;
use crate::config::ClientConfig;
use crate::constants::{
    CHALLENGE_CLIENT_ID, CONNECT_CHANNEL, CONTROLLER_CHANNEL, DISCONNECT_CHANNEL,
    HANDSHAKE_CHANNEL, SUBSCRIBE_CHANNEL, UNSUBSCRIBE_CHANNEL,
};
use crate::core::decoder::controller_event;
use crate::core::events::{EventBus, EventKind, TransportEvent};
use crate::core::message::CometdMessage;
use crate::core::message_types::{GameSettings, QuizEnd, SessionEvent};
use crate::core::session::SessionKind;
use crate::core::transport::Transport;
use crate::error::{KahootError, Result};
use crate::scoring::AnswerOverrides;

/// Outcome of the snapshot taken when the poller is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Open,
    Ended,
    Full,
}

enum Command {
    Frame(CometdMessage),
    Advance,
    Overrides(AnswerOverrides),
    Shutdown(Option<String>),
}

pub struct ChallengePoller {
    bus: EventBus,
    commands: mpsc::UnboundedSender<Command>,
    admission: Admission,
    settings: GameSettings,
    quiz_id: String,
    opened: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChallengePoller {
    /// Resolve the pin, then build the poller from the lookup
    pub async fn connect(config: Arc<ClientConfig>, api: Arc<dyn ChallengeApi>, pin: &str) -> Result<Self> {
        let lookup = api.resolve_pin(pin).await?;
        Self::from_lookup(config, api, pin, lookup).await
    }

    /// Fetch the progress snapshot once and decide whether the challenge can
    /// still be joined
    pub async fn from_lookup(
        config: Arc<ClientConfig>,
        api: Arc<dyn ChallengeApi>,
        pin: &str,
        lookup: ChallengeLookup,
    ) -> Result<Self> {
        let mut data = ChallengeData::from_lookup(lookup);
        let snapshot = api.progress(&data.challenge.challenge_id, None).await?;
        data.absorb(snapshot);

        let now = chrono::Utc::now().timestamp_millis();
        let admission = if data.challenge.has_ended(now) {
            Admission::Ended
        } else if data.challenge.is_full() {
            Admission::Full
        } else {
            Admission::Open
        };
        info!(
            "Challenge {} ({}): {:?}, {} questions",
            pin,
            data.challenge.challenge_id,
            admission,
            data.question_count()
        );

        let settings = GameSettings {
            game_mode: data.progress.game_mode.clone(),
            ..GameSettings::default()
        };
        let quiz_id = data.kahoot.uuid.clone();

        let bus = EventBus::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let machine = ChallengeStateMachine::new(config, api, bus.clone(), data, pin);
        let actor = PollerActor {
            machine,
            bus: bus.clone(),
            overrides: AnswerOverrides::default(),
        };
        let worker = tokio::spawn(actor.run(rx));

        Ok(Self {
            bus,
            commands: tx,
            admission,
            settings,
            quiz_id,
            opened: AtomicBool::new(false),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn admission(&self) -> Admission {
        self.admission
    }

    /// Settings a join into this challenge negotiates
    pub fn settings(&self) -> GameSettings {
        self.settings.clone()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| KahootError::SessionClosed)
    }

    /// Move to the next phase; used when auto-continue is off
    pub fn advance(&self) -> Result<()> {
        self.command(Command::Advance)
    }

    /// Adjust how the next submitted answer is scored
    pub fn set_overrides(&self, overrides: AnswerOverrides) -> Result<()> {
        self.command(Command::Overrides(overrides))
    }
}

impl Drop for ChallengePoller {
    fn drop(&mut self) {
        if let Ok(mut worker) = self.worker.lock() {
            if let Some(worker) = worker.take() {
                worker.abort();
            }
        }
    }
}

#[async_trait]
impl Transport for ChallengePoller {
    async fn open(&self) -> Result<()> {
        if self.opened.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let (error, reason) = match self.admission {
            Admission::Open => {
                self.bus.dispatch(TransportEvent::Opened);
                self.bus.dispatch(TransportEvent::Session(SessionEvent::Ready));
                return Ok(());
            }
            Admission::Ended => (KahootError::ChallengeEnded, "Challenge has ended"),
            Admission::Full => (KahootError::ChallengeFull, "Challenge is full"),
        };

        warn!("{}", reason);
        self.bus.dispatch(TransportEvent::Session(SessionEvent::QuizEnd(QuizEnd {
            quiz_id: self.quiz_id.clone(),
            ..QuizEnd::default()
        })));
        self.bus.dispatch(TransportEvent::Closed {
            reason: Some(reason.to_string()),
        });
        Err(error)
    }

    async fn send(&self, message: CometdMessage) -> Result<()> {
        self.command(Command::Frame(message))
    }

    fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.bus.subscribe(kind)
    }

    async fn close(&self) -> Result<()> {
        // The actor may already be gone; nothing is left to close then
        let _ = self.command(Command::Shutdown(Some("Closed by client".to_string())));
        Ok(())
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Challenge
    }
}

struct PollerActor {
    machine: ChallengeStateMachine,
    bus: EventBus,
    overrides: AnswerOverrides,
}

impl PollerActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown(reason)) => {
                        self.machine.shutdown(reason);
                        break;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                action = self.machine.next_timer() => {
                    if let Err(e) = self.machine.on_timer(action) {
                        self.halt(e);
                    }
                }
            }
        }
        debug!("Challenge actor stopped");
    }

    /// Corrupt quiz data has no recovery state
    fn halt(&mut self, e: KahootError) {
        error!("Challenge halted: {}", e);
        self.machine.shutdown(Some(e.to_string()));
    }

    fn reply(&self, frame: CometdMessage) {
        self.bus.dispatch(TransportEvent::Frame(frame));
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Frame(frame) => self.handle_frame(frame).await,
            Command::Advance => {
                if let Err(e) = self.machine.advance() {
                    warn!("Cannot advance: {}", e);
                }
            }
            Command::Overrides(overrides) => self.overrides = overrides,
            Command::Shutdown(_) => {}
        }
    }

    async fn handle_frame(&mut self, frame: CometdMessage) {
        match frame.channel.as_str() {
            HANDSHAKE_CHANNEL => self.reply(CometdMessage {
                client_id: Some(CHALLENGE_CLIENT_ID.to_string()),
                ..CometdMessage::ack(HANDSHAKE_CHANNEL, frame.id.clone(), true)
            }),
            SUBSCRIBE_CHANNEL | UNSUBSCRIBE_CHANNEL => self.reply(CometdMessage {
                subscription: frame.subscription.clone(),
                ..CometdMessage::ack(&frame.channel, frame.id.clone(), true)
            }),
            CONNECT_CHANNEL => {}
            DISCONNECT_CHANNEL => self.machine.shutdown(Some("Left the challenge".to_string())),
            CONTROLLER_CHANNEL => self.handle_controller(frame).await,
            other => debug!("Ignoring frame on {}", other),
        }
    }

    async fn handle_controller(&mut self, frame: CometdMessage) {
        if frame.data_type() == Some("login") {
            let name = frame
                .data
                .as_ref()
                .and_then(|d| d.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            self.login(&name).await;
            return;
        }

        let outcome = match frame.data_event_id() {
            Some(controller_event::ANSWER) => {
                let choice = frame
                    .data_content()
                    .and_then(|c| c.get("choice").cloned())
                    .unwrap_or(Value::Null);
                let overrides = std::mem::take(&mut self.overrides);
                self.machine.submit(&choice, &overrides).await.map(Some)
            }
            // Nothing to do for the remaining commands; acknowledge them so
            // correlated sends behave as they do live
            _ => Ok(None),
        };

        match outcome {
            Ok(accepted) => {
                self.reply(CometdMessage::ack(CONTROLLER_CHANNEL, frame.id.clone(), true));
                // The caller has its answer; the standings refresh runs after
                if let Some(accepted) = accepted {
                    self.machine.reveal(accepted).await;
                }
            }
            Err(e) => self.reply(CometdMessage {
                error: Some(e.to_string()),
                ..CometdMessage::ack(CONTROLLER_CHANNEL, frame.id.clone(), false)
            }),
        }
    }

    async fn login(&mut self, name: &str) {
        if self.machine.phase().is_some() {
            self.reply(login_response(json!({
                "type": "loginResponse",
                "error": "USER_INPUT",
                "description": "Already joined",
            })));
            return;
        }
        match self.machine.login(name).await {
            Ok(cid) => {
                self.reply(login_response(json!({"type": "loginResponse", "cid": cid})));
                if let Err(e) = self.machine.begin() {
                    self.halt(e);
                }
            }
            Err(e) => {
                warn!("Challenge join failed: {}", e);
                self.reply(login_response(json!({
                    "type": "loginResponse",
                    "error": "JOIN_FAILED",
                    "description": e.to_string(),
                })));
            }
        }
    }
}

fn login_response(data: Value) -> CometdMessage {
    CometdMessage {
        data: Some(data),
        ..CometdMessage::new(CONTROLLER_CHANNEL)
    }
}

