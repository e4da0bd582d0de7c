//! Public session facade
//!
//! One `KahootClient` is one participation. Live and challenge sessions are
//! driven through the same operations and deliver the same `SessionEvent`
//! stream.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::challenge::api::{ChallengeApi, ReqwestChallengeApi};
use crate::challenge::poller::ChallengePoller;
use crate::config::ClientConfig;
use crate::constants::{CONNECT_CHANNEL, FEEDBACK_MIN_WAIT_MS, TWO_FACTOR_MIN_WAIT_MS};
use crate::core::connection::WsTransport;
use crate::core::correlator::MessageCorrelator;
use crate::core::decoder::decode_frame;
use crate::core::events::{EventKind, TransportEvent};
use crate::core::gate::{EventGate, QuizTracker};
use crate::core::message::CometdMessage;
use crate::core::message_types::{GameSettings, SessionEvent};
use crate::core::session::{
    create_session, lock_session, ConnectionState, Session, SessionKind, SharedSession,
};
use crate::core::transport::Transport;
use crate::error::{KahootError, Result};
use crate::handlers::commands::{self, Feedback, TeamRoster};
use crate::handlers::handshake::JoinProtocol;
use crate::scoring::{AnswerOverrides, Submission};

/// Session token and game settings obtained for a live pin. Resolving them
/// is up to the caller.
#[derive(Debug, Clone, Default)]
pub struct LiveToken {
    pub token: String,
    pub settings: GameSettings,
}

pub struct KahootClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    challenge: Option<Arc<ChallengePoller>>,
    session: SharedSession,
    correlator: MessageCorrelator,
    gate: EventGate,
    settings: GameSettings,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    pump: JoinHandle<()>,
}

impl KahootClient {
    /// Pick the session kind from the pin and connect accordingly. Live
    /// pins need a resolved token.
    pub async fn connect(config: ClientConfig, pin: &str, token: Option<LiveToken>) -> Result<Self> {
        match SessionKind::from_pin(pin) {
            SessionKind::Challenge => Self::connect_challenge(config, pin).await,
            SessionKind::Live => {
                let token = token.ok_or_else(|| {
                    KahootError::ValidationError(format!("Live game {} needs a session token", pin))
                })?;
                Self::connect_live(config, pin, token)
            }
        }
    }

    pub fn connect_live(config: ClientConfig, pin: &str, token: LiveToken) -> Result<Self> {
        config.validate()?;
        let url = config.live_url(pin, &token.token)?;
        let transport = Arc::new(WsTransport::new(url, config.logging_mode));
        Ok(Self::assemble(Arc::new(config), pin, transport, None, token.settings))
    }

    pub async fn connect_challenge(config: ClientConfig, pin: &str) -> Result<Self> {
        config.validate()?;
        let api = Arc::new(ReqwestChallengeApi::new(&config)?);
        Self::with_challenge_api(config, pin, api).await
    }

    /// Challenge session over a caller-supplied API client
    pub async fn with_challenge_api(
        config: ClientConfig,
        pin: &str,
        api: Arc<dyn ChallengeApi>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let poller = Arc::new(ChallengePoller::connect(Arc::clone(&config), api, pin).await?);
        let settings = poller.settings();
        let transport: Arc<dyn Transport> = poller.clone();
        Ok(Self::assemble(config, pin, transport, Some(poller), settings))
    }

    /// Session over an arbitrary transport
    pub fn from_transport(
        config: ClientConfig,
        pin: &str,
        transport: Arc<dyn Transport>,
        settings: GameSettings,
    ) -> Self {
        Self::assemble(Arc::new(config), pin, transport, None, settings)
    }

    fn assemble(
        config: Arc<ClientConfig>,
        pin: &str,
        transport: Arc<dyn Transport>,
        challenge: Option<Arc<ChallengePoller>>,
        settings: GameSettings,
    ) -> Self {
        let session = create_session(pin, transport.kind());
        let correlator = MessageCorrelator::new(config.request_timeout);
        let (tx, rx) = mpsc::unbounded_channel();
        let gate = EventGate::new(tx, config.modules.clone());

        let inbound = transport.subscribe(EventKind::Any);
        let pump = tokio::spawn(pump(
            inbound,
            Arc::clone(&transport),
            correlator.clone(),
            gate.clone(),
            Arc::clone(&session),
        ));

        Self {
            config,
            transport,
            challenge,
            session,
            correlator,
            gate,
            settings,
            events: Some(rx),
            pump,
        }
    }

    pub fn kind(&self) -> SessionKind {
        self.transport.kind()
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Copy of the session record
    pub fn session(&self) -> Result<Session> {
        Ok(lock_session(&self.session)?.clone())
    }

    /// Quiz and question state seen so far
    pub fn quiz(&self) -> QuizTracker {
        self.gate.tracker()
    }

    /// Next event of the session; `None` once the session is gone
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Hand the event stream to another task
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.events.take()
    }

    fn protocol(&self) -> JoinProtocol<'_> {
        JoinProtocol {
            transport: self.transport.as_ref(),
            correlator: &self.correlator,
            session: &self.session,
            gate: &self.gate,
            config: &self.config,
        }
    }

    pub async fn join(&self, name: &str) -> Result<GameSettings> {
        self.join_with_team(name, TeamRoster::Default).await
    }

    /// Join, sending `team` as the roster when the game runs in team mode
    pub async fn join_with_team(&self, name: &str, team: TeamRoster) -> Result<GameSettings> {
        if name.trim().is_empty() {
            return Err(KahootError::ValidationError("Player name is empty".to_string()));
        }
        self.protocol().join(name, &self.settings, &team).await
    }

    /// Send team members after joining
    pub async fn join_team(&self, members: &[String]) -> Result<()> {
        if !self.settings.is_team_mode() {
            return Err(KahootError::ValidationError("The game is not in team mode".to_string()));
        }
        let (channel_id, pin) = self.joined_ids()?;
        self.correlator
            .request(self.transport.as_ref(), commands::team_roster(&channel_id, &pin, members))
            .await?;
        Ok(())
    }

    fn joined_ids(&self) -> Result<(String, String)> {
        let session = lock_session(&self.session)?;
        if session.is_closed() {
            return Err(KahootError::SessionClosed);
        }
        match (&session.channel_id, session.client_id.is_some()) {
            (Some(channel_id), true) => Ok((channel_id.clone(), session.session_id.clone())),
            _ => Err(KahootError::ValidationError("Not joined yet".to_string())),
        }
    }

    fn require_live(&self, operation: &str) -> Result<()> {
        if self.kind() == SessionKind::Challenge {
            return Err(KahootError::ValidationError(format!(
                "{} is not available in challenges",
                operation
            )));
        }
        Ok(())
    }

    /// Answer the question in progress
    pub async fn answer(&self, submission: &Submission) -> Result<()> {
        let (channel_id, pin) = self.joined_ids()?;
        if !lock_session(&self.session)?.is_active() {
            return Err(KahootError::ValidationError("Session is not active".to_string()));
        }
        let question = self.gate.tracker().current_question.ok_or_else(|| {
            KahootError::ValidationError("No question in progress".to_string())
        })?;
        let kind = question.game_block_type.as_deref().unwrap_or("quiz");

        let content = commands::answer_content(question.question_index, kind, &submission.to_value(), 0);
        self.correlator
            .request(self.transport.as_ref(), commands::answer(&channel_id, &pin, &content))
            .await?;
        Ok(())
    }

    /// Answer a challenge question with scoring adjustments
    pub async fn answer_with_overrides(&self, submission: &Submission, overrides: AnswerOverrides) -> Result<()> {
        let poller = self.challenge.as_ref().ok_or_else(|| {
            KahootError::ValidationError("Answer overrides only apply to challenges".to_string())
        })?;
        poller.set_overrides(overrides)?;
        self.answer(submission).await
    }

    async fn wait_since(since: Option<tokio::time::Instant>, minimum_ms: u64) {
        if let Some(since) = since {
            let minimum = Duration::from_millis(minimum_ms);
            let elapsed = since.elapsed();
            if elapsed < minimum {
                tokio::time::sleep(minimum - elapsed).await;
            }
        }
    }

    /// Answer the two-factor challenge with the four shape indices
    pub async fn answer_two_factor(&self, steps: &[u8]) -> Result<()> {
        self.require_live("Two-factor authentication")?;
        if steps.len() != 4 || steps.iter().any(|s| *s > 3) {
            return Err(KahootError::ValidationError(
                "Two-factor answer must be four steps between 0 and 3".to_string(),
            ));
        }
        let (channel_id, pin) = self.joined_ids()?;
        Self::wait_since(self.gate.tracker().two_factor_reset_at, TWO_FACTOR_MIN_WAIT_MS).await;
        self.correlator
            .request(self.transport.as_ref(), commands::two_factor(&channel_id, &pin, steps))
            .await?;
        Ok(())
    }

    pub async fn send_feedback(&self, feedback: Feedback) -> Result<()> {
        self.require_live("Feedback")?;
        if !(1..=5).contains(&feedback.fun) || !(-1..=1).contains(&feedback.overall) {
            return Err(KahootError::ValidationError("Feedback rating out of range".to_string()));
        }
        let (channel_id, pin) = self.joined_ids()?;
        let nickname = lock_session(&self.session)?.player_name.clone();
        Self::wait_since(self.gate.tracker().feedback_requested_at, FEEDBACK_MIN_WAIT_MS).await;
        self.correlator
            .request(
                self.transport.as_ref(),
                commands::feedback(&channel_id, &pin, &nickname, &feedback),
            )
            .await?;
        Ok(())
    }

    /// Move a challenge to its next phase by hand
    pub fn advance(&self) -> Result<()> {
        match &self.challenge {
            Some(poller) => poller.advance(),
            None => Err(KahootError::ValidationError(
                "Only challenges can be advanced".to_string(),
            )),
        }
    }

    /// Leave the game and close the channel
    pub async fn leave(&self) -> Result<()> {
        let channel_id = {
            let session = lock_session(&self.session)?;
            if session.is_closed() {
                return Ok(());
            }
            session.channel_id.clone()
        };
        if let Some(channel_id) = channel_id {
            let mut disconnect = CometdMessage::disconnect(&channel_id);
            self.correlator.stamp(&mut disconnect)?;
            if let Err(e) = self.transport.send(disconnect).await {
                debug!("Disconnect frame not sent: {}", e);
            }
        }
        self.transport.close().await?;
        lock_session(&self.session)?.transition(ConnectionState::Closed)?;
        info!("Left game");
        Ok(())
    }
}

impl Drop for KahootClient {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// Route everything the transport delivers: correlated responses to the
/// correlator, session events through the gate, keep-alives back out
async fn pump(
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
    transport: Arc<dyn Transport>,
    correlator: MessageCorrelator,
    gate: EventGate,
    session: SharedSession,
) {
    let mut connect_ack = 0u64;
    let mut disconnect_sent = false;

    while let Some(event) = inbound.recv().await {
        match event {
            TransportEvent::Opened => debug!("Transport opened"),
            TransportEvent::Frame(frame) => {
                if frame.channel == CONNECT_CHANNEL && frame.successful == Some(true) {
                    connect_ack += 1;
                    keep_alive(transport.as_ref(), &correlator, &session, connect_ack).await;
                }
                if let Some(event) = decode_frame(&frame) {
                    disconnect_sent |= event.is_terminal();
                    deliver(&gate, &session, event);
                }
                correlator.on_response(frame);
            }
            TransportEvent::Session(event) => {
                disconnect_sent |= event.is_terminal();
                deliver(&gate, &session, event);
            }
            TransportEvent::Closed { reason } => {
                match lock_session(&session) {
                    Ok(mut s) => {
                        if let Err(e) = s.transition(ConnectionState::Closed) {
                            warn!("{}", e);
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
                correlator.clear();
                // The session is over; whatever was held back goes out first
                gate.open();
                if !disconnect_sent {
                    gate.deliver(SessionEvent::Disconnect {
                        reason: reason.unwrap_or_else(|| "Connection closed".to_string()),
                    });
                }
                break;
            }
        }
    }
    debug!("Event pump stopped");
}

async fn keep_alive(
    transport: &dyn Transport,
    correlator: &MessageCorrelator,
    session: &SharedSession,
    ack: u64,
) {
    let channel_id = match lock_session(session) {
        Ok(s) if !s.is_closed() => s.channel_id.clone(),
        _ => None,
    };
    let Some(channel_id) = channel_id else {
        return;
    };
    let mut connect = CometdMessage::connect(&channel_id, ack);
    if correlator.stamp(&mut connect).is_ok() {
        if let Err(e) = transport.send(connect).await {
            warn!("Keep-alive failed: {}", e);
        }
    }
}

fn deliver(gate: &EventGate, session: &SharedSession, event: SessionEvent) {
    if !matches!(event, SessionEvent::TwoFactorCorrect) {
        gate.deliver(event);
        return;
    }

    // Passing two-factor makes the player active before the event goes out
    let activated = match lock_session(session) {
        Ok(mut s) if s.connection_state == ConnectionState::Joined => {
            match s.transition(ConnectionState::Active) {
                Ok(()) => true,
                Err(e) => {
                    warn!("{}", e);
                    false
                }
            }
        }
        Ok(_) => false,
        Err(e) => {
            warn!("{}", e);
            false
        }
    };
    gate.deliver(event);
    if activated {
        gate.open();
    }
}
