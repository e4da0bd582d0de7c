//! Handshake, subscription and room-join sequence
//!
//! Runs over any `Transport`: the live channel answers with real server
//! frames, the challenge poller with synthesized ones.

use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::config::ClientConfig;
use crate::constants::{CONTROLLER_CHANNEL, HANDSHAKE_CHANNEL, SERVICE_CHANNELS, STATUS_CHANNEL};
use crate::core::correlator::MessageCorrelator;
use crate::core::events::{EventKind, TransportEvent};
use crate::core::gate::EventGate;
use crate::core::message::CometdMessage;
use crate::core::message_types::{GameSettings, SessionEvent};
use crate::core::retry::{RetryOutcome, TEAM_ROSTER_POLICY};
use crate::core::session::{lock_session, ConnectionState, SharedSession};
use crate::core::transport::Transport;
use crate::error::{KahootError, Result};
use crate::handlers::commands::{self, TeamRoster};

pub struct JoinProtocol<'a> {
    pub transport: &'a dyn Transport,
    pub correlator: &'a MessageCorrelator,
    pub session: &'a SharedSession,
    pub gate: &'a EventGate,
    pub config: &'a ClientConfig,
}

/// Wait for the first frame accepted by `pick`, failing on close or deadline
async fn wait_for<T>(
    frames: &mut mpsc::UnboundedReceiver<TransportEvent>,
    deadline: Instant,
    mut pick: impl FnMut(&CometdMessage) -> Option<Result<T>>,
) -> Result<T> {
    loop {
        match timeout_at(deadline, frames.recv()).await {
            Err(_) => return Err(KahootError::Timeout),
            Ok(None) | Ok(Some(TransportEvent::Closed { .. })) => {
                return Err(KahootError::SessionClosed)
            }
            Ok(Some(TransportEvent::Frame(frame))) => {
                if let Some(outcome) = pick(&frame) {
                    return outcome;
                }
            }
            Ok(Some(_)) => {}
        }
    }
}

/// A LOCKED status fails the join wherever it arrives
fn lock_status(frame: &CometdMessage) -> Option<KahootError> {
    if frame.channel != STATUS_CHANNEL {
        return None;
    }
    let data = frame.data.as_ref()?;
    (data.get("status").and_then(Value::as_str) == Some("LOCKED"))
        .then(|| KahootError::Locked(data.clone()))
}

fn cid_of(data: &Value) -> Option<String> {
    match data.get("cid")? {
        Value::String(cid) => Some(cid.clone()),
        Value::Number(cid) => Some(cid.to_string()),
        _ => None,
    }
}

impl JoinProtocol<'_> {
    fn set_state(&self, next: ConnectionState) -> Result<()> {
        lock_session(self.session)?.transition(next)
    }

    /// Open the channel and complete the Bayeux negotiation. Returns the
    /// channel id from the handshake ack.
    pub async fn handshake(
        &self,
        frames: &mut mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Result<String> {
        self.set_state(ConnectionState::Connecting)?;
        self.transport.open().await?;
        self.set_state(ConnectionState::Handshaking)?;

        self.transport.send(CometdMessage::handshake()).await?;
        let deadline = Instant::now() + self.correlator.timeout();
        let channel_id = wait_for(frames, deadline, |frame| {
            if let Some(locked) = lock_status(frame) {
                return Some(Err(locked));
            }
            if frame.channel != HANDSHAKE_CHANNEL {
                return None;
            }
            if frame.successful != Some(true) {
                return Some(match serde_json::to_value(frame) {
                    Ok(payload) => Err(KahootError::ProtocolError(payload)),
                    Err(e) => Err(e.into()),
                });
            }
            Some(frame.client_id.clone().ok_or_else(|| {
                KahootError::MessageParseError("Handshake ack without clientId".to_string())
            }))
        })
        .await?;
        debug!("Handshake complete, channel id {}", channel_id);
        lock_session(self.session)?.channel_id = Some(channel_id.clone());

        for channel in SERVICE_CHANNELS {
            self.correlator
                .request(self.transport, CometdMessage::subscribe(&channel_id, channel))
                .await?;
        }

        let mut connect = CometdMessage::connect(&channel_id, 0);
        self.correlator.stamp(&mut connect)?;
        self.transport.send(connect).await?;

        Ok(channel_id)
    }

    /// Join the room under `name`. Resolves with the game settings once the
    /// service accepts the player.
    pub async fn join(
        &self,
        name: &str,
        settings: &GameSettings,
        team: &TeamRoster,
    ) -> Result<GameSettings> {
        let mut frames = self.transport.subscribe(EventKind::Any);
        let (pin, channel_id) = {
            let mut session = lock_session(self.session)?;
            session.player_name = name.to_string();
            (session.session_id.clone(), session.channel_id.clone())
        };

        let channel_id = match channel_id {
            Some(id) => id,
            None => self.handshake(&mut frames).await?,
        };

        tokio::time::sleep(self.config.join_delay).await;

        let mut login = CometdMessage::login(&channel_id, &pin, name, &self.config.device);
        self.correlator.stamp(&mut login)?;
        self.transport.send(login).await?;

        let deadline = Instant::now() + self.correlator.timeout();
        let cid = wait_for(&mut frames, deadline, |frame| {
            if let Some(locked) = lock_status(frame) {
                return Some(Err(locked));
            }
            let data = frame.data.as_ref()?;
            if frame.channel == CONTROLLER_CHANNEL && frame.data_type() == Some("loginResponse") {
                if data.get("error").is_some() {
                    return Some(Err(KahootError::ProtocolError(data.clone())));
                }
                return Some(Ok(cid_of(data).unwrap_or_default()));
            }
            None
        })
        .await?;

        {
            let mut session = lock_session(self.session)?;
            session.client_id = Some(cid.clone());
            session.settings = Some(settings.clone());
            session.transition(ConnectionState::Joined)?;
        }
        info!("Joined {} as {} (cid {})", pin, name, cid);

        if settings.is_team_mode() {
            if let Some(members) = team.members() {
                self.send_team(&channel_id, &pin, &members).await?;
            }
        }

        self.gate.deliver(SessionEvent::Joined(settings.clone()));
        if settings.two_factor_auth {
            self.gate.deliver(SessionEvent::TwoFactorReset);
        } else {
            self.set_state(ConnectionState::Active)?;
            self.gate.open();
        }
        Ok(settings.clone())
    }

    async fn send_team(&self, channel_id: &str, pin: &str, members: &[String]) -> Result<()> {
        let correlator = self.correlator;
        let transport = self.transport;
        let outcome = TEAM_ROSTER_POLICY
            .run("Team roster", move || {
                correlator.request(transport, commands::team_roster(channel_id, pin, members))
            })
            .await?;
        if let RetryOutcome::Downgraded(e) = outcome {
            warn!("Team members were not acknowledged: {}", e);
        }
        Ok(())
    }
}
