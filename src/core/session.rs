use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use uuid::Uuid;

use crate::core::message_types::GameSettings;
use crate::error::{KahootError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Live,
    Challenge,
}

impl SessionKind {
    /// Challenge pins are issued with a leading zero
    pub fn from_pin(pin: &str) -> Self {
        if pin.starts_with('0') {
            Self::Challenge
        } else {
            Self::Live
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Handshaking,
    Joined,
    Active,
    Closed,
}

impl ConnectionState {
    fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Handshaking)
                | (Handshaking, Joined)
                | (Joined, Active)
                | (Closed, Closed)
        ) || (self != Closed && next == Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Joined => "joined",
            Self::Active => "active",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One quiz participation
#[derive(Debug, Clone)]
pub struct Session {
    /// Local identifier used to tell concurrent sessions apart in logs
    pub instance_id: Uuid,
    pub session_id: String,
    pub kind: SessionKind,
    pub player_name: String,
    /// Bayeux channel id from the handshake ack
    pub channel_id: Option<String>,
    /// Player id assigned by the service on join
    pub client_id: Option<String>,
    pub connection_state: ConnectionState,
    pub settings: Option<GameSettings>,
}

impl Session {
    pub fn new(session_id: &str, kind: SessionKind) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            kind,
            player_name: String::new(),
            channel_id: None,
            client_id: None,
            connection_state: ConnectionState::Disconnected,
            settings: None,
        }
    }

    /// Move to the next connection state, rejecting out-of-order moves
    pub fn transition(&mut self, next: ConnectionState) -> Result<()> {
        if self.connection_state == next {
            return Ok(());
        }
        if !self.connection_state.can_transition_to(next) {
            return Err(KahootError::ValidationError(format!(
                "Invalid session transition {} -> {}",
                self.connection_state, next
            )));
        }
        debug!(
            "Session {} ({}): {} -> {}",
            self.session_id, self.instance_id, self.connection_state, next
        );
        self.connection_state = next;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.connection_state == ConnectionState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.connection_state == ConnectionState::Closed
    }
}

// Shared handle to the session record; guards are never held across an await
pub type SharedSession = Arc<Mutex<Session>>;

pub fn create_session(session_id: &str, kind: SessionKind) -> SharedSession {
    Arc::new(Mutex::new(Session::new(session_id, kind)))
}

pub fn lock_session(session: &SharedSession) -> Result<MutexGuard<'_, Session>> {
    Ok(session.lock()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_pin() {
        assert_eq!(SessionKind::from_pin("0123456"), SessionKind::Challenge);
        assert_eq!(SessionKind::from_pin("123456"), SessionKind::Live);
    }

    #[test]
    fn test_sequential_transitions() {
        let mut session = Session::new("123456", SessionKind::Live);
        assert!(session.transition(ConnectionState::Joined).is_err());
        session.transition(ConnectionState::Connecting).unwrap();
        session.transition(ConnectionState::Handshaking).unwrap();
        session.transition(ConnectionState::Joined).unwrap();
        session.transition(ConnectionState::Active).unwrap();
        assert!(session.is_active());
        session.transition(ConnectionState::Closed).unwrap();
        assert!(session.transition(ConnectionState::Connecting).is_err());
    }

    #[test]
    fn test_independent_instances() {
        let a = Session::new("1", SessionKind::Live);
        let b = Session::new("1", SessionKind::Live);
        assert_ne!(a.instance_id, b.instance_id);
    }
}
