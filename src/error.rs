use std::error::Error;
use std::fmt;
use std::sync::PoisonError;

use serde_json::Value;

#[derive(Debug)]
pub enum KahootError {
    // Correlation errors
    Timeout,

    // Server answered with an explicit error field; payload kept verbatim
    ProtocolError(Value),

    // Lifecycle errors
    Locked(Value),
    ChallengeEnded,
    ChallengeFull,
    SessionClosed,

    // Connection errors
    ConnectionError(String),
    HttpError(String),

    // Messages errors
    MessageParseError(String),

    // Caller errors
    ValidationError(String),

    // Quiz definition errors
    QuizDataError(String),

    // Session errors
    SessionLock(String),

    // Configuration errors
    ConfigError(String),
}

impl KahootError {
    /// Whether the error is one of the distinguished terminal states
    /// (ended, full or locked) rather than a failure.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            Self::Locked(_) | Self::ChallengeEnded | Self::ChallengeFull | Self::SessionClosed
        )
    }
}

impl fmt::Display for KahootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "No response within the request timeout"),
            Self::ProtocolError(payload) => write!(f, "Protocol error: {}", payload),
            Self::Locked(payload) => write!(f, "Game is locked: {}", payload),
            Self::ChallengeEnded => write!(f, "Challenge has already ended"),
            Self::ChallengeFull => write!(f, "Challenge is full"),
            Self::SessionClosed => write!(f, "Session is closed"),
            Self::ConnectionError(msg) => write!(f, "Connection error: {}", msg),
            Self::HttpError(msg) => write!(f, "HTTP error: {}", msg),
            Self::MessageParseError(msg) => write!(f, "Message parse error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::QuizDataError(msg) => write!(f, "Malformed quiz definition: {}", msg),
            Self::SessionLock(msg) => write!(f, "Session lock error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for KahootError {}

// Converting from PoisonError to facilitate poisoned mutex handling
impl<T> From<PoisonError<T>> for KahootError {
    fn from(err: PoisonError<T>) -> Self {
        KahootError::SessionLock(format!("Mutex poisoned: {}", err))
    }
}

impl From<serde_json::Error> for KahootError {
    fn from(err: serde_json::Error) -> Self {
        KahootError::MessageParseError(err.to_string())
    }
}

impl From<reqwest::Error> for KahootError {
    fn from(err: reqwest::Error) -> Self {
        KahootError::HttpError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for KahootError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        KahootError::ConnectionError(err.to_string())
    }
}

impl From<url::ParseError> for KahootError {
    fn from(err: url::ParseError) -> Self {
        KahootError::ConfigError(format!("Invalid URL: {}", err))
    }
}

// Generic result type for the client
pub type Result<T> = std::result::Result<T, KahootError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_protocol_error_keeps_payload() {
        let err = KahootError::ProtocolError(json!({"error": "USER_INPUT", "description": "Duplicate name"}));
        assert!(err.to_string().contains("Duplicate name"));
        assert!(!err.is_lifecycle());
    }

    #[test]
    fn test_lifecycle_kinds() {
        assert!(KahootError::ChallengeFull.is_lifecycle());
        assert!(KahootError::Locked(json!({"status": "LOCKED"})).is_lifecycle());
        assert!(!KahootError::Timeout.is_lifecycle());
    }
}
