//! Client configuration module
//! Holds the immutable per-session options, module toggles and endpoints

use crate::constants::{
    CHALLENGE_PATH, DEFAULT_ANSWER_FALLBACK_MS, DEFAULT_API_BASE, DEFAULT_JOIN_DELAY_MS,
    DEFAULT_PHASE_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SCREEN_HEIGHT,
    DEFAULT_SCREEN_WIDTH, DEFAULT_SETTLE_DELAY_MS, DEFAULT_USER_AGENT, DEFAULT_WS_BASE,
};
use crate::error::{KahootError, Result};
use std::env;
use std::time::Duration;
use url::Url;

/// Device metadata reported to the service. Generated elsewhere; the client
/// only forwards it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceProfile {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            screen_width: DEFAULT_SCREEN_WIDTH,
            screen_height: DEFAULT_SCREEN_HEIGHT,
        }
    }
}

/// Per-event toggles. A disabled module suppresses the events it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modules {
    pub feedback: bool,
    pub game_reset: bool,
    pub two_factor: bool,
    pub quiz_end: bool,
    pub podium: bool,
    pub time_over: bool,
    pub question_ready: bool,
    pub question_start: bool,
    pub question_end: bool,
    pub name_accept: bool,
    pub team_accept: bool,
    pub team_talk: bool,
    pub backup: bool,
}

impl Default for Modules {
    fn default() -> Self {
        Self {
            feedback: true,
            game_reset: true,
            two_factor: true,
            quiz_end: true,
            podium: true,
            time_over: true,
            question_ready: true,
            question_start: true,
            question_end: true,
            name_accept: true,
            team_accept: true,
            team_talk: true,
            backup: true,
        }
    }
}

/// Client configuration parameters
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Synthesize timer-driven events for challenges
    pub challenge_auto_continue: bool,
    /// Report a minimal reaction time on challenge answers
    pub challenge_get_full_score: bool,
    /// Log every frame sent and received at info level
    pub logging_mode: bool,
    pub modules: Modules,
    pub ws_base: String,
    pub api_base: String,
    pub request_timeout: Duration,
    pub phase_delay: Duration,
    pub answer_fallback: Duration,
    pub settle_delay: Duration,
    pub join_delay: Duration,
    pub device: DeviceProfile,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            challenge_auto_continue: true,
            challenge_get_full_score: false,
            logging_mode: false,
            modules: Modules::default(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            phase_delay: Duration::from_millis(DEFAULT_PHASE_DELAY_MS),
            answer_fallback: Duration::from_millis(DEFAULT_ANSWER_FALLBACK_MS),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_DELAY_MS),
            join_delay: Duration::from_millis(DEFAULT_JOIN_DELAY_MS),
            device: DeviceProfile::default(),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(default)
}

fn env_millis(name: &str, default: u64) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Duration::from_millis)
            .map_err(|_| KahootError::ConfigError(format!("{} must be a number of milliseconds", name))),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, reading a `.env` file
    /// first when one is present
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Environment variables loaded from {}", path.display());
        }

        let defaults = Self::default();

        let ws_base = env::var("KAHOOT_WS_BASE").unwrap_or(defaults.ws_base);
        let api_base = env::var("KAHOOT_API_BASE").unwrap_or(defaults.api_base);

        let device = DeviceProfile {
            user_agent: env::var("KAHOOT_USER_AGENT").unwrap_or(defaults.device.user_agent),
            screen_width: env::var("KAHOOT_SCREEN_WIDTH")
                .ok()
                .and_then(|w| w.parse().ok())
                .unwrap_or(DEFAULT_SCREEN_WIDTH),
            screen_height: env::var("KAHOOT_SCREEN_HEIGHT")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(DEFAULT_SCREEN_HEIGHT),
        };

        let config = Self {
            challenge_auto_continue: env_flag("KAHOOT_CHALLENGE_AUTO_CONTINUE", true),
            challenge_get_full_score: env_flag("KAHOOT_CHALLENGE_FULL_SCORE", false),
            logging_mode: env_flag("KAHOOT_LOGGING_MODE", false),
            modules: Modules {
                feedback: env_flag("KAHOOT_MODULE_FEEDBACK", true),
                two_factor: env_flag("KAHOOT_MODULE_TWO_FACTOR", true),
                ..Modules::default()
            },
            ws_base,
            api_base,
            request_timeout: env_millis("KAHOOT_REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?,
            phase_delay: env_millis("KAHOOT_PHASE_DELAY_MS", DEFAULT_PHASE_DELAY_MS)?,
            answer_fallback: env_millis("KAHOOT_ANSWER_FALLBACK_MS", DEFAULT_ANSWER_FALLBACK_MS)?,
            settle_delay: env_millis("KAHOOT_SETTLE_DELAY_MS", DEFAULT_SETTLE_DELAY_MS)?,
            join_delay: env_millis("KAHOOT_JOIN_DELAY_MS", DEFAULT_JOIN_DELAY_MS)?,
            device,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check endpoint syntax and timing sanity
    pub fn validate(&self) -> Result<()> {
        let ws = Url::parse(&self.ws_base)?;
        if ws.scheme() != "ws" && ws.scheme() != "wss" {
            return Err(KahootError::ConfigError(format!(
                "ws_base must use ws:// or wss://, got {}",
                self.ws_base
            )));
        }

        let api = Url::parse(&self.api_base)?;
        if api.scheme() != "http" && api.scheme() != "https" {
            return Err(KahootError::ConfigError(format!(
                "api_base must use http:// or https://, got {}",
                self.api_base
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(KahootError::ConfigError("request_timeout must be positive".to_string()));
        }

        Ok(())
    }

    /// Live channel address for a game pin and resolved session token
    pub fn live_url(&self, pin: &str, token: &str) -> Result<Url> {
        let url = Url::parse(&format!(
            "{}/{}/{}",
            self.ws_base.trim_end_matches('/'),
            pin,
            token
        ))?;
        Ok(url)
    }

    /// Time a single challenge HTTP call may take. Kept below
    /// `request_timeout` so the poller answers before the caller stops waiting.
    pub fn http_budget(&self) -> Duration {
        self.request_timeout * 4 / 5
    }

    /// Base address of the challenge REST endpoints
    pub fn challenge_base(&self) -> Result<Url> {
        let base = Url::parse(self.api_base.trim_end_matches('/'))?;
        Ok(base.join(CHALLENGE_PATH)?)
    }

    pub fn with_auto_continue(mut self, enabled: bool) -> Self {
        self.challenge_auto_continue = enabled;
        self
    }

    pub fn with_full_score(mut self, enabled: bool) -> Self {
        self.challenge_get_full_score = enabled;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_pacing() {
        let config = ClientConfig::default();
        assert!(config.challenge_auto_continue);
        assert!(!config.challenge_get_full_score);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.phase_delay, Duration::from_millis(5000));
        assert_eq!(config.answer_fallback, Duration::from_millis(120_000));
        assert_eq!(config.settle_delay, Duration::from_millis(300));
        assert_eq!(config.http_budget(), Duration::from_secs(8));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_http_budget_follows_request_timeout() {
        let config = ClientConfig::default().with_request_timeout(Duration::from_millis(2500));
        assert_eq!(config.http_budget(), Duration::from_millis(2000));
        assert!(config.http_budget() < config.request_timeout);
    }

    #[test]
    fn test_live_url() {
        let config = ClientConfig::default();
        let url = config.live_url("123456", "abcdef").unwrap();
        assert_eq!(url.as_str(), "wss://kahoot.it/cometd/123456/abcdef");
    }

    #[test]
    fn test_challenge_base() {
        let config = ClientConfig::default();
        let url = config.challenge_base().unwrap();
        assert_eq!(url.as_str(), "https://kahoot.it/rest/challenges/");
    }

    #[test]
    fn test_validate_rejects_http_ws_base() {
        let mut config = ClientConfig::default();
        config.ws_base = "https://kahoot.it/cometd".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("ws_base"));
    }
}
