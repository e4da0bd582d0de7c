// Service endpoints
pub const DEFAULT_WS_BASE: &str = "wss://kahoot.it/cometd";
pub const DEFAULT_API_BASE: &str = "https://kahoot.it";
pub const CHALLENGE_PATH: &str = "/rest/challenges/";
pub const SERVICE_HOST: &str = "kahoot.it";

// Correlation and pacing (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PHASE_DELAY_MS: u64 = 5_000;
pub const DEFAULT_ANSWER_FALLBACK_MS: u64 = 120_000;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 300;
pub const DEFAULT_JOIN_DELAY_MS: u64 = 500;
pub const TWO_FACTOR_MIN_WAIT_MS: u64 = 250;
pub const FEEDBACK_MIN_WAIT_MS: u64 = 500;

// Reaction time reported when the full-score option is on
pub const FULL_SCORE_REACTION_MS: u64 = 1;

// Bayeux channels
pub const HANDSHAKE_CHANNEL: &str = "/meta/handshake";
pub const SUBSCRIBE_CHANNEL: &str = "/meta/subscribe";
pub const UNSUBSCRIBE_CHANNEL: &str = "/meta/unsubscribe";
pub const CONNECT_CHANNEL: &str = "/meta/connect";
pub const DISCONNECT_CHANNEL: &str = "/meta/disconnect";
pub const CONTROLLER_CHANNEL: &str = "/service/controller";
pub const PLAYER_CHANNEL: &str = "/service/player";
pub const STATUS_CHANNEL: &str = "/service/status";
pub const SERVICE_CHANNELS: [&str; 3] = [CONTROLLER_CHANNEL, PLAYER_CHANNEL, STATUS_CHANNEL];

// Client id the challenge service expects before a join assigns one
pub const CHALLENGE_CLIENT_ID: &str = "_none_";

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
pub const DEFAULT_SCREEN_WIDTH: u32 = 1920;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 1080;

pub const DEFAULT_TEAM: [&str; 4] = ["Player 1", "Player 2", "Player 3", "Player 4"];
