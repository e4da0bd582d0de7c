//! kahoot-client - client-side protocol engine for Kahoot! games
//!
//! Joins live games over the CometD WebSocket channel, and plays challenges
//! (self-paced games) by emulating the same channel on top of the challenge
//! REST endpoints. Both deliver one typed event stream.

pub mod challenge;
pub mod client;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;
pub mod scoring;

// Re-export main components
pub use client::{KahootClient, LiveToken};
pub use config::{ClientConfig, DeviceProfile, Modules};
pub use crate::core::message_types::SessionEvent;
pub use crate::core::session::SessionKind;
pub use error::{KahootError, Result};
