//! Player-side protocol exchanges on top of a transport

pub mod commands;
pub mod handshake;

pub use commands::{Feedback, TeamRoster};
pub use handshake::JoinProtocol;
