//! Challenge sessions: self-paced games replayed from the REST endpoints

pub mod api;
pub mod models;
pub mod payload;
pub mod poller;
pub mod scheduler;
pub mod state_machine;

pub use api::{ChallengeApi, ReqwestChallengeApi};
pub use poller::{Admission, ChallengePoller};
pub use scheduler::{PhaseScheduler, TimerAction};
pub use state_machine::{ChallengePhase, ChallengeStateMachine};
