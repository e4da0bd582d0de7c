//! Core functionality shared by live and challenge sessions

pub mod connection;
pub mod correlator;
pub mod decoder;
pub mod events;
pub mod gate;
pub mod message;
pub mod message_types;
pub mod retry;
pub mod session;
pub mod transport;

// Re-export main components for convenience
pub use connection::WsTransport;
pub use correlator::{MessageCorrelator, PendingResponse};
pub use events::{EventBus, EventKind, TransportEvent};
pub use gate::{EventGate, QuizTracker};
pub use message::CometdMessage;
pub use session::{create_session, ConnectionState, Session, SessionKind, SharedSession};
pub use transport::Transport;
