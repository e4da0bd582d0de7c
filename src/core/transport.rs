//! Capability interface shared by the live channel and the challenge poller

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::events::{EventKind, TransportEvent};
use crate::core::message::CometdMessage;
use crate::core::session::SessionKind;
use crate::error::Result;

/// A duplex message channel. Implementations deliver inbound traffic only
/// through subscriptions, so callers never learn which transport they drive.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the channel. Resolves once outbound sends are accepted.
    async fn open(&self) -> Result<()>;

    /// Dispatch one message. Ids must already be stamped.
    async fn send(&self, message: CometdMessage) -> Result<()>;

    /// Register for inbound events of one kind
    fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Tear the channel down; subscribers receive `Closed`
    async fn close(&self) -> Result<()>;

    fn kind(&self) -> SessionKind;
}
