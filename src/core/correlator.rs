//! Request/response correlation for the duplex channel
//!
//! Every outbound frame takes the next id of a per-session sequence. Frames
//! that expect an answer also register a pending entry *before* they are
//! handed to the transport, so a fast response can never beat the
//! registration. Each entry ends exactly once: resolved by the first matching
//! response, or expired by its deadline. Responses arriving after expiry find
//! nothing to resolve and are dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::core::message::CometdMessage;
use crate::core::transport::Transport;
use crate::error::{KahootError, Result};

struct PendingRequest {
    deadline: Instant,
    responder: oneshot::Sender<CometdMessage>,
}

#[derive(Default)]
struct PendingTable {
    last_id: u64,
    pending: HashMap<u64, PendingRequest>,
}

impl PendingTable {
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Assigns ids and matches responses back to their callers
#[derive(Clone)]
pub struct MessageCorrelator {
    table: Arc<Mutex<PendingTable>>,
    timeout: Duration,
}

impl MessageCorrelator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Arc::new(Mutex::new(PendingTable::default())),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stamp a frame that expects no correlated answer
    pub fn stamp(&self, message: &mut CometdMessage) -> Result<u64> {
        let mut table = self.table.lock()?;
        let id = table.next_id();
        message.id = Some(id.to_string());
        Ok(id)
    }

    /// Stamp a frame and register its pending entry
    pub fn register(&self, message: &mut CometdMessage) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + self.timeout;

        let mut table = self.table.lock()?;
        let id = table.next_id();
        message.id = Some(id.to_string());
        table.pending.insert(
            id,
            PendingRequest {
                deadline,
                responder: tx,
            },
        );

        Ok(PendingResponse {
            id,
            deadline,
            receiver: rx,
            table: Arc::clone(&self.table),
        })
    }

    /// Resolve the pending entry matching the frame's id. Returns false when
    /// the frame answers nothing we are still waiting for.
    pub fn on_response(&self, message: CometdMessage) -> bool {
        let id = match message.numeric_id() {
            Some(id) => id,
            None => return false,
        };

        let entry = match self.table.lock() {
            Ok(mut table) => table.pending.remove(&id),
            Err(e) => {
                warn!("Failed to acquire pending table lock: {}", e);
                return false;
            }
        };

        match entry {
            Some(request) => {
                if Instant::now() > request.deadline {
                    debug!("Response {} arrived past its deadline", id);
                }
                // The waiter may have gone away; the entry is consumed either way
                let _ = request.responder.send(message);
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, id: u64) -> bool {
        self.table
            .lock()
            .map(|table| table.pending.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn pending_count(&self) -> usize {
        self.table.lock().map(|table| table.pending.len()).unwrap_or(0)
    }

    pub fn last_id(&self) -> u64 {
        self.table.lock().map(|table| table.last_id).unwrap_or(0)
    }

    /// Fail every waiter; used when the session closes
    pub fn clear(&self) {
        if let Ok(mut table) = self.table.lock() {
            let dropped = table.pending.len();
            table.pending.clear();
            if dropped > 0 {
                debug!("Dropped {} pending requests on close", dropped);
            }
        }
    }

    /// Correlated send: register, dispatch, await the response. A response
    /// flagged unsuccessful fails with the frame as its payload.
    pub async fn request(
        &self,
        transport: &dyn Transport,
        mut message: CometdMessage,
    ) -> Result<CometdMessage> {
        let pending = self.register(&mut message)?;
        transport.send(message).await?;

        let response = pending.wait().await?;
        if response.successful == Some(false) {
            return Err(KahootError::ProtocolError(serde_json::to_value(&response)?));
        }
        Ok(response)
    }
}

/// Handle on one registered request
pub struct PendingResponse {
    id: u64,
    deadline: Instant,
    receiver: oneshot::Receiver<CometdMessage>,
    table: Arc<Mutex<PendingTable>>,
}

impl PendingResponse {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Wait for the response or the deadline, whichever comes first
    pub async fn wait(mut self) -> Result<CometdMessage> {
        match tokio::time::timeout_at(self.deadline, &mut self.receiver).await {
            Ok(Ok(message)) => Ok(message),
            Ok(Err(_)) => Err(KahootError::SessionClosed),
            Err(_) => {
                warn!("Request {} timed out", self.id);
                Err(KahootError::Timeout)
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        // Expired or abandoned entries must not linger
        if let Ok(mut table) = self.table.lock() {
            table.pending.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_and_shared() {
        let correlator = MessageCorrelator::new(Duration::from_secs(10));
        let mut a = CometdMessage::new("/meta/connect");
        let mut b = CometdMessage::new("/service/controller");
        assert_eq!(correlator.stamp(&mut a).unwrap(), 1);
        let pending = correlator.register(&mut b).unwrap();
        assert_eq!(pending.id(), 2);
        assert_eq!(b.id.as_deref(), Some("2"));
        assert!(correlator.is_pending(2));
    }

    #[tokio::test]
    async fn test_response_resolves_and_removes() {
        let correlator = MessageCorrelator::new(Duration::from_secs(10));
        let mut msg = CometdMessage::new("/meta/subscribe");
        let pending = correlator.register(&mut msg).unwrap();

        let response = CometdMessage::ack("/meta/subscribe", msg.id.clone(), true);
        assert!(correlator.on_response(response));
        assert_eq!(correlator.pending_count(), 0);

        let resolved = pending.wait().await.unwrap();
        assert_eq!(resolved.successful, Some(true));
    }

    #[test]
    fn test_unknown_id_is_ignored() {
        let correlator = MessageCorrelator::new(Duration::from_secs(10));
        assert!(!correlator.on_response(CometdMessage::ack("/meta/connect", Some("99".into()), true)));
        assert!(!correlator.on_response(CometdMessage::new("/service/player")));
    }

    #[test]
    fn test_abandoned_request_is_removed() {
        let correlator = MessageCorrelator::new(Duration::from_secs(10));
        let mut msg = CometdMessage::new("/meta/subscribe");
        let pending = correlator.register(&mut msg).unwrap();
        drop(pending);
        assert_eq!(correlator.pending_count(), 0);
    }
}
