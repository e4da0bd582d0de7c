//! Subscription table shared by both transports

use std::sync::{Arc, Mutex};

use log::{error, trace};
use tokio::sync::mpsc;

use crate::core::message::CometdMessage;
use crate::core::message_types::SessionEvent;

/// Which transport events a subscriber wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Opened,
    Frame,
    Session,
    Closed,
    Any,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    /// Raw frame pushed by the live service (or synthesized response frame)
    Frame(CometdMessage),
    /// Event synthesized by an emulated transport
    Session(SessionEvent),
    Closed { reason: Option<String> },
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Opened => EventKind::Opened,
            Self::Frame(_) => EventKind::Frame,
            Self::Session(_) => EventKind::Session,
            Self::Closed { .. } => EventKind::Closed,
        }
    }
}

/// Registration table of typed event channels. Each dispatched event is
/// delivered once to every live subscriber of its kind, in dispatch order.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<(EventKind, mpsc::UnboundedSender<TransportEvent>)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<TransportEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.subscribers.lock() {
            Ok(mut subscribers) => subscribers.push((kind, tx)),
            Err(e) => error!("Failed to acquire subscriber lock: {}", e),
        }
        rx
    }

    /// Deliver an event; subscribers whose receiver is gone are pruned.
    /// Returns the number of deliveries.
    pub fn dispatch(&self, event: TransportEvent) -> usize {
        let mut subscribers = match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Failed to acquire subscriber lock for dispatch: {}", e);
                return 0;
            }
        };

        let kind = event.kind();
        let mut delivered = 0;
        subscribers.retain(|(wanted, tx)| {
            if tx.is_closed() {
                return false;
            }
            if *wanted == kind || *wanted == EventKind::Any {
                if tx.send(event.clone()).is_err() {
                    return false;
                }
                delivered += 1;
            }
            true
        });

        trace!("Dispatched {:?} to {} subscribers", kind, delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let bus = EventBus::new();
        let mut frames = bus.subscribe(EventKind::Frame);
        let mut all = bus.subscribe(EventKind::Any);

        assert_eq!(bus.dispatch(TransportEvent::Opened), 1);
        assert_eq!(bus.dispatch(TransportEvent::Frame(CometdMessage::new("/meta/connect"))), 2);

        assert_eq!(all.recv().await, Some(TransportEvent::Opened));
        assert!(matches!(all.recv().await, Some(TransportEvent::Frame(_))));
        assert!(matches!(frames.recv().await, Some(TransportEvent::Frame(_))));
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(EventKind::Any);
        assert_eq!(bus.subscriber_count(), 1);
        drop(rx);
        assert_eq!(bus.dispatch(TransportEvent::Opened), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
