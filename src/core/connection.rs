//! WebSocket transport for live sessions
//! Handles the lifecycle of the duplex channel to the service

use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{error, info, trace, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use url::Url;

use crate::core::events::{EventBus, EventKind, TransportEvent};
use crate::core::message::{decode_frames, encode_envelope, CometdMessage};
use crate::core::session::SessionKind;
use crate::core::transport::Transport;
use crate::error::{KahootError, Result};

/// Live duplex channel over a WebSocket
pub struct WsTransport {
    url: Url,
    logging_mode: bool,
    bus: EventBus,
    outbound: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(url: Url, logging_mode: bool) -> Self {
        Self {
            url,
            logging_mode,
            bus: EventBus::new(),
            outbound: Mutex::new(None),
            reader: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn is_open(&self) -> bool {
        self.outbound
            .lock()
            .map(|tx| tx.as_ref().map(|tx| !tx.is_closed()).unwrap_or(false))
            .unwrap_or(false)
    }
}

fn log_frame(logging_mode: bool, direction: &str, text: &str) {
    if logging_mode {
        info!("{}: {}", direction, text);
    } else {
        trace!("{}: {}", direction, text);
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self) -> Result<()> {
        info!("Connecting to {}", self.url);
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<WsMessage>();

        // Forward queued frames to the socket; dropping the sender closes it
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Err(e) = ws_tx.send(message).await {
                    error!("Failed to send WebSocket message: {}", e);
                    break;
                }
            }
            if let Err(e) = ws_tx.close().await {
                trace!("WebSocket close: {}", e);
            }
        });

        let bus = self.bus.clone();
        let logging_mode = self.logging_mode;
        let reader = tokio::spawn(async move {
            let mut reason = None;
            while let Some(result) = ws_rx.next().await {
                match result {
                    Ok(WsMessage::Text(text)) => {
                        log_frame(logging_mode, "RECV", &text);
                        match decode_frames(&text) {
                            Ok(frames) => {
                                for frame in frames {
                                    bus.dispatch(TransportEvent::Frame(frame));
                                }
                            }
                            Err(e) => warn!("Failed to parse frame: {}", e),
                        }
                    }
                    Ok(WsMessage::Close(frame)) => {
                        reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        reason = Some(e.to_string());
                        break;
                    }
                }
            }
            info!("WebSocket closed: {:?}", reason);
            bus.dispatch(TransportEvent::Closed { reason });
        });

        *self.outbound.lock()? = Some(tx);
        *self.reader.lock()? = Some(reader);
        self.bus.dispatch(TransportEvent::Opened);
        Ok(())
    }

    async fn send(&self, message: CometdMessage) -> Result<()> {
        let text = encode_envelope(&message)?;
        log_frame(self.logging_mode, "SEND", &text);

        let outbound = self.outbound.lock()?;
        match outbound.as_ref() {
            Some(tx) => tx
                .send(WsMessage::Text(text))
                .map_err(|_| KahootError::ConnectionError("WebSocket writer has stopped".to_string())),
            None => Err(KahootError::ConnectionError("WebSocket is not open".to_string())),
        }
    }

    fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.bus.subscribe(kind)
    }

    async fn close(&self) -> Result<()> {
        let outbound = self.outbound.lock()?.take();
        let reader = self.reader.lock()?.take();

        if outbound.is_none() {
            return Ok(());
        }
        drop(outbound);
        if let Some(reader) = reader {
            reader.abort();
        }
        self.bus.dispatch(TransportEvent::Closed {
            reason: Some("Closed by client".to_string()),
        });
        Ok(())
    }

    fn kind(&self) -> SessionKind {
        SessionKind::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_open_fails() {
        let transport = WsTransport::new(Url::parse("wss://kahoot.it/cometd/1/t").unwrap(), false);
        assert!(!transport.is_open());
        let result = transport.send(CometdMessage::handshake()).await;
        assert!(matches!(result, Err(KahootError::ConnectionError(_))));
    }

    #[tokio::test]
    async fn test_close_without_open_is_noop() {
        let transport = WsTransport::new(Url::parse("wss://kahoot.it/cometd/1/t").unwrap(), false);
        let mut closed = transport.subscribe(EventKind::Closed);
        transport.close().await.unwrap();
        assert!(closed.try_recv().is_err());
    }
}
