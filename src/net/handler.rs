//! Connection handler module
//!
//! Handles the lifecycle of client connections including:
//! - WebSocket handshake on accepted TCP streams
//! - One reader loop per connection feeding the chat session
//! - One writer task per connection draining its outbound queue
//! - Cleanup on close, transport failure or server shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async_with_config, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::error::{NetworkError, Result};
use crate::net::connection::ConnectionId;
use crate::net::session::ChatSession;
use crate::protocol::ServerEvent;
use crate::AppState;

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// Connection handler for processing client connections
pub struct ConnectionHandler {
    /// Shared application state
    state: Arc<AppState>,
}

impl ConnectionHandler {
    /// Create a new connection handler
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Handle a WebSocket connection (browser client)
    pub async fn handle_websocket(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(address = %addr, "Handling WebSocket connection");

        // Set TCP options before upgrade
        stream.set_nodelay(true)?;

        // Perform WebSocket handshake
        let handshake = accept_async_with_config(stream, Some(self.websocket_config()));
        let ws_stream = timeout(self.state.config.handshake_timeout(), handshake)
            .await
            .map_err(|_| NetworkError::HandshakeTimeout)?
            .map_err(|e| NetworkError::WebSocket(e.to_string()))?;

        info!(address = %addr, "WebSocket connection established");

        let (sink, stream) = ws_stream.split();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        // Register and greet
        let mut session = ChatSession::new(self.state.clone());
        let id = session.connect(addr, outbound_tx)?;

        let writer = tokio::spawn(write_events(id, sink, outbound_rx));
        let mut shutdown_rx = self.state.shutdown_tx.subscribe();

        // Main processing loop
        let result = self
            .process_connection(&session, stream, &mut shutdown_rx)
            .await;

        // Cleanup. Unregistering drops the queue sender, which ends the writer.
        debug!(connection_id = %id, "Connection handler ending");
        session.disconnect();

        if let Err(e) = writer.await {
            trace!(connection_id = %id, error = %e, "Writer task did not finish cleanly");
        }

        result
    }

    /// Read frames until the client goes away or the server shuts down
    async fn process_connection(
        &self,
        session: &ChatSession,
        mut stream: WsStream,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => session.handle_frame(&text)?,
                    Some(Ok(Message::Binary(data))) => session.handle_binary(data.len())?,
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(connection_id = ?session.id(), "Connection closed");
                        break;
                    }
                    // Pings are answered by tungstenite itself
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(NetworkError::WebSocket(e.to_string()).into());
                    }
                },
                _ = shutdown_rx.recv() => {
                    debug!(connection_id = ?session.id(), "Closing connection for shutdown");
                    break;
                }
            }
        }

        Ok(())
    }

    fn websocket_config(&self) -> WebSocketConfig {
        let max = self.state.config.max_message_size;
        WebSocketConfig {
            max_message_size: Some(max),
            max_frame_size: Some(max),
            ..WebSocketConfig::default()
        }
    }
}

/// Drain a connection's outbound queue into its socket
async fn write_events(
    id: ConnectionId,
    mut sink: WsSink,
    mut outbound_rx: mpsc::UnboundedReceiver<ServerEvent>,
) {
    while let Some(event) = outbound_rx.recv().await {
        let text = match event.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(connection_id = %id, event = event.name(), error = %e, "Failed to encode event");
                continue;
            }
        };
        trace!(connection_id = %id, event = event.name(), "Sending event");
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(connection_id = %id, error = %e, "Write failed, dropping outbound queue");
            return;
        }
    }

    if let Err(e) = sink.close().await {
        trace!(connection_id = %id, error = %e, "Error during WebSocket close");
    }
}

/// Accept incoming WebSocket connections until shutdown
pub async fn accept_websocket_connections(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_rx: &mut broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, addr)) => {
                        info!("New WebSocket connection from: {}", addr);
                        let handler = ConnectionHandler::new(state.clone());
                        tokio::spawn(async move {
                            if let Err(e) = handler.handle_websocket(stream, addr).await {
                                warn!("WebSocket connection error from {}: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept WebSocket connection: {}", e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("WebSocket connection acceptor shutting down");
                break;
            }
        }
    }
}
