//! WebSocket Game Server
//!
//! Accepts bot and spectator connections on `/echo`. The upgrade callback
//! inspects the `Authorization` header and refuses a token that is already
//! bound to a live connection with HTTP 401, before the handshake completes.
//! Each accepted connection gets a writer task (outbound queue + keepalive
//! pings) and, for players, a reader task feeding decoded actions into the
//! player's bounded inbound queue.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::game::player::STORAGE_SIZE;
use crate::game::state::GameState;
use crate::manager::auth::AuthManager;
use crate::network::broker::NetworkManager;
use crate::network::client::{Client, CHANNEL_CAPACITY};
use crate::network::protocol::{self, ClientMessage};

/// Deadline for a single WebSocket write.
pub const WRITE_WAIT: Duration = Duration::from_secs(1);

/// Read deadline, refreshed by any inbound traffic (pongs included).
pub const PONG_WAIT: Duration = Duration::from_secs(5);

/// Keepalive ping cadence. Must stay below `PONG_WAIT`.
pub const PING_PERIOD: Duration = Duration::from_millis(PONG_WAIT.as_millis() as u64 * 9 / 10);

/// Maximum inbound message size in bytes.
const MAX_MESSAGE_SIZE: usize = 1024;

/// WebSocket server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind or accept on the listen socket.
    #[error("listener error: {0}")]
    Listener(#[from] std::io::Error),
}

/// The WebSocket front door.
pub struct WsServer {
    bind_addr: SocketAddr,
    auth: Arc<AuthManager>,
    state: Arc<GameState>,
    network: NetworkManager,
}

impl WsServer {
    pub fn new(
        bind_addr: SocketAddr,
        auth: Arc<AuthManager>,
        state: Arc<GameState>,
        network: NetworkManager,
    ) -> Self {
        Self {
            bind_addr,
            auth,
            state,
            network,
        }
    }

    /// Bind and serve until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!("websocket server listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), ServerError> {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let auth = self.auth.clone();
                    let state = self.state.clone();
                    let network = self.network.clone();

                    tokio::spawn(async move {
                        handle_connection(stream, addr, auth, state, network).await;
                    });
                }
                Err(e) => {
                    error!("accept error: {e}");
                }
            }
        }
    }
}

/// Upgrade one TCP stream and wire its tasks up.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    auth: Arc<AuthManager>,
    state: Arc<GameState>,
    network: NetworkManager,
) {
    let active = network.active_tokens().clone();

    // The callback runs mid-handshake: claim the token there so a duplicate
    // is refused with a plain HTTP 401 instead of a completed upgrade.
    let mut token = String::new();
    let callback = |request: &Request, response: Response| {
        if request.uri().path() != "/echo" {
            let mut refusal = ErrorResponse::new(Some("not found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            return Err(refusal);
        }

        let header = request
            .headers()
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !header.is_empty() {
            if !active.try_claim(header) {
                let mut refusal = ErrorResponse::new(Some("token already in use".to_string()));
                *refusal.status_mut() = StatusCode::UNAUTHORIZED;
                return Err(refusal);
            }
            token = header.to_string();
        }

        Ok(response)
    };

    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(MAX_MESSAGE_SIZE);

    let ws = match accept_hdr_async_with_config(stream, callback, Some(config)).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(%addr, "handshake failed: {e}");
            if !token.is_empty() {
                active.release(&token);
            }
            return;
        }
    };

    // Non-empty tokens must resolve to a registered user.
    let user = if token.is_empty() {
        None
    } else {
        match auth.authenticate(&token) {
            Some(user) => Some(user),
            None => {
                warn!(%addr, "unknown token refused");
                active.release(&token);
                let mut ws = ws;
                let _ = timeout(WRITE_WAIT, ws.close(None)).await;
                return;
            }
        }
    };

    let admin = user.as_ref().is_some_and(|u| u.is_admin);
    let (client, out_rx, shutdown_rx) = Client::new(token.clone(), admin);
    let (ws_sink, ws_stream) = ws.split();

    network.register(client.clone());

    // Players get a reader; spectators are write-only.
    let mut storage = [0u8; STORAGE_SIZE];
    if let Some(user) = &user {
        let (in_tx, in_rx) = mpsc::channel(CHANNEL_CAPACITY);
        storage = state.add_player(&user.username, user.color, client.clone(), in_rx);

        tokio::spawn(reader_task(
            ws_stream,
            in_tx,
            network.clone(),
            client.clone(),
            shutdown_rx.clone(),
        ));

        info!(%addr, player = %user.username, "player connection established");
    } else {
        debug!(%addr, "spectator connection established");
    }

    tokio::spawn(writer_task(
        ws_sink,
        out_rx,
        network.clone(),
        client.clone(),
        shutdown_rx,
    ));

    // A mid-round joiner immediately learns the arena and its own storage.
    if state.in_progress() {
        let frame = {
            let world = state.world();
            protocol::encode_map_state(&world.map, admin, &storage)
        };
        network.send(&client, frame);
    }
}

/// Pump the outbound queue onto the socket, pinging on idle. Any write
/// failure or deadline overrun tears the connection down.
async fn writer_task(
    mut sink: SplitSink<WebSocketStream<TcpStream>, Message>,
    mut out_rx: mpsc::Receiver<Vec<u8>>,
    network: NetworkManager,
    client: Arc<Client>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ping = interval(PING_PERIOD);
    ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            frame = out_rx.recv() => {
                let Some(frame) = frame else { break };
                match timeout(WRITE_WAIT, sink.send(Message::Binary(frame))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
            _ = ping.tick() => {
                match timeout(WRITE_WAIT, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    let _ = timeout(WRITE_WAIT, sink.send(Message::Close(None))).await;
    network.unregister(client.id());
}

/// Read frames under the pong deadline, decode them and queue actions for
/// the game loop. Exits on any read error, closing the connection.
async fn reader_task(
    mut stream: SplitStream<WebSocketStream<TcpStream>>,
    in_tx: mpsc::Sender<ClientMessage>,
    network: NetworkManager,
    client: Arc<Client>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let next = tokio::select! {
            next = timeout(PONG_WAIT, stream.next()) => next,
            _ = shutdown.changed() => break,
        };

        let message = match next {
            // Deadline elapsed without traffic.
            Err(_) => break,
            // Stream closed or errored.
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                debug!("read error: {e}");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Binary(data) => match protocol::decode(&data) {
                Ok(decoded) => {
                    // Queue for the game loop; a send failure means the
                    // player record is gone.
                    if in_tx.send(decoded).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    // Bad payloads never touch the player's controls.
                    debug!("undecodable frame dropped: {e}");
                }
            },
            Message::Close(_) => break,
            // Pings are answered by the protocol layer; pongs and text
            // frames only serve to refresh the read deadline.
            _ => {}
        }
    }

    network.unregister(client.id());
}
