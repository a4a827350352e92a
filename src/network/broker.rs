//! Connection Broker
//!
//! One background task owns the client registry and serializes every
//! broadcast, so all clients observe the same frame ordering. Fan-out is
//! non-blocking: a client whose outbound queue is full is evicted rather
//! than ever stalling the game loop, and blind clients (dead players) are
//! skipped entirely.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::game::player::STORAGE_SIZE;
use crate::game::state::World;
use crate::network::client::Client;
use crate::network::protocol;

/// Tokens currently bound to a live connection. A token may hold at most one
/// connection; the WebSocket upgrade consults this before completing.
#[derive(Debug, Default)]
pub struct ActiveTokens {
    tokens: Mutex<HashSet<String>>,
}

impl ActiveTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a token for a new connection. Returns false when it is already
    /// in use.
    pub fn try_claim(&self, token: &str) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.to_string())
    }

    pub fn release(&self, token: &str) {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token);
    }

    pub fn is_active(&self, token: &str) -> bool {
        self.tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(token)
    }
}

enum Command {
    Register(Arc<Client>),
    Unregister(u64),
    Broadcast {
        frame: Vec<u8>,
        /// Variant delivered to admin connections instead of `frame`.
        admin_frame: Option<Vec<u8>>,
    },
}

/// Client registry plus broadcast fan-out.
#[derive(Clone)]
pub struct NetworkManager {
    commands: mpsc::UnboundedSender<Command>,
    active_tokens: Arc<ActiveTokens>,
}

impl NetworkManager {
    /// Create the broker and spawn its main loop. Must be called inside a
    /// tokio runtime.
    pub fn new(active_tokens: Arc<ActiveTokens>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(Self::run(rx, active_tokens.clone()));

        Self {
            commands,
            active_tokens,
        }
    }

    pub fn active_tokens(&self) -> &Arc<ActiveTokens> {
        &self.active_tokens
    }

    /// Insert a client into the registry.
    pub fn register(&self, client: Arc<Client>) {
        let _ = self.commands.send(Command::Register(client));
    }

    /// Drop a client: close its connection tasks and free its token.
    pub fn unregister(&self, client_id: u64) {
        let _ = self.commands.send(Command::Unregister(client_id));
    }

    /// Direct send to one client, bypassing the broadcast path. Used for
    /// the mid-round map-state frame on connect.
    pub fn send(&self, client: &Client, frame: Vec<u8>) {
        if !client.try_send(frame) {
            self.unregister(client.id());
        }
    }

    /// Fan a game-state frame out to every sighted client.
    pub fn broadcast_game_state(&self, world: &World, current_tick: i32, current_round: i8) {
        let frame = protocol::encode_game_state(world, current_tick, current_round);
        let _ = self.commands.send(Command::Broadcast {
            frame,
            admin_frame: None,
        });
    }

    /// Announce a new round: admins receive the full wall geometry, regular
    /// clients only the density grid.
    pub fn broadcast_game_start(&self, world: &World) {
        info!("broadcast game start");

        let storage = [0u8; STORAGE_SIZE];
        let frame = protocol::encode_map_state(&world.map, false, &storage);
        let admin_frame = protocol::encode_map_state(&world.map, true, &storage);

        let _ = self.commands.send(Command::Broadcast {
            frame,
            admin_frame: Some(admin_frame),
        });
    }

    /// Announce the end of the round with an empty typed frame.
    pub fn broadcast_game_end(&self) {
        info!("broadcast game end");

        let _ = self.commands.send(Command::Broadcast {
            frame: protocol::encode_game_end(),
            admin_frame: None,
        });
    }

    async fn run(mut rx: mpsc::UnboundedReceiver<Command>, tokens: Arc<ActiveTokens>) {
        let mut clients: HashMap<u64, Arc<Client>> = HashMap::new();

        while let Some(command) = rx.recv().await {
            match command {
                Command::Register(client) => {
                    debug!(
                        id = client.id(),
                        token = %token_preview(client.token()),
                        admin = client.is_admin(),
                        "client registered"
                    );
                    clients.insert(client.id(), client);
                }

                Command::Unregister(id) => {
                    drop_client(&mut clients, &tokens, id, false);
                }

                Command::Broadcast { frame, admin_frame } => {
                    let mut slow: Vec<u64> = Vec::new();

                    for client in clients.values() {
                        if client.is_blind() {
                            continue;
                        }

                        let payload = match (&admin_frame, client.is_admin()) {
                            (Some(admin), true) => admin.clone(),
                            _ => frame.clone(),
                        };

                        if !client.try_send(payload) {
                            slow.push(client.id());
                        }
                    }

                    for id in slow {
                        drop_client(&mut clients, &tokens, id, true);
                    }
                }
            }
        }
    }
}

fn drop_client(
    clients: &mut HashMap<u64, Arc<Client>>,
    tokens: &ActiveTokens,
    id: u64,
    slow: bool,
) {
    let Some(client) = clients.remove(&id) else {
        return;
    };

    client.close();
    if !client.token().is_empty() {
        tokens.release(client.token());
    }

    if slow {
        warn!(id, token = %token_preview(client.token()), "slow consumer evicted");
    } else {
        debug!(id, token = %token_preview(client.token()), "client unregistered");
    }
}

/// First bytes of a token for logs; never the whole secret.
fn token_preview(token: &str) -> String {
    if token.is_empty() {
        return "<spectator>".to_string();
    }
    hex::encode(&token.as_bytes()[..token.len().min(4)])
}

// =============================================================================
// TESTS
// =============================================================================
