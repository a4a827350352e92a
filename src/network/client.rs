//! Client Handles
//!
//! One `Client` per live connection, shared between the broker registry, the
//! connection's reader/writer tasks and (for players) the player record.
//! Outbound traffic rides a bounded byte queue; a full queue marks the
//! client as a slow consumer and gets it evicted rather than ever blocking
//! the game loop.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

/// Capacity of the per-client inbound and outbound queues.
pub const CHANNEL_CAPACITY: usize = 10;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// A connected observer or player.
#[derive(Debug)]
pub struct Client {
    id: u64,
    token: String,
    admin: bool,
    blind: AtomicBool,
    out: mpsc::Sender<Vec<u8>>,
    shutdown: watch::Sender<bool>,
}

impl Client {
    /// Build a client handle plus the receiving ends its connection tasks
    /// consume: the outbound byte queue and the shutdown signal.
    pub fn new(
        token: String,
        admin: bool,
    ) -> (Arc<Self>, mpsc::Receiver<Vec<u8>>, watch::Receiver<bool>) {
        let (out_tx, out_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let client = Arc::new(Self {
            id: NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed),
            token,
            admin,
            blind: AtomicBool::new(false),
            out: out_tx,
            shutdown: shutdown_tx,
        });

        (client, out_rx, shutdown_rx)
    }

    /// A client with no connection behind it. Used by simulation tests that
    /// drive players without sockets; the outbound queue simply fills up and
    /// drops.
    pub fn detached() -> Arc<Self> {
        Self::new(String::new(), false).0
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Spectators carry no token and cannot act.
    pub fn is_spectator(&self) -> bool {
        self.token.is_empty()
    }

    pub fn is_blind(&self) -> bool {
        self.blind.load(Ordering::Relaxed)
    }

    /// While blind (owning player dead) the broker withholds frames.
    pub fn set_blind(&self, blind: bool) {
        self.blind.store(blind, Ordering::Relaxed);
    }

    /// Non-blocking enqueue onto the outbound queue. Returns false when the
    /// queue is full or the writer is gone, signalling a slow consumer.
    pub fn try_send(&self, frame: Vec<u8>) -> bool {
        self.out.try_send(frame).is_ok()
    }

    /// Tell this client's connection tasks to wind down.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

// =============================================================================
// TESTS
// =============================================================================
