//! # Maze Arena Server
//!
//! Authoritative, tick-driven arena server for bot battles. Clients connect
//! over WebSocket with a per-player token, submit movement and weapon
//! controls, and the server simulates the world at a fixed 30 Hz: maze
//! collision, projectiles, a rotating melee blade, coin collection, damage,
//! respawns and scoring. Game state is broadcast to every observer at a
//! tenth of the tick rate.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MAZE ARENA SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Pure primitives                           │
//! │  ├── point.rs    - 2D points and vector helpers              │
//! │  ├── collider.rs - Rect colliders + SAT intersection         │
//! │  └── codec.rs    - Little-endian wire codec                  │
//! │                                                              │
//! │  game/           - Simulation (no I/O)                       │
//! │  ├── map.rs      - Prim maze, walls, density grid, spawns    │
//! │  ├── player.rs   - Players, controls, movement, storage      │
//! │  ├── weapon.rs   - Cannon projectiles + rotating blade       │
//! │  ├── scorer.rs   - Coin lifecycle                            │
//! │  ├── state.rs    - Locked world + per-tick pipeline          │
//! │  └── round.rs    - Tick counter and stage transitions        │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── server.rs   - WebSocket listener + connection tasks     │
//! │  ├── broker.rs   - Registry + broadcast fan-out              │
//! │  ├── protocol.rs - Binary frame encode/decode                │
//! │  └── admin.rs    - HTTP admin surface                        │
//! │                                                              │
//! │  manager/        - Orchestration                             │
//! │  ├── auth.rs     - Tokens and user registry                  │
//! │  ├── score.rs    - Leaderboard + history pipeline            │
//! │  └── game.rs     - The 30 Hz game loop                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - The game loop never blocks on network I/O: all client traffic flows
//!   through bounded queues, and slow consumers are evicted.
//! - A token maps to at most one live connection; duplicates are refused
//!   with HTTP 401 at the upgrade.
//! - Player records survive disconnects; reconnecting with the same token
//!   resumes the same player, score and storage included.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod consts;
pub mod core;
pub mod game;
pub mod manager;
pub mod network;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::core::{Collider, Point, RectCollider};
pub use crate::game::{ArenaMap, GameState, Player, RoundManager, Weapon, World};
pub use crate::manager::{AuthManager, GameManager, ScoreManager};
pub use crate::network::{NetworkManager, WsServer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
