//! Network Layer
//!
//! WebSocket transport, connection broker, wire protocol and the HTTP admin
//! surface. All game logic runs through `game/`; this layer only moves
//! frames.

pub mod admin;
pub mod broker;
pub mod client;
pub mod protocol;
pub mod server;

pub use broker::{ActiveTokens, NetworkManager};
pub use client::Client;
pub use protocol::{ClientMessage, GameStateFrame, MapStateFrame, MessageType, ProtocolError};
pub use server::{ServerError, WsServer, PING_PERIOD, PONG_WAIT, WRITE_WAIT};
