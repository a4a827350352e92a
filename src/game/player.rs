//! Players
//!
//! A player persists across disconnects under its nickname. The record keeps
//! position, health, score, the latest controls, both weapons, a respawn
//! timer and a 100-byte opaque storage buffer bots can use to survive their
//! own restarts.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::consts::{PLAYER_HEALTH, PLAYER_SIZE, PLAYER_SPEED, RESPAWN_TIME};
use crate::core::codec::ByteWriter;
use crate::core::collider::{Collider, RectCollider};
use crate::core::point::Point;
use crate::game::weapon::{Blade, Cannon};
use crate::network::client::Client;
use crate::network::protocol::ClientMessage;

/// Size of the opaque per-player storage buffer.
pub const STORAGE_SIZE: usize = 100;

/// Weapon selection as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Weapon {
    #[default]
    None = 0,
    Cannon = 1,
    Blade = 2,
}

impl TryFrom<u8> for Weapon {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Weapon::None),
            1 => Ok(Weapon::Cannon),
            2 => Ok(Weapon::Blade),
            other => Err(format!("unknown weapon id {other}")),
        }
    }
}

impl From<Weapon> for u8 {
    fn from(weapon: Weapon) -> u8 {
        weapon as u8
    }
}

/// The latest action payload received from the client.
///
/// Every field is optional; a new payload replaces the previous one wholesale.
/// One-shot fields (`save`, `shoot`, `rotate_blade`) are cleared as they are
/// consumed, while `dest` persists until overwritten.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Controls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dest: Option<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save: Option<String>,

    #[serde(default, rename = "switch", skip_serializing_if = "Option::is_none")]
    pub switch_weapon: Option<Weapon>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoot: Option<Point>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate_blade: Option<f64>,
}

/// One arena participant.
#[derive(Debug)]
pub struct Player {
    pub nickname: String,
    pub color: i32,
    pub client: Arc<Client>,
    pub position: Point,
    pub controls: Controls,

    collider: RectCollider,
    health: i32,
    score: i64,
    respawn_countdown: f64,
    pub(crate) current_weapon: Weapon,
    pub(crate) cannon: Cannon,
    pub(crate) blade: Blade,
    storage: [u8; STORAGE_SIZE],
    inbox: Option<mpsc::Receiver<ClientMessage>>,
}

impl Player {
    pub fn new(nickname: String, color: i32, client: Arc<Client>, position: Point) -> Self {
        Self {
            nickname,
            color,
            client,
            collider: RectCollider::new_square(position.x, position.y, PLAYER_SIZE),
            blade: Blade::new(position),
            position,
            controls: Controls::default(),
            health: PLAYER_HEALTH,
            score: 0,
            respawn_countdown: 0.0,
            current_weapon: Weapon::None,
            cannon: Cannon::new(),
            storage: [0; STORAGE_SIZE],
            inbox: None,
        }
    }

    pub fn collider(&self) -> &RectCollider {
        &self.collider
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn score(&self) -> i64 {
        self.score
    }

    pub fn add_score(&mut self, delta: i64) {
        self.score += delta;
    }

    pub fn reset_score(&mut self) {
        self.score = 0;
    }

    pub fn current_weapon(&self) -> Weapon {
        self.current_weapon
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    pub fn respawn_countdown(&self) -> f64 {
        self.respawn_countdown
    }

    /// Accrue respawn time while dead.
    pub fn tick_respawn(&mut self, dt: f64) {
        self.respawn_countdown += dt;
    }

    pub fn ready_to_respawn(&self) -> bool {
        !self.is_alive() && self.respawn_countdown > RESPAWN_TIME
    }

    /// Apply damage. Crossing the death threshold blinds the client so it
    /// stops receiving frames until respawn.
    pub fn take_dmg(&mut self, dmg: i32) {
        let was_alive = self.is_alive();
        self.health -= dmg;

        if self.health <= 0 && was_alive {
            self.client.set_blind(true);
        }
    }

    /// Teleport, keeping the collider glued to the body.
    pub fn set_position(&mut self, position: Point) {
        self.position = position;
        self.collider.change_position(position.x, position.y);
    }

    /// Return to play at the given spawn point with full health.
    pub fn respawn(&mut self, spawn: Point) {
        self.health = PLAYER_HEALTH;
        self.respawn_countdown = 0.0;
        self.set_position(spawn);
        self.blade.reset_rotation();
        self.client.set_blind(false);

        debug!(player = %self.nickname, at = %spawn, "respawned");
    }

    /// Step towards the current destination, rolling the move back if the
    /// tentative position clips any wall. Collisions are hard stops; there
    /// is no sliding.
    pub fn handle_movement(&mut self, walls: &[Collider], dt: f64) {
        if self.controls.dest.is_none() {
            return;
        }

        let (px, py) = (self.position.x, self.position.y);
        self.move_to_destination(dt);

        for wall in walls {
            if self.collider.intersects(wall.polygon()) {
                self.position = Point::new(px, py);
                self.collider.change_position(px, py);
                return;
            }
        }
    }

    fn move_to_destination(&mut self, dt: f64) {
        let Some(dest) = self.controls.dest else {
            return;
        };

        let dx = dest.x - self.position.x;
        let dy = dest.y - self.position.y;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist > PLAYER_SPEED * dt {
            let next_x = self.position.x + dx / dist * PLAYER_SPEED * dt;
            let next_y = self.position.y + dy / dist * PLAYER_SPEED * dt;
            self.position = Point::new(next_x, next_y);
            self.collider.change_position(next_x, next_y);
        }
    }

    /// Consume a pending `save` control: base64-decode and copy up to
    /// `STORAGE_SIZE` bytes into the storage buffer. Invalid payloads are
    /// left in place and never touch storage.
    pub fn handle_save(&mut self) {
        let Some(encoded) = &self.controls.save else {
            return;
        };

        if let Ok(bytes) = BASE64.decode(encoded) {
            let n = bytes.len().min(STORAGE_SIZE);
            self.storage[..n].copy_from_slice(&bytes[..n]);
            self.controls.save = None;
        }
    }

    pub fn storage(&self) -> [u8; STORAGE_SIZE] {
        self.storage
    }

    pub fn clear_storage(&mut self) {
        self.storage = [0; STORAGE_SIZE];
    }

    /// Attach the inbound queue of a (re)connected client.
    pub fn set_inbox(&mut self, inbox: mpsc::Receiver<ClientMessage>) {
        self.inbox = Some(inbox);
    }

    /// Non-blocking read of the next queued inbound message.
    pub fn try_recv(&mut self) -> Option<ClientMessage> {
        self.inbox.as_mut()?.try_recv().ok()
    }

    /// Encode this player's slice of a game-state frame.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.write_string(&self.nickname);
        w.write_i32(self.color);
        w.write_i32(self.health);
        w.write_i64(self.score);
        self.position.encode(w);

        match &self.controls.dest {
            Some(dest) => {
                w.write_bool(true);
                dest.encode(w);
            }
            None => w.write_bool(false),
        }

        w.write_u8(self.current_weapon as u8);

        w.write_i32(self.cannon.projectiles.len() as i32);
        for projectile in &self.cannon.projectiles {
            w.write_bytes(projectile.uuid.as_bytes());
            projectile.position.encode(w);
            projectile.destination.encode(w);
        }

        let (start, end) = self.blade.segment();
        start.encode(w);
        end.encode(w);
        w.write_f64(self.blade.rotation());
    }
}

// =============================================================================
// TESTS
// =============================================================================
