//! Coins
//!
//! Score pickups. Small coins scatter across the map during discovery and
//! respawn wherever one is collected; the point-rush stage replaces them
//! with a single big coin at the maze centroid whose collection ends the
//! round.

use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::consts::{
    BIG_COIN_SIZE, BIG_COIN_VALUE, CELL_WIDTH, COIN_SIZE, COIN_VALUE, MAP_WIDTH,
};
use crate::core::codec::ByteWriter;
use crate::core::collider::RectCollider;
use crate::core::point::Point;

/// A collectible coin.
#[derive(Debug, Clone)]
pub struct Scorer {
    uuid: Uuid,
    pub position: Point,
    pub value: i32,
    collider: RectCollider,
    dead: bool,
}

impl Scorer {
    fn with(position: Point, size: f64, value: i32) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            value,
            collider: RectCollider::new_square(position.x, position.y, size),
            dead: false,
        }
    }

    /// A small coin at a random map coordinate.
    pub fn coin() -> Self {
        Self::coin_with(&mut rand::thread_rng())
    }

    /// Seedable variant of [`coin`](Self::coin).
    pub fn coin_with<R: Rng>(rng: &mut R) -> Self {
        let extent = MAP_WIDTH as f64 * CELL_WIDTH;
        Self::coin_at(Point::new(
            rng.gen::<f64>() * extent,
            rng.gen::<f64>() * extent,
        ))
    }

    /// A small coin at a fixed position.
    pub fn coin_at(position: Point) -> Self {
        Self::with(position, COIN_SIZE, COIN_VALUE)
    }

    /// The point-rush big coin, placed only at the map centroid.
    pub fn big_coin(center: Point) -> Self {
        Self::with(center, BIG_COIN_SIZE, BIG_COIN_VALUE)
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn collider(&self) -> &RectCollider {
        &self.collider
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    pub fn remove(&mut self) {
        self.dead = true;
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.write_bytes(self.uuid.as_bytes());
        self.position.encode(w);
        w.write_i32(self.value);
    }
}

/// The live coin collection.
#[derive(Debug, Clone, Default)]
pub struct Scorers {
    scorers: Vec<Scorer>,
}

impl Scorers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, scorers: Vec<Scorer>) {
        self.scorers = scorers;
    }

    pub fn add(&mut self, scorer: Scorer) {
        self.scorers.push(scorer);
    }

    pub fn list(&self) -> &[Scorer] {
        &self.scorers
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Scorer> {
        self.scorers.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.scorers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scorers.is_empty()
    }

    /// Replace collected coins with fresh ones. Returns true when the sole
    /// remaining coin was collected, which terminates the round.
    pub fn update(&mut self) -> bool {
        for i in 0..self.scorers.len() {
            if !self.scorers[i].is_alive() {
                if self.scorers.len() == 1 {
                    return true;
                }

                let replacement = Scorer::coin();
                debug!(at = %replacement.position, "coin respawned");
                self.scorers[i] = replacement;
            }
        }
        false
    }
}

// =============================================================================
// TESTS
// =============================================================================
