//! Round Management
//!
//! A round runs for `TICKS_PER_ROUND` ticks and moves through two stages:
//! discovery (coins scattered everywhere) and point rush (one big coin at
//! the maze centroid). Stage transitions are handlers registered against
//! the tick at which they fire.

use std::collections::HashMap;

use tracing::info;

use crate::consts::{NUM_COINS, TICKS_PER_ROUND, TICKS_POINT_RUSH};
use crate::game::scorer::Scorer;
use crate::game::state::World;

/// A stage transition applied to the world when its tick is reached.
pub trait StageHandler: Send + Sync {
    fn change_stage(&self, world: &mut World);
}

/// Tick counter plus the registered stage transitions.
pub struct RoundManager {
    ticks: u32,
    handlers: HashMap<u32, Box<dyn StageHandler>>,
}

impl Default for RoundManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoundManager {
    pub fn new() -> Self {
        Self {
            ticks: 0,
            handlers: HashMap::new(),
        }
    }

    /// The standard two-stage round.
    pub fn with_default_stages() -> Self {
        let mut rm = Self::new();
        rm.add_stage_handler(0, Box::new(DiscoveryStage));
        rm.add_stage_handler(TICKS_POINT_RUSH, Box::new(PointRushStage));
        rm
    }

    pub fn add_stage_handler(&mut self, tick: u32, handler: Box<dyn StageHandler>) {
        self.handlers.insert(tick, handler);
    }

    /// Reset the counter and fire the initial stage.
    pub fn restart(&mut self, world: &mut World) {
        self.ticks = 0;
        if let Some(handler) = self.handlers.get(&self.ticks) {
            handler.change_stage(world);
        }
    }

    /// Advance one tick, firing a stage handler when one is registered for
    /// the new tick value.
    pub fn tick(&mut self, world: &mut World) {
        self.ticks += 1;
        if let Some(handler) = self.handlers.get(&self.ticks) {
            handler.change_stage(world);
        }
    }

    /// Tick counter at broadcast resolution.
    pub fn current_tick(&self) -> i32 {
        (self.ticks / 10) as i32
    }

    /// 0 before point rush, 1 after.
    pub fn current_round(&self) -> i8 {
        if self.ticks < TICKS_POINT_RUSH {
            0
        } else {
            1
        }
    }

    pub fn has_ended(&self) -> bool {
        self.ticks == TICKS_PER_ROUND
    }
}

/// First stage: scatter `NUM_COINS` small coins and use the dense phase-0
/// spawn set.
pub struct DiscoveryStage;

impl StageHandler for DiscoveryStage {
    fn change_stage(&self, world: &mut World) {
        info!("entering discovery stage");

        let spawns = world.map.spawns(0).to_vec();
        world.set_spawns(spawns);

        let coins = (0..NUM_COINS).map(|_| Scorer::coin()).collect();
        world.reset(coins);
    }
}

/// Second stage: a single big coin at the centroid and the focused phase-1
/// spawn ring.
pub struct PointRushStage;

impl StageHandler for PointRushStage {
    fn change_stage(&self, world: &mut World) {
        info!("entering point rush stage");

        let spawns = world.map.spawns(1).to_vec();
        world.set_spawns(spawns);

        let centroid = world.map.centroid();
        world.reset(vec![Scorer::big_coin(centroid)]);
    }
}

// =============================================================================
// TESTS
// =============================================================================
