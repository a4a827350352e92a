//! Game Simulation
//!
//! Everything the tick loop mutates, free of any I/O.
//!
//! ## Module Structure
//!
//! - `map`: maze generation, wall colliders, density grid, spawn sets
//! - `player`: player lifecycle, controls, movement, storage
//! - `weapon`: cannon projectiles and the rotating blade
//! - `scorer`: coin lifecycle
//! - `state`: the locked world and per-tick pipeline
//! - `round`: tick counter and stage transitions

pub mod map;
pub mod player;
pub mod round;
pub mod scorer;
pub mod state;
pub mod weapon;

// Re-export key types
pub use map::{ArenaMap, MapError};
pub use player::{Controls, Player, Weapon};
pub use round::{DiscoveryStage, PointRushStage, RoundManager, StageHandler};
pub use scorer::{Scorer, Scorers};
pub use state::{GameState, PlayerScore, World};
