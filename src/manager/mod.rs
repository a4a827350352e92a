//! Orchestration Managers
//!
//! Authentication, the score pipeline, and the game manager that drives the
//! tick loop.

pub mod auth;
pub mod game;
pub mod score;

pub use auth::{AuthError, AuthManager, MemoryUserStore, UserRecord, UserStore};
pub use game::GameManager;
pub use score::{
    Leaderboard, MemoryLeaderboard, MemoryScoreHistory, PlayerRank, ScoreHistory, ScoreManager,
    StoreError,
};
