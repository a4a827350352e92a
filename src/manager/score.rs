//! Score Pipeline
//!
//! The game loop feeds per-player score deltas into a live leaderboard
//! every tenth tick; at round end the standings are snapshotted into a
//! per-player score history. Both stores are external collaborators behind
//! traits, with in-memory implementations for the binary and the tests.
//! Ranked reads are cached for a minute so the HTTP surface cannot hammer
//! the store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::game::state::PlayerScore;

/// How long a ranked read stays cached.
const RANK_CACHE_TTL: Duration = Duration::from_secs(60);

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerRank {
    #[serde(rename = "pos")]
    pub position: usize,
    pub name: String,
    pub score: f64,
}

/// One persisted score snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreEntry {
    pub score: f64,
    pub time: DateTime<Utc>,
}

/// Live sorted-score store.
pub trait Leaderboard: Send + Sync {
    fn increment(&self, name: &str, delta: f64) -> Result<(), StoreError>;
    /// Scores in descending order.
    fn ranked(&self) -> Result<Vec<(String, f64)>, StoreError>;
}

/// Historical score snapshots per player.
pub trait ScoreHistory: Send + Sync {
    fn push(&self, name: &str, entry: ScoreEntry) -> Result<(), StoreError>;
    fn histories(&self) -> Result<HashMap<String, Vec<ScoreEntry>>, StoreError>;
}

/// In-memory leaderboard.
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    scores: RwLock<HashMap<String, f64>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Leaderboard for MemoryLeaderboard {
    fn increment(&self, name: &str, delta: f64) -> Result<(), StoreError> {
        let mut scores = self
            .scores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *scores.entry(name.to_string()).or_insert(0.0) += delta;
        Ok(())
    }

    fn ranked(&self) -> Result<Vec<(String, f64)>, StoreError> {
        let scores = self.scores.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, f64)> =
            scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries)
    }
}

/// In-memory score history.
#[derive(Debug, Default)]
pub struct MemoryScoreHistory {
    entries: RwLock<HashMap<String, Vec<ScoreEntry>>>,
}

impl MemoryScoreHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScoreHistory for MemoryScoreHistory {
    fn push(&self, name: &str, entry: ScoreEntry) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(name.to_string())
            .or_default()
            .push(entry);
        Ok(())
    }

    fn histories(&self) -> Result<HashMap<String, Vec<ScoreEntry>>, StoreError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }
}

/// Score ingestion, ranking and persistence.
pub struct ScoreManager {
    leaderboard: Box<dyn Leaderboard>,
    history: Box<dyn ScoreHistory>,
    cache: Mutex<Option<(Instant, Vec<PlayerRank>)>>,
    visible: AtomicBool,
}

impl ScoreManager {
    pub fn new(leaderboard: Box<dyn Leaderboard>, history: Box<dyn ScoreHistory>) -> Self {
        Self {
            leaderboard,
            history,
            cache: Mutex::new(None),
            visible: AtomicBool::new(true),
        }
    }

    /// Feed a batch of per-tick score deltas into the leaderboard.
    pub fn adds(&self, scores: &[PlayerScore]) {
        for entry in scores {
            if entry.score == 0 {
                continue;
            }
            if let Err(e) = self.leaderboard.increment(&entry.name, entry.score as f64) {
                debug!(player = %entry.name, "leaderboard increment failed: {e}");
            }
        }
    }

    /// Current standings, cached for `RANK_CACHE_TTL`.
    pub fn rank(&self) -> Result<Vec<PlayerRank>, StoreError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((at, ranks)) = cache.as_ref() {
            if at.elapsed() < RANK_CACHE_TTL {
                return Ok(ranks.clone());
            }
        }

        let ranks: Vec<PlayerRank> = self
            .leaderboard
            .ranked()?
            .into_iter()
            .enumerate()
            .map(|(position, (name, score))| PlayerRank {
                position,
                name,
                score,
            })
            .collect();

        *cache = Some((Instant::now(), ranks.clone()));
        Ok(ranks)
    }

    /// Snapshot the standings into the history store. Runs as a background
    /// task at round end; failures are logged, never surfaced to clients.
    pub fn persist(&self) -> Result<(), StoreError> {
        let standings = self.leaderboard.ranked()?;
        let now = Utc::now();

        let mut persisted = 0;
        for (name, score) in standings {
            self.history.push(&name, ScoreEntry { score, time: now })?;
            persisted += 1;
        }

        info!(players = persisted, "scores persisted");
        Ok(())
    }

    /// Score histories for the leaderboard endpoint.
    pub fn histories(&self) -> Result<HashMap<String, Vec<ScoreEntry>>, StoreError> {
        self.history.histories()
    }

    pub fn toggle_visibility(&self) -> bool {
        // fetch_xor returns the previous value.
        !self.visible.fetch_xor(true, Ordering::Relaxed)
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Relaxed)
    }
}

// =============================================================================
// TESTS
// =============================================================================
