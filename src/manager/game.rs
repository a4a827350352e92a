//! Game Manager
//!
//! Binds the simulation, round manager, broker and score pipeline together
//! and owns the 30 Hz tick loop. Each tick drains every player's inbound
//! queue, applies the latest action, runs the simulation step and the
//! respawn check, and updates the coin field. Every tenth tick one
//! game-state frame is broadcast and score deltas are pushed to the
//! leaderboard. A finished round broadcasts the end frame, persists scores
//! in the background and immediately restarts unless frozen.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::consts::TICKRATE;
use crate::game::round::RoundManager;
use crate::game::state::{GameState, PlayerScore};
use crate::manager::score::ScoreManager;
use crate::network::broker::NetworkManager;

/// The authoritative game orchestrator.
pub struct GameManager {
    state: Arc<GameState>,
    network: NetworkManager,
    scores: Arc<ScoreManager>,
    round: Mutex<RoundManager>,
}

impl GameManager {
    pub fn new(
        state: Arc<GameState>,
        network: NetworkManager,
        scores: Arc<ScoreManager>,
        round: RoundManager,
    ) -> Arc<Self> {
        Arc::new(Self {
            state,
            network,
            scores,
            round: Mutex::new(round),
        })
    }

    pub fn state(&self) -> &Arc<GameState> {
        &self.state
    }

    pub fn network(&self) -> &NetworkManager {
        &self.network
    }

    /// Start a round and spawn its tick loop. Does nothing while a round is
    /// running or the manager is frozen.
    pub fn start(self: &Arc<Self>) {
        if self.state.is_frozen() {
            info!("start suppressed: frozen");
            return;
        }

        match self.state.start() {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                error!("failed to start round: {e}");
                return;
            }
        }

        {
            let mut world = self.state.world_mut();
            let mut round = self.round.lock().unwrap_or_else(PoisonError::into_inner);
            round.restart(&mut world);
        }

        let manager = self.clone();
        tokio::spawn(async move {
            manager.game_loop().await;
        });
    }

    /// Toggle whether the next round may start.
    pub fn freeze(&self, freeze: bool) {
        self.state.set_freeze(freeze);
        info!(freeze, "freeze flag set");
    }

    /// Force lethal damage on a named player (admin surface).
    pub fn kill(&self, name: &str) {
        let mut world = self.state.world_mut();
        if let Some(player) = world.players.get_mut(name) {
            player.take_dmg(1_000_000);
            warn!(player = name, "killed by admin");
        }
    }

    async fn game_loop(self: Arc<Self>) {
        let interval_ms = 1000 / TICKRATE as u64;
        let timestep = interval_ms as f64 / 1000.0;

        // A fresh round starts with wiped bot storage.
        {
            let mut world = self.state.world_mut();
            for player in world.players.values_mut() {
                player.clear_storage();
            }
        }

        {
            let world = self.state.world();
            self.network.broadcast_game_start(&world);
        }

        let mut ticker = interval(Duration::from_millis(interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut count = 0u32;
        loop {
            ticker.tick().await;

            let mut ended = false;
            let mut frame: Option<(i32, i8)> = None;
            let mut deltas: Option<Vec<PlayerScore>> = None;

            {
                let mut world = self.state.world_mut();
                let mut round = self.round.lock().unwrap_or_else(PoisonError::into_inner);

                round.tick(&mut world);

                let players = world.player_names();
                for name in &players {
                    world.drain_actions(name);
                    world.update_player(name, timestep);
                    world.handle_respawn(name);
                }

                // The sole remaining coin being taken ends the round on the
                // spot, before any broadcast.
                if world.coins.update() {
                    ended = true;
                }

                if !ended {
                    count += 1;
                    if count == 10 {
                        count = 0;
                        frame = Some((round.current_tick(), round.current_round()));
                        deltas = Some(world.players_score());
                    }

                    if round.has_ended() {
                        ended = true;
                    }
                }
            }

            // Network and store work happen outside the world lock.
            if let Some((tick, round)) = frame {
                let world = self.state.world();
                self.network.broadcast_game_state(&world, tick, round);
            }
            if let Some(deltas) = deltas {
                self.scores.adds(&deltas);
            }

            if ended {
                self.state.stop();
                break;
            }
        }

        info!("round over");
        self.network.broadcast_game_end();

        let scores = self.scores.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = scores.persist() {
                error!("score persistence failed: {e}");
            }
        });

        // Roll straight into the next round (unless frozen).
        self.start();
    }
}

// =============================================================================
// TESTS
// =============================================================================
