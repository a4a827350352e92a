//! Game State
//!
//! The mutable world lives behind a single reader-writer lock: the game loop
//! takes the write side once per tick, the frame encoder and connection
//! handlers take the read side in between. `in_progress` and `freeze` are
//! plain atomics queried from every layer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::collider::polygons_intersect;
use crate::core::point::Point;
use crate::game::map::{ArenaMap, MapError};
use crate::game::player::{Player, Weapon, STORAGE_SIZE};
use crate::game::scorer::{Scorer, Scorers};
use crate::network::client::Client;
use crate::network::protocol::ClientMessage;

/// A score delta reported to the leaderboard pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerScore {
    pub name: String,
    pub score: i64,
}

/// Everything the simulation mutates each tick.
#[derive(Debug, Default)]
pub struct World {
    pub map: ArenaMap,
    pub players: HashMap<String, Player>,
    pub coins: Scorers,
    spawns: Vec<Point>,
    spawn_index: usize,
    cached_scores: HashMap<String, i64>,
}

impl World {
    /// Next spawn point, round-robin over the current phase's shuffled set.
    pub fn next_spawn(&mut self) -> Point {
        if self.spawns.is_empty() {
            return Point::ZERO;
        }

        let spawn = self.spawns[self.spawn_index];
        self.spawn_index = (self.spawn_index + 1) % self.spawns.len();
        spawn
    }

    /// Install a new spawn set and restart the round-robin.
    pub fn set_spawns(&mut self, spawns: Vec<Point>) {
        self.spawn_index = 0;
        self.spawns = spawns;
    }

    /// Respawn every player and swap in a fresh coin collection. Used by the
    /// stage handlers when the round phase changes.
    pub fn reset(&mut self, coins: Vec<Scorer>) {
        let names: Vec<String> = self.players.keys().cloned().collect();
        for name in names {
            let spawn = self.next_spawn();
            if let Some(player) = self.players.get_mut(&name) {
                player.respawn(spawn);
            }
        }

        self.coins.set(coins);
    }

    /// Drain this player's inbound queue, keeping the latest action payload.
    pub fn drain_actions(&mut self, name: &str) {
        let Some(player) = self.players.get_mut(name) else {
            return;
        };

        while let Some(message) = player.try_recv() {
            if let ClientMessage::PlayerAction(controls) = message {
                player.controls = controls;
            }
        }
    }

    /// Run one simulation step for a player: respawn accrual while dead,
    /// otherwise movement, weapons, coin pickup and storage save.
    pub fn update_player(&mut self, name: &str, dt: f64) {
        let Some(player) = self.players.get_mut(name) else {
            return;
        };

        if !player.is_alive() {
            player.tick_respawn(dt);
            return;
        }

        player.handle_movement(self.map.colliders(), dt);

        self.update_weapons(name, dt);
        self.handle_coin_collision(name);

        if let Some(player) = self.players.get_mut(name) {
            player.handle_save();
        }
    }

    /// Weapon pass for one player.
    ///
    /// Both weapons are moved out of the owner for the duration of their
    /// update so they can damage other players through the map; the score
    /// they earn is credited once they are back in place.
    fn update_weapons(&mut self, name: &str, dt: f64) {
        let Some(player) = self.players.get_mut(name) else {
            return;
        };

        let pivot = player.position;
        let switching = player.controls.switch_weapon;
        let rotate = player.controls.rotate_blade;
        let blade_active = switching.is_none() && player.current_weapon == Weapon::Blade;

        let mut cannon = std::mem::take(&mut player.cannon);
        let mut blade = std::mem::take(&mut player.blade);

        let mut earned = cannon.update(name, &mut self.players, dt);
        earned += blade.update(
            name,
            pivot,
            &mut self.players,
            if blade_active { rotate } else { None },
        );

        let Some(player) = self.players.get_mut(name) else {
            return;
        };
        player.cannon = cannon;
        player.blade = blade;
        player.add_score(earned);

        if let Some(weapon) = switching {
            player.current_weapon = weapon;
            return;
        }

        if player.current_weapon == Weapon::Cannon {
            if let Some(target) = player.controls.shoot.take() {
                let origin = player.position;
                player.cannon.shoot_at(origin, target);
            }
        }

        player.controls.rotate_blade = None;
    }

    /// Award any coin the player's collider overlaps and mark it collected.
    fn handle_coin_collision(&mut self, name: &str) {
        let Some(player) = self.players.get_mut(name) else {
            return;
        };
        if !player.is_alive() {
            return;
        }

        for coin in self.coins.iter_mut() {
            if !coin.is_alive() {
                continue;
            }

            if polygons_intersect(coin.collider().corners(), player.collider().corners()) {
                player.add_score(coin.value as i64);
                coin.remove();

                debug!(
                    player = %player.nickname,
                    value = coin.value,
                    total = player.score(),
                    "coin collected"
                );
            }
        }
    }

    /// Move an overdue dead player back into play.
    pub fn handle_respawn(&mut self, name: &str) {
        let ready = self.players.get(name).is_some_and(Player::ready_to_respawn);
        if !ready {
            return;
        }

        let spawn = self.next_spawn();
        if let Some(player) = self.players.get_mut(name) {
            player.respawn(spawn);
        }
    }

    /// Per-player score deltas since the previous call, updating the cached
    /// baselines. Baselines are cleared at game start, so within a round a
    /// delta can never be negative.
    pub fn players_score(&mut self) -> Vec<PlayerScore> {
        let mut scores = Vec::with_capacity(self.players.len());
        for player in self.players.values() {
            let baseline = self
                .cached_scores
                .get(&player.nickname)
                .copied()
                .unwrap_or(0);
            scores.push(PlayerScore {
                name: player.nickname.clone(),
                score: player.score() - baseline,
            });
        }
        for player in self.players.values() {
            self.cached_scores
                .insert(player.nickname.clone(), player.score());
        }
        scores
    }

    pub fn clear_score_baselines(&mut self) {
        self.cached_scores.clear();
    }

    pub fn player_names(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }
}

/// Shared game state.
#[derive(Debug, Default)]
pub struct GameState {
    inner: RwLock<World>,
    in_progress: AtomicBool,
    freeze: AtomicBool,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn world(&self) -> RwLockReadGuard<'_, World> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn world_mut(&self) -> RwLockWriteGuard<'_, World> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Relaxed)
    }

    pub fn is_frozen(&self) -> bool {
        self.freeze.load(Ordering::Relaxed)
    }

    /// Freeze prevents the next round from starting; it never interrupts a
    /// running round.
    pub fn set_freeze(&self, freeze: bool) {
        self.freeze.store(freeze, Ordering::Relaxed);
    }

    /// Begin a round: regenerate the maze, arm the discovery spawn set and
    /// zero all scores. Returns false when a round is already running, so
    /// exactly one caller wins a concurrent start.
    pub fn start(&self) -> Result<bool, MapError> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let mut world = self.world_mut();
        if let Err(e) = world.map.setup() {
            self.in_progress.store(false, Ordering::SeqCst);
            return Err(e);
        }
        let spawns = world.map.spawns(0).to_vec();
        world.set_spawns(spawns);

        for player in world.players.values_mut() {
            player.reset_score();
        }
        world.clear_score_baselines();

        info!("game state started");
        Ok(true)
    }

    pub fn stop(&self) {
        self.in_progress.store(false, Ordering::Relaxed);
    }

    /// Register a (re)connecting player. An existing record keeps its score,
    /// storage and life state; only the connection moves over. Returns the
    /// player's storage for the mid-round map-state frame.
    pub fn add_player(
        &self,
        username: &str,
        color: i32,
        client: Arc<Client>,
        inbox: mpsc::Receiver<ClientMessage>,
    ) -> [u8; STORAGE_SIZE] {
        let mut world = self.world_mut();

        if let Some(player) = world.players.get_mut(username) {
            // Blindness follows the player, not the socket.
            client.set_blind(player.client.is_blind());
            player.client = client;
            player.set_inbox(inbox);
            debug!(player = username, "player reconnected");
            return player.storage();
        }

        let spawn = if self.in_progress() {
            world.next_spawn()
        } else {
            Point::ZERO
        };

        let mut player = Player::new(username.to_string(), color, client, spawn);
        player.set_inbox(inbox);
        let storage = player.storage();
        world.players.insert(username.to_string(), player);

        info!(player = username, "player joined");
        storage
    }

    /// Evict a player record entirely. Disconnects do not call this; only
    /// explicit eviction does.
    pub fn remove_player(&self, username: &str) {
        self.world_mut().players.remove(username);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{
        COIN_VALUE, PLAYER_SPEED, PROJECTILE_DMG, SCORE_ON_HIT_WITH_PROJECTILE,
    };

    fn add_test_player(state: &GameState, name: &str, x: f64, y: f64) {
        let player = Player::new(name.to_string(), 0, Client::detached(), Point::new(x, y));
        state.world_mut().players.insert(name.to_string(), player);
    }

    #[test]
    fn test_round_robin_spawns() {
        let state = GameState::new();
        let mut world = state.world_mut();
        world.set_spawns(vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);

        assert_eq!(world.next_spawn(), Point::new(1.0, 1.0));
        assert_eq!(world.next_spawn(), Point::new(2.0, 2.0));
        assert_eq!(world.next_spawn(), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_empty_spawns_fall_back_to_origin() {
        let state = GameState::new();
        assert_eq!(state.world_mut().next_spawn(), Point::ZERO);
    }

    #[test]
    fn test_player_persists_across_reconnect() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);

        {
            let mut world = state.world_mut();
            world.players.get_mut("alice").unwrap().add_score(120);
        }

        let (_tx, rx) = mpsc::channel(4);
        state.add_player("alice", 0, Client::detached(), rx);

        let world = state.world();
        assert_eq!(world.players.len(), 1);
        assert_eq!(world.players["alice"].score(), 120);
    }

    #[test]
    fn test_blind_follows_reconnect() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);

        state
            .world_mut()
            .players
            .get_mut("alice")
            .unwrap()
            .take_dmg(1_000);

        let (replacement, _rx_bytes, _sd) = Client::new("token".to_string(), false);
        let (_tx, rx) = mpsc::channel(4);
        state.add_player("alice", 0, replacement.clone(), rx);

        assert!(replacement.is_blind());
    }

    #[test]
    fn test_movement_applies_during_update() {
        let state = GameState::new();
        add_test_player(&state, "alice", 0.0, 0.0);

        let mut world = state.world_mut();
        world.players.get_mut("alice").unwrap().controls.dest = Some(Point::new(10.0, 0.0));
        world.update_player("alice", 1.0);

        let x = world.players["alice"].position.x;
        assert!((x - PLAYER_SPEED).abs() < 1e-9);
    }

    #[test]
    fn test_coin_pickup_awards_score() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);

        {
            let mut world = state.world_mut();
            world.coins.set(vec![
                Scorer::coin_at(Point::new(5.0, 5.0)),
                Scorer::coin_at(Point::new(80.0, 80.0)),
            ]);
        }

        let mut world = state.world_mut();
        world.update_player("alice", 1.0 / 30.0);

        assert_eq!(world.players["alice"].score(), COIN_VALUE as i64);
        assert_eq!(world.coins.list().iter().filter(|c| c.is_alive()).count(), 1);
    }

    #[test]
    fn test_contested_coin_is_awarded_once() {
        // Both players overlap the coin, but sit outside each other's blade
        // sweep so no combat score muddies the tally.
        let state = GameState::new();
        add_test_player(&state, "alice", 4.4, 4.5);
        add_test_player(&state, "bob", 4.4, 5.6);

        {
            let mut world = state.world_mut();
            world.coins.set(vec![Scorer::coin_at(Point::new(5.0, 5.0))]);
        }

        let mut world = state.world_mut();
        world.update_player("alice", 1.0 / 30.0);
        world.update_player("bob", 1.0 / 30.0);

        let total = world.players["alice"].score() + world.players["bob"].score();
        assert_eq!(total, COIN_VALUE as i64);
    }

    #[test]
    fn test_dead_player_only_accrues_countdown() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);

        let mut world = state.world_mut();
        let player = world.players.get_mut("alice").unwrap();
        player.take_dmg(1_000);
        player.controls.dest = Some(Point::new(50.0, 50.0));

        world.update_player("alice", 1.0);

        let player = &world.players["alice"];
        assert_eq!(player.position, Point::new(5.0, 5.0));
        assert_eq!(player.respawn_countdown(), 1.0);
    }

    #[test]
    fn test_weapon_switch_defers_shot() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);

        {
            let mut world = state.world_mut();
            let player = world.players.get_mut("alice").unwrap();
            player.controls.switch_weapon = Some(Weapon::Cannon);
            player.controls.shoot = Some(Point::new(9.0, 9.0));
            world.update_player("alice", 1.0 / 30.0);
        }

        // The switch consumed the tick; the shot stays queued.
        {
            let world = state.world();
            let player = &world.players["alice"];
            assert_eq!(player.current_weapon(), Weapon::Cannon);
            assert!(player.cannon.projectiles.is_empty());
        }

        // The next payload without a switch releases the shot.
        {
            let mut world = state.world_mut();
            let player = world.players.get_mut("alice").unwrap();
            player.controls.switch_weapon = None;
            world.update_player("alice", 1.0 / 30.0);
            assert_eq!(world.players["alice"].cannon.projectiles.len(), 1);
        }
    }

    #[test]
    fn test_projectile_kill_pipeline() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);
        add_test_player(&state, "bob", 5.0, 6.0);

        let mut world = state.world_mut();
        let alice = world.players.get_mut("alice").unwrap();
        alice.controls.switch_weapon = Some(Weapon::Cannon);
        world.update_player("alice", 1.0 / 30.0);

        let alice = world.players.get_mut("alice").unwrap();
        alice.controls.switch_weapon = None;
        alice.controls.shoot = Some(Point::new(5.0, 6.0));
        world.update_player("alice", 1.0 / 30.0);

        // Let the projectile cover the single unit of distance.
        for _ in 0..30 {
            world.update_player("alice", 1.0 / 30.0);
        }

        assert_eq!(world.players["bob"].health(), 100 - PROJECTILE_DMG);
        assert_eq!(
            world.players["alice"].score(),
            SCORE_ON_HIT_WITH_PROJECTILE as i64
        );
    }

    #[test]
    fn test_score_deltas_accumulate_against_baseline() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);

        let mut world = state.world_mut();
        world.players.get_mut("alice").unwrap().add_score(40);
        let first = world.players_score();
        assert_eq!(
            first,
            vec![PlayerScore {
                name: "alice".into(),
                score: 40
            }]
        );

        let second = world.players_score();
        assert_eq!(second[0].score, 0);

        world.players.get_mut("alice").unwrap().add_score(15);
        let third = world.players_score();
        assert_eq!(third[0].score, 15);
    }

    #[test]
    fn test_start_resets_scores_and_baselines() {
        let state = GameState::new();
        add_test_player(&state, "alice", 5.0, 5.0);
        state
            .world_mut()
            .players
            .get_mut("alice")
            .unwrap()
            .add_score(500);

        assert!(state.start().expect("start"));
        assert!(!state.start().expect("second start is a no-op"));

        assert!(state.in_progress());
        let mut world = state.world_mut();
        assert_eq!(world.players["alice"].score(), 0);
        assert_eq!(world.players_score()[0].score, 0);
    }
}
