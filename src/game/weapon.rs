//! Weapons
//!
//! Two weapons exist: the cannon fires projectiles that fly in a straight
//! line to a destination, and the blade is a thin rectangle anchored at its
//! owner's pivot, rotated by client-supplied deltas.
//!
//! Weapons do not hold a reference to their owner. The owner's nickname and
//! pivot are passed into each update, and the score earned is returned for
//! the caller to credit, which keeps the ownership graph acyclic.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use crate::consts::{
    BLADE_DMG, BLADE_SIZE, PLAYER_SIZE, PROJECTILE_DMG, PROJECTILE_SIZE, PROJECTILE_SPEED,
    PROJECTILE_TTL, SCORE_ON_HIT_WITH_BLADE, SCORE_ON_HIT_WITH_PROJECTILE,
};
use crate::core::collider::{polygons_intersect, RectCollider};
use crate::core::point::Point;
use crate::game::player::Player;

/// A cannon shot in flight.
#[derive(Debug, Clone)]
pub struct Projectile {
    pub uuid: Uuid,
    pub position: Point,
    pub destination: Point,
    ttl: f64,
    collider: RectCollider,
    dead: bool,
}

impl Projectile {
    pub fn new(position: Point, destination: Point) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            position,
            destination,
            ttl: PROJECTILE_TTL,
            collider: RectCollider::new_square(position.x, position.y, PROJECTILE_SIZE),
            dead: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        !self.dead
    }

    pub fn remove(&mut self) {
        self.dead = true;
    }

    fn reduce_ttl(&mut self, dt: f64) {
        self.ttl -= dt;
        if self.ttl <= 0.0 {
            self.remove();
        }
    }

    /// Fly towards the destination, clamping on arrival (which retires the
    /// projectile). Projectiles ignore walls.
    fn advance(&mut self, dt: f64) {
        let dx = self.destination.x - self.position.x;
        let dy = self.destination.y - self.position.y;
        let dist = (dx * dx + dy * dy).sqrt();

        if dist > PROJECTILE_SPEED * dt {
            let next_x = self.position.x + dx / dist * PROJECTILE_SPEED * dt;
            let next_y = self.position.y + dy / dist * PROJECTILE_SPEED * dt;
            self.position = Point::new(next_x, next_y);
            self.collider.change_position(next_x, next_y);
        } else {
            self.position = self.destination;
            self.collider
                .change_position(self.destination.x, self.destination.y);
            self.remove();
        }
    }
}

/// Projectile launcher owned by a player.
#[derive(Debug, Clone, Default)]
pub struct Cannon {
    pub projectiles: Vec<Projectile>,
}

impl Cannon {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a projectile at `origin` aimed at `target`.
    pub fn shoot_at(&mut self, origin: Point, target: Point) {
        self.projectiles.push(Projectile::new(origin, target));
    }

    /// Advance every projectile and apply damage to living enemies hit this
    /// tick. Returns the score earned by the owner.
    pub fn update(&mut self, owner: &str, players: &mut HashMap<String, Player>, dt: f64) -> i64 {
        let mut score = 0i64;

        for projectile in &mut self.projectiles {
            projectile.reduce_ttl(dt);
            projectile.advance(dt);

            for enemy in players.values_mut() {
                if enemy.nickname == owner || !enemy.is_alive() {
                    continue;
                }

                if projectile
                    .collider
                    .intersects(enemy.collider().corners())
                {
                    enemy.take_dmg(PROJECTILE_DMG);
                    score += SCORE_ON_HIT_WITH_PROJECTILE as i64;
                    projectile.remove();

                    debug!(owner, target = %enemy.nickname, "projectile hit");
                }
            }
        }

        self.projectiles.retain(Projectile::is_alive);
        score
    }
}

/// Rotating melee blade anchored at its owner's pivot.
#[derive(Debug, Clone)]
pub struct Blade {
    collider: RectCollider,
}

impl Default for Blade {
    fn default() -> Self {
        Self::new(Point::ZERO)
    }
}

impl Blade {
    pub fn new(pivot: Point) -> Self {
        let mut collider =
            RectCollider::new_line(pivot.x, pivot.y, BLADE_SIZE, PLAYER_SIZE / 4.0);
        collider.set_pivot(pivot.x, pivot.y);
        Self { collider }
    }

    /// Follow the owner's pivot, apply this tick's rotation delta if any,
    /// then damage every living enemy the blade overlaps. Returns the score
    /// earned by the owner.
    pub fn update(
        &mut self,
        owner: &str,
        pivot: Point,
        players: &mut HashMap<String, Player>,
        rotation: Option<f64>,
    ) -> i64 {
        self.collider.change_position(pivot.x, pivot.y);

        if let Some(theta) = rotation {
            self.collider.rotate(theta);
        }

        let mut score = 0i64;
        for enemy in players.values_mut() {
            if enemy.nickname == owner || !enemy.is_alive() {
                continue;
            }

            if polygons_intersect(self.collider.corners(), enemy.collider().corners()) {
                enemy.take_dmg(BLADE_DMG);
                score += SCORE_ON_HIT_WITH_BLADE as i64;

                debug!(owner, target = %enemy.nickname, "blade hit");
            }
        }

        score
    }

    /// Blade segment endpoints as encoded on the wire.
    pub fn segment(&self) -> (Point, Point) {
        (self.collider.corners()[0], self.collider.corners()[1])
    }

    pub fn rotation(&self) -> f64 {
        self.collider.rotation
    }

    /// Reset the accumulated orientation, used on respawn.
    pub fn reset_rotation(&mut self) {
        self.collider.rotation = 0.0;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::client::Client;

    fn player(name: &str, x: f64, y: f64) -> Player {
        Player::new(name.to_string(), 0, Client::detached(), Point::new(x, y))
    }

    fn players(entries: Vec<Player>) -> HashMap<String, Player> {
        entries
            .into_iter()
            .map(|p| (p.nickname.clone(), p))
            .collect()
    }

    #[test]
    fn test_cannon_shoot_towards_positive_destination() {
        let mut cannon = Cannon::new();
        cannon.shoot_at(Point::new(5.0, 5.0), Point::new(10.0, 10.0));
        cannon.update("owner", &mut HashMap::new(), 1.0);

        let step = PROJECTILE_SPEED / 2.0_f64.sqrt();
        let pos = cannon.projectiles[0].position;
        assert!((pos.x - (5.0 + step)).abs() < 1e-4);
        assert!((pos.y - (5.0 + step)).abs() < 1e-4);
    }

    #[test]
    fn test_cannon_shoot_towards_negative_destination() {
        let mut cannon = Cannon::new();
        cannon.shoot_at(Point::new(5.0, 5.0), Point::new(-10.0, -10.0));
        cannon.update("owner", &mut HashMap::new(), 1.0);

        let step = PROJECTILE_SPEED / 2.0_f64.sqrt();
        let pos = cannon.projectiles[0].position;
        assert!((pos.x - (5.0 - step)).abs() < 1e-4);
        assert!((pos.y - (5.0 - step)).abs() < 1e-4);
    }

    #[test]
    fn test_projectile_hits_single_enemy() {
        let mut cannon = Cannon::new();
        let mut enemies = players(vec![player("enemy0", 5.0, 5.0)]);

        cannon.shoot_at(Point::ZERO, Point::new(5.0, 5.0));
        let mut dt = 0.3;
        let mut score = 0;
        while dt < 2.0 {
            score += cannon.update("owner", &mut enemies, dt);
            dt += 0.3;
        }

        assert_eq!(enemies["enemy0"].health(), 100 - PROJECTILE_DMG);
        assert_eq!(score, SCORE_ON_HIT_WITH_PROJECTILE as i64);
        assert!(cannon.projectiles.is_empty());
    }

    #[test]
    fn test_projectile_spares_bystander() {
        let mut cannon = Cannon::new();
        let mut enemies = players(vec![player("enemy0", 5.0, 5.0), player("enemy1", 6.0, 5.0)]);

        cannon.shoot_at(Point::ZERO, Point::new(5.0, 5.0));
        let mut dt = 0.3;
        while dt < 2.0 {
            cannon.update("owner", &mut enemies, dt);
            dt += 0.3;
        }

        assert_eq!(enemies["enemy0"].health(), 100 - PROJECTILE_DMG);
        assert_eq!(enemies["enemy1"].health(), 100);
    }

    #[test]
    fn test_projectile_misses_out_of_range_enemy() {
        let mut cannon = Cannon::new();
        let mut enemies = players(vec![player("enemy0", 100.0, 100.0)]);

        cannon.shoot_at(Point::ZERO, Point::new(5.0, 5.0));
        let mut dt = 0.3;
        while dt < 2.0 {
            cannon.update("owner", &mut enemies, dt);
            dt += 0.3;
        }

        assert_eq!(enemies["enemy0"].health(), 100);
        assert!(cannon.projectiles.is_empty());
    }

    #[test]
    fn test_projectile_times_out_before_target() {
        let mut cannon = Cannon::new();
        let reach = PROJECTILE_SPEED * (PROJECTILE_TTL + 0.3);
        let mut enemies = players(vec![player("enemy0", reach, reach)]);

        cannon.shoot_at(Point::ZERO, Point::new(1000.0, 1000.0));
        let mut dt = 0.3;
        while dt < 2.0 {
            cannon.update("owner", &mut enemies, dt);
            dt += 0.3;
        }

        assert_eq!(enemies["enemy0"].health(), 100);
        assert!(cannon.projectiles.is_empty());
    }

    #[test]
    fn test_projectile_never_outlives_ttl() {
        let mut cannon = Cannon::new();
        cannon.shoot_at(Point::ZERO, Point::new(1e6, 1e6));

        let dt = 1.0 / 30.0;
        let max_ticks = (PROJECTILE_TTL / dt).ceil() as usize;
        for _ in 0..max_ticks {
            cannon.update("owner", &mut HashMap::new(), dt);
        }

        assert!(cannon.projectiles.is_empty());
    }

    #[test]
    fn test_blade_hits_adjacent_player() {
        let mut blade = Blade::new(Point::ZERO);
        let mut enemies = players(vec![player("enemy", 1.0, 0.0)]);

        let score = blade.update("owner", Point::ZERO, &mut enemies, Some(0.0));

        assert_eq!(enemies["enemy"].health(), 100 - BLADE_DMG);
        assert_eq!(score, SCORE_ON_HIT_WITH_BLADE as i64);
    }

    #[test]
    fn test_blade_rotates_into_player() {
        let mut blade = Blade::new(Point::ZERO);
        let mut enemies = players(vec![player("enemy", 0.0, 1.0)]);

        blade.update(
            "owner",
            Point::ZERO,
            &mut enemies,
            Some(std::f64::consts::FRAC_PI_2),
        );

        assert_eq!(enemies["enemy"].health(), 100 - BLADE_DMG);
    }

    #[test]
    fn test_blade_rotates_away_from_player() {
        let mut blade = Blade::new(Point::ZERO);
        let mut enemies = players(vec![player("enemy", 1.0, 0.0)]);

        blade.update(
            "owner",
            Point::ZERO,
            &mut enemies,
            Some(std::f64::consts::FRAC_PI_2),
        );

        assert_eq!(enemies["enemy"].health(), 100);
    }

    #[test]
    fn test_blade_hits_overlapping_players() {
        let mut blade = Blade::new(Point::ZERO);
        let mut enemies = players(vec![player("enemy0", 0.0, 1.0), player("enemy1", 0.0, 1.0)]);

        blade.update(
            "owner",
            Point::ZERO,
            &mut enemies,
            Some(std::f64::consts::FRAC_PI_2),
        );

        assert_eq!(enemies["enemy0"].health(), 100 - BLADE_DMG);
        assert_eq!(enemies["enemy1"].health(), 100 - BLADE_DMG);
    }

    #[test]
    fn test_blade_skips_owner_and_dead() {
        let mut blade = Blade::new(Point::ZERO);
        let mut dead = player("enemy", 1.0, 0.0);
        dead.take_dmg(1_000);
        let mut field = players(vec![player("owner", 0.0, 0.0), dead]);

        let score = blade.update("owner", Point::ZERO, &mut field, Some(0.0));

        assert_eq!(score, 0);
        assert_eq!(field["owner"].health(), 100);
    }

    #[test]
    fn test_blade_stays_without_rotation_input() {
        let mut blade = Blade::new(Point::ZERO);
        blade.update(
            "owner",
            Point::ZERO,
            &mut HashMap::new(),
            Some(std::f64::consts::FRAC_PI_2),
        );
        let rotation = blade.rotation();

        blade.update("owner", Point::new(3.0, 3.0), &mut HashMap::new(), None);
        assert_eq!(blade.rotation(), rotation);
        assert_eq!(blade.collider.pivot, Point::new(3.0, 3.0));
    }
}
