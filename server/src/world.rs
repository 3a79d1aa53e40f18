//! Authoritative world state: asteroid and bullet lifecycles.
//!
//! Asteroids spawn on a world edge aimed at the origin, drift across the
//! arena, and are soft-respawned (identity preserved) when they leave the
//! bounds. Bullets are client-created and expire after a fixed lifetime.

use log::{debug, info};
use rand::Rng;
use shared::{
    AsteroidState, BulletState, ASTEROID_ACCELERATION, ASTEROID_MAX_SCALE, ASTEROID_MAX_SPEED,
    ASTEROID_MIN_SCALE, ASTEROID_MIN_SPEED, ASTEROID_SCALE_JITTER, BULLET_LIFETIME_SECS,
    MAX_ASTEROIDS, MAX_DT, WORLD_BOUND,
};
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct Asteroid {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub active: bool,
    pub spawned_at: Instant,
}

#[derive(Debug, Clone)]
pub struct Bullet {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub dir: f32,
    pub created_at: Instant,
}

/// Position on a random world edge plus a velocity aimed at the origin.
fn edge_spawn<R: Rng>(rng: &mut R) -> (f32, f32, f32, f32) {
    let offset = rng.gen_range(-WORLD_BOUND..WORLD_BOUND);
    let (x, y) = match rng.gen_range(0..4) {
        0 => (-WORLD_BOUND, offset),
        1 => (WORLD_BOUND, offset),
        2 => (offset, -WORLD_BOUND),
        _ => (offset, WORLD_BOUND),
    };

    let mag = (x * x + y * y).sqrt();
    let speed = rng.gen_range(ASTEROID_MIN_SPEED..ASTEROID_MAX_SPEED);
    // Unit vector toward the origin, scaled by the rolled speed.
    let vx = -x / mag * speed;
    let vy = -y / mag * speed;

    (x, y, vx, vy)
}

fn clamp_dt(dt: f32) -> f32 {
    dt.min(MAX_DT)
}

/// Owns the asteroid and bullet maps. One instance per server.
pub struct World {
    asteroids: HashMap<u32, Asteroid>,
    bullets: HashMap<String, Bullet>,
    next_asteroid_id: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            asteroids: HashMap::new(),
            bullets: HashMap::new(),
            next_asteroid_id: 1,
        }
    }

    /// Spawns one asteroid when under the active cap. Returns its id.
    pub fn spawn_asteroid(&mut self) -> Option<u32> {
        if self.asteroids.values().filter(|a| a.active).count() >= MAX_ASTEROIDS {
            return None;
        }

        let mut rng = rand::thread_rng();
        let (x, y, vx, vy) = edge_spawn(&mut rng);
        let base = rng.gen_range(ASTEROID_MIN_SCALE..ASTEROID_MAX_SCALE);
        let jitter = 1.0 - ASTEROID_SCALE_JITTER..1.0 + ASTEROID_SCALE_JITTER;
        let scale_x = base * rng.gen_range(jitter.clone());
        let scale_y = base * rng.gen_range(jitter);

        let id = self.next_asteroid_id;
        self.next_asteroid_id += 1;
        self.asteroids.insert(
            id,
            Asteroid {
                id,
                x,
                y,
                vx,
                vy,
                scale_x,
                scale_y,
                active: true,
                spawned_at: Instant::now(),
            },
        );
        info!("Spawned asteroid {} at ({:.1}, {:.1})", id, x, y);
        Some(id)
    }

    /// Advances all asteroids and relocates any that left the bounds.
    ///
    /// Relocation is a soft respawn: the asteroid keeps its id and map
    /// entry, only position and velocity are rerolled.
    pub fn update_asteroids(&mut self, dt: f32) {
        let dt = clamp_dt(dt);
        let mut rng = rand::thread_rng();

        for asteroid in self.asteroids.values_mut() {
            asteroid.x += asteroid.vx * dt * ASTEROID_ACCELERATION;
            asteroid.y += asteroid.vy * dt * ASTEROID_ACCELERATION;

            if asteroid.x.abs() > WORLD_BOUND || asteroid.y.abs() > WORLD_BOUND {
                let (x, y, vx, vy) = edge_spawn(&mut rng);
                asteroid.x = x;
                asteroid.y = y;
                asteroid.vx = vx;
                asteroid.vy = vy;
                debug!("Asteroid {} left bounds, respawned at ({:.1}, {:.1})", asteroid.id, x, y);
            }
        }
    }

    /// Advances all bullets and deletes the ones past their lifetime.
    pub fn update_bullets(&mut self, dt: f32) {
        let dt = clamp_dt(dt);
        for bullet in self.bullets.values_mut() {
            bullet.x += bullet.vx * dt;
            bullet.y += bullet.vy * dt;
        }
        self.bullets
            .retain(|_, b| b.created_at.elapsed().as_secs_f32() <= BULLET_LIFETIME_SECS);
    }

    /// Registers a client-created bullet. A repeated id overwrites.
    pub fn add_bullet(&mut self, id: String, x: f32, y: f32, vx: f32, vy: f32, dir: f32) {
        self.bullets.insert(
            id.clone(),
            Bullet {
                id,
                x,
                y,
                vx,
                vy,
                dir,
                created_at: Instant::now(),
            },
        );
    }

    /// Irreversible removal from the active set. Returns whether the id was
    /// live, so repeats are no-ops and trigger no second broadcast.
    pub fn destroy_asteroid(&mut self, id: u32) -> bool {
        match self.asteroids.remove(&id) {
            Some(_) => {
                info!("Destroyed asteroid {}", id);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every active asteroid for the `ASTEROIDS` frame.
    pub fn asteroid_states(&self) -> Vec<AsteroidState> {
        self.asteroids
            .values()
            .filter(|a| a.active)
            .map(|a| AsteroidState {
                id: a.id,
                x: a.x,
                y: a.y,
                vx: a.vx,
                vy: a.vy,
                scale_x: a.scale_x,
                scale_y: a.scale_y,
                active: a.active,
            })
            .collect()
    }

    /// Snapshot of every live bullet for the `BULLETS` frame.
    pub fn bullet_states(&self) -> Vec<BulletState> {
        self.bullets
            .values()
            .map(|b| BulletState {
                id: b.id.clone(),
                x: b.x,
                y: b.y,
                vx: b.vx,
                vy: b.vy,
                dir: b.dir,
            })
            .collect()
    }

    pub fn asteroid_count(&self) -> usize {
        self.asteroids.len()
    }

    pub fn bullet_count(&self) -> usize {
        self.bullets.len()
    }

    pub fn get_asteroid(&self, id: u32) -> Option<&Asteroid> {
        self.asteroids.get(&id)
    }
}
