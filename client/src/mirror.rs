//! Client-side mirror of the server's world.
//!
//! Remote entities are keyed by id and interpolated toward the latest
//! server target; entities the client itself owns keep local authority and
//! are never overwritten by the server feed.

use log::{debug, info};
use shared::{
    AsteroidState, BulletState, PlayerRecord, ServerFrame, BULLET_LIFETIME_SECS, INTERP_WINDOW_MS,
    SNAP_THRESHOLD,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A mirrored asteroid. `state` holds the latest server target; the
/// rendered position blends from `prev` toward it over the interpolation
/// window, except that jumps past the snap threshold land immediately
/// (edge-respawn teleports must not be interpolated across the arena).
#[derive(Debug, Clone)]
pub struct RemoteAsteroid {
    pub state: AsteroidState,
    prev_x: f32,
    prev_y: f32,
    updated_at: Instant,
}

impl RemoteAsteroid {
    fn snapped(state: AsteroidState, now: Instant) -> Self {
        Self {
            prev_x: state.x,
            prev_y: state.y,
            state,
            updated_at: now,
        }
    }

    /// Rendered position at `now`: linear blend from the position held when
    /// the latest target arrived toward that target.
    pub fn position_at(&self, now: Instant) -> (f32, f32) {
        let window = Duration::from_millis(INTERP_WINDOW_MS).as_secs_f32();
        let elapsed = now.duration_since(self.updated_at).as_secs_f32();
        let alpha = (elapsed / window).clamp(0.0, 1.0);
        (
            self.prev_x + (self.state.x - self.prev_x) * alpha,
            self.prev_y + (self.state.y - self.prev_y) * alpha,
        )
    }
}

/// A mirrored bullet. Locally-owned entries (self-fired) are exempt from
/// server pruning and overwrites.
#[derive(Debug, Clone)]
pub struct MirrorBullet {
    pub state: BulletState,
    pub locally_owned: bool,
    created_at: Instant,
}

/// Local reconciled view of the arena.
pub struct WorldMirror {
    pub local_id: Option<u32>,
    asteroids: HashMap<u32, RemoteAsteroid>,
    bullets: HashMap<String, MirrorBullet>,
    players: HashMap<u32, PlayerRecord>,
    pub seconds_remaining: Option<u64>,
    pub server_closed: bool,
}

impl Default for WorldMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldMirror {
    pub fn new() -> Self {
        Self {
            local_id: None,
            asteroids: HashMap::new(),
            bullets: HashMap::new(),
            players: HashMap::new(),
            seconds_remaining: None,
            server_closed: false,
        }
    }

    /// Applies one decoded server frame to the mirror.
    pub fn apply_frame(&mut self, frame: ServerFrame) {
        let now = Instant::now();
        self.apply_frame_at(frame, now);
    }

    /// As [`apply_frame`](Self::apply_frame), with an explicit clock so
    /// interpolation is testable.
    pub fn apply_frame_at(&mut self, frame: ServerFrame, now: Instant) {
        match frame {
            ServerFrame::Asteroids(list) => {
                for state in list {
                    self.apply_asteroid(state, now);
                }
            }

            ServerFrame::Bullets(list) => {
                // Server-owned entries absent from the latest frame are
                // gone; locally-owned entries are never pruned by the feed.
                let listed: Vec<&String> = list.iter().map(|b| &b.id).collect();
                self.bullets
                    .retain(|id, b| b.locally_owned || listed.contains(&id));

                for state in list {
                    match self.bullets.get_mut(&state.id) {
                        Some(existing) if existing.locally_owned => {}
                        Some(existing) => existing.state = state,
                        None => {
                            self.bullets.insert(
                                state.id.clone(),
                                MirrorBullet {
                                    state,
                                    locally_owned: false,
                                    created_at: now,
                                },
                            );
                        }
                    }
                }
            }

            ServerFrame::Players(list) => {
                // Wholesale replacement; later lines for the same id
                // override earlier ones via insertion order.
                let mut players = HashMap::with_capacity(list.len());
                for record in list {
                    players.insert(record.id, record);
                }
                self.players = players;
            }

            ServerFrame::AsteroidDestroyed { id } => {
                self.asteroids.remove(&id);
            }

            ServerFrame::ScoreUpdate { id, score } => {
                if let Some(player) = self.players.get_mut(&id) {
                    player.score = score;
                }
            }

            ServerFrame::Time { seconds_remaining } => {
                self.seconds_remaining = Some(seconds_remaining);
            }

            ServerFrame::Welcome { id } => {
                info!("Assigned session id {}", id);
                self.local_id = Some(id);
            }

            ServerFrame::Shutdown => {
                info!("Server announced shutdown");
                self.server_closed = true;
            }
        }
    }

    fn apply_asteroid(&mut self, state: AsteroidState, now: Instant) {
        match self.asteroids.get_mut(&state.id) {
            None => {
                // First observation snaps straight to the target.
                self.asteroids
                    .insert(state.id, RemoteAsteroid::snapped(state, now));
            }
            Some(existing) => {
                let (render_x, render_y) = existing.position_at(now);
                let dx = state.x - render_x;
                let dy = state.y - render_y;
                if (dx * dx + dy * dy).sqrt() > SNAP_THRESHOLD {
                    debug!("Asteroid {} jumped, snapping", state.id);
                    *existing = RemoteAsteroid::snapped(state, now);
                } else {
                    existing.prev_x = render_x;
                    existing.prev_y = render_y;
                    existing.state = state;
                    existing.updated_at = now;
                }
            }
        }
    }

    /// Registers a self-fired bullet under local authority.
    pub fn register_local_bullet(&mut self, state: BulletState) {
        self.bullets.insert(
            state.id.clone(),
            MirrorBullet {
                state,
                locally_owned: true,
                created_at: Instant::now(),
            },
        );
    }

    /// Expires every mirrored bullet past the shared lifetime cap.
    ///
    /// Locally-owned entries are never pruned by the feed, and the server
    /// suppresses the `BULLETS` frame entirely once its last bullet dies,
    /// so this local clock is the only thing that removes either kind of
    /// leftover entry.
    pub fn expire_bullets(&mut self) {
        self.expire_bullets_at(Instant::now());
    }

    /// As [`expire_bullets`](Self::expire_bullets), with an explicit clock.
    pub fn expire_bullets_at(&mut self, now: Instant) {
        self.bullets.retain(|_, b| {
            now.duration_since(b.created_at).as_secs_f32() <= BULLET_LIFETIME_SECS
        });
    }

    pub fn asteroid(&self, id: u32) -> Option<&RemoteAsteroid> {
        self.asteroids.get(&id)
    }

    pub fn asteroids(&self) -> impl Iterator<Item = &RemoteAsteroid> {
        self.asteroids.values()
    }

    pub fn bullet(&self, id: &str) -> Option<&MirrorBullet> {
        self.bullets.get(id)
    }

    pub fn bullets(&self) -> impl Iterator<Item = &MirrorBullet> {
        self.bullets.values()
    }

    pub fn player(&self, id: u32) -> Option<&PlayerRecord> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerRecord> {
        self.players.values()
    }
}
