pub mod protocol;

pub use protocol::{AsteroidState, BulletState, ClientMessage, PlayerRecord, ServerFrame};

/// Coordinate magnitude at which an asteroid is relocated to a fresh edge.
pub const WORLD_BOUND: f32 = 600.0;

pub const ASTEROID_SPAWN_INTERVAL_SECS: f32 = 2.0;
pub const MAX_ASTEROIDS: usize = 8;
pub const ASTEROID_MIN_SPEED: f32 = 40.0;
pub const ASTEROID_MAX_SPEED: f32 = 120.0;
pub const ASTEROID_MIN_SCALE: f32 = 0.6;
pub const ASTEROID_MAX_SCALE: f32 = 1.8;
/// Independent x/y jitter applied to the base scale.
pub const ASTEROID_SCALE_JITTER: f32 = 0.2;
pub const ASTEROID_ACCELERATION: f32 = 1.5;

/// Update/broadcast tick interval in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 50;
/// Integration dt is clamped to this to bound error during stalls.
pub const MAX_DT: f32 = 0.1;

pub const BULLET_LIFETIME_SECS: f32 = 2.0;

pub const SESSION_TIMEOUT_SECS: u64 = 10;
pub const MATCH_DURATION_SECS: u64 = 180;

/// Window over which the client blends a mirrored entity toward its target.
pub const INTERP_WINDOW_MS: u64 = 100;
/// Target jumps larger than this snap instead of interpolating.
pub const SNAP_THRESHOLD: f32 = 100.0;
