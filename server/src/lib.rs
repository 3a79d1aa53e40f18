//! # Arena Sync Server Library
//!
//! Authoritative UDP synchronization server for a shared multiplayer arena
//! of players, asteroids and bullets. The server's in-memory world is the
//! single source of truth; clients send text datagrams with their state and
//! actions, and receive full snapshot frames every tick.
//!
//! ## Architecture
//!
//! I/O and scheduling are decoupled. A dedicated receiver task pushes each
//! datagram into a bounded dispatch queue, a fixed pool of workers decodes
//! and applies messages, and a timer-driven scheduler runs asteroid
//! spawning, world integration, session sweeping and state broadcasts on
//! independent cadences. The components coordinate through channels; the
//! session directory and the world each live behind their own lock.
//!
//! ## Module Organization
//!
//! - [`dispatch`]: bounded datagram queue plus worker pool. A full queue
//!   drops the incoming datagram rather than blocking the receiver.
//! - [`sessions`]: endpoint-to-session directory with monotonic ids,
//!   source-address reconnection (most-recently-active wins) and an
//!   inactivity sweep. Scores arriving on the ordinary state path are
//!   max-aggregated; explicit score updates overwrite.
//! - [`world`]: asteroid and bullet lifecycles, including edge spawning
//!   aimed at the origin, dt-clamped integration, soft respawn at the
//!   world bounds, and bullet expiry.
//! - [`network`]: the UDP server itself, covering the receiver/sender
//!   tasks, datagram handling and the tick scheduler.
//!
//! ## Delivery model
//!
//! Everything is fire-and-forget: no retries, no acknowledgements, no
//! ordering guarantees. Every outbound frame is rebuilt in full each tick,
//! so a lost datagram is repaired by the next one.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use server::dispatch::DispatchConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::bind("0.0.0.0:8080", DispatchConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod dispatch;
pub mod network;
pub mod sessions;
pub mod world;
