//! # Arena Sync Client Library
//!
//! Client-side reconciliation counterpart to the authoritative server. The
//! client keeps a local mirror of the arena that stays smooth despite the
//! lossy, unordered transport, while preserving authority over entities it
//! created itself.
//!
//! ## Reconciliation model
//!
//! - **Remote entities** (asteroids, other players) are interpolated: each
//!   server update sets a new target and the rendered position blends
//!   toward it over a short fixed window. Jumps past a distance threshold
//!   snap immediately so edge respawns do not streak across the arena.
//! - **Locally-owned entities** (self-fired bullets, the local ship) are
//!   never overwritten or pruned by the server feed; the server's view
//!   catches up to them, not the other way around.
//! - **Player records** are replaced wholesale each state datagram.
//!
//! ## Module Organization
//!
//! - [`config`]: two-line server address file (address, then port), the
//!   only persisted configuration.
//! - [`mirror`]: the reconciled world mirror and interpolation logic.
//! - [`network`]: UDP socket handling, outbound state/action datagrams
//!   and the receive loop.
//!
//! Rendering and input capture are external collaborators; this library
//! only produces the reconciled state they consume.

pub mod config;
pub mod mirror;
pub mod network;
