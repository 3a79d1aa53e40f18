//! Session directory: maps network endpoints to player sessions and
//! resolves reconnections by source address.
//!
//! Ids are monotonic and never reused. A secondary source-address index is
//! maintained incrementally so reconnection resolution does not scan the
//! whole directory. When several stale sessions share a source address the
//! most-recently-active one wins and the rest are purged.

use log::info;
use shared::PlayerRecord;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

/// Server-side record for one connected client endpoint.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: u32,
    pub endpoint: SocketAddr,
    pub source_ip: IpAddr,
    /// Last reported transform.
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub score: i32,
    pub last_seen: Instant,
}

impl Session {
    fn new(id: u32, endpoint: SocketAddr, score: i32) -> Self {
        Self {
            id,
            endpoint,
            source_ip: endpoint.ip(),
            x: 0.0,
            y: 0.0,
            rot: 0.0,
            score,
            last_seen: Instant::now(),
        }
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Outcome of resolving a datagram's sender to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Exact endpoint already known.
    Existing(u32),
    /// New endpoint, but a resident session shared the source address; its
    /// id (and the max of the scores) was carried over.
    Reconnected(u32),
    /// Unseen endpoint and address; a fresh id was allocated. The caller
    /// must unicast the identity frame before any broadcast includes it.
    Created(u32),
}

/// All live sessions, keyed by endpoint, with a source-address index.
pub struct SessionDirectory {
    sessions: HashMap<SocketAddr, Session>,
    by_source: HashMap<IpAddr, Vec<SocketAddr>>,
    next_id: u32,
}

impl Default for SessionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self {
            sessions: HashMap::new(),
            by_source: HashMap::new(),
            next_id: 1,
        }
    }

    /// Resolves a sender endpoint to a session, creating or reconnecting as
    /// needed. `score_hint` is the score carried by the current datagram.
    pub fn resolve(&mut self, endpoint: SocketAddr, score_hint: i32) -> Resolution {
        if let Some(session) = self.sessions.get_mut(&endpoint) {
            session.last_seen = Instant::now();
            return Resolution::Existing(session.id);
        }

        let source_ip = endpoint.ip();
        if let Some(candidates) = self.by_source.get(&source_ip) {
            // Reconnection from a new port or process: most-recently-active
            // resident session wins.
            let winner = candidates
                .iter()
                .filter_map(|ep| self.sessions.get(ep))
                .max_by_key(|s| s.last_seen)
                .map(|s| (s.id, s.score));

            if let Some((id, stored_score)) = winner {
                let stale: Vec<SocketAddr> =
                    self.by_source.remove(&source_ip).unwrap_or_default();
                for ep in stale {
                    self.sessions.remove(&ep);
                }

                let mut session = Session::new(id, endpoint, stored_score.max(score_hint));
                session.last_seen = Instant::now();
                info!(
                    "Session {} reconnected from {} (score {})",
                    id, endpoint, session.score
                );
                self.insert(session);
                return Resolution::Reconnected(id);
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        info!("Session {} created for {}", id, endpoint);
        self.insert(Session::new(id, endpoint, score_hint));
        Resolution::Created(id)
    }

    fn insert(&mut self, session: Session) {
        self.by_source
            .entry(session.source_ip)
            .or_default()
            .push(session.endpoint);
        self.sessions.insert(session.endpoint, session);
    }

    fn remove_endpoint(&mut self, endpoint: SocketAddr) -> Option<Session> {
        let session = self.sessions.remove(&endpoint)?;
        if let Some(endpoints) = self.by_source.get_mut(&session.source_ip) {
            endpoints.retain(|ep| *ep != endpoint);
            if endpoints.is_empty() {
                self.by_source.remove(&session.source_ip);
            }
        }
        Some(session)
    }

    /// Applies an ordinary position-update datagram. The stored score is
    /// max-aggregated so it is monotonically non-decreasing on this path.
    pub fn apply_state(&mut self, endpoint: SocketAddr, x: f32, y: f32, rot: f32, score: i32) {
        if let Some(session) = self.sessions.get_mut(&endpoint) {
            session.x = x;
            session.y = y;
            session.rot = rot;
            session.score = session.score.max(score);
            session.last_seen = Instant::now();
        }
    }

    /// Unconditional overwrite, used by the explicit score-update message.
    /// Returns the new score when the id was found.
    pub fn overwrite_score(&mut self, id: u32, score: i32) -> Option<i32> {
        let session = self.sessions.values_mut().find(|s| s.id == id)?;
        session.score = score;
        Some(session.score)
    }

    /// Sweeps sessions idle longer than `timeout`. Returns the removed ids.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let expired: Vec<SocketAddr> = self
            .sessions
            .values()
            .filter(|s| s.is_timed_out(timeout))
            .map(|s| s.endpoint)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for endpoint in expired {
            if let Some(session) = self.remove_endpoint(endpoint) {
                info!("Session {} timed out ({})", session.id, endpoint);
                removed.push(session.id);
            }
        }
        removed
    }

    /// Rebuilds the ephemeral broadcast records from current sessions.
    pub fn records(&self) -> Vec<PlayerRecord> {
        self.sessions
            .values()
            .map(|s| PlayerRecord {
                id: s.id,
                x: s.x,
                y: s.y,
                rot: s.rot,
                score: s.score,
                addr: s.endpoint.to_string(),
            })
            .collect()
    }

    /// Endpoints for broadcast fan-out.
    pub fn endpoints(&self) -> Vec<SocketAddr> {
        self.sessions.keys().copied().collect()
    }

    pub fn get(&self, endpoint: &SocketAddr) -> Option<&Session> {
        self.sessions.get(endpoint)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
