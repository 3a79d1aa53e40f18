//! ASCII wire protocol shared by server and client.
//!
//! A single UDP port multiplexes message kinds by textual prefix. Inbound
//! (client to server) messages are tested in a fixed priority order; any
//! field-count or numeric failure invalidates the whole datagram so a
//! malformed message is never partially applied. Outbound frames carry one
//! message kind per datagram and are rebuilt in full every tick.

/// Snapshot of one asteroid as carried in an `ASTEROIDS` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct AsteroidState {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub active: bool,
}

/// Snapshot of one bullet as carried in a `BULLETS` frame.
///
/// Bullet ids are client-generated strings (e.g. `p1_123`) so two clients
/// can never collide on an id without coordination.
#[derive(Debug, Clone, PartialEq)]
pub struct BulletState {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub dir: f32,
}

/// One line of the player-state broadcast. Ephemeral: rebuilt from the
/// session directory every tick, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub score: i32,
    pub addr: String,
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    DestroyAsteroid {
        id: u32,
    },
    BulletCreate {
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        dir: f32,
        id: String,
    },
    UpdateScore {
        id: u32,
        score: i32,
    },
    /// Fallback kind: a bare `<x> <y> <rot> <score>` state update.
    PlayerState {
        x: f32,
        y: f32,
        rot: f32,
        score: i32,
    },
}

impl ClientMessage {
    /// Decodes an inbound datagram, testing prefixes in priority order.
    ///
    /// Returns `None` on any field-count or parse failure; the caller logs
    /// and drops the datagram whole.
    pub fn parse(text: &str) -> Option<ClientMessage> {
        let text = text.trim_end_matches(['\r', '\n']);

        if let Some(rest) = text.strip_prefix("DESTROY_ASTEROID|") {
            let id = rest.trim().parse().ok()?;
            return Some(ClientMessage::DestroyAsteroid { id });
        }

        if text.starts_with("BULLET_CREATE ") {
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.len() != 7 {
                return None;
            }
            return Some(ClientMessage::BulletCreate {
                x: fields[1].parse().ok()?,
                y: fields[2].parse().ok()?,
                vx: fields[3].parse().ok()?,
                vy: fields[4].parse().ok()?,
                dir: fields[5].parse().ok()?,
                id: fields[6].to_string(),
            });
        }

        if let Some(rest) = text.strip_prefix("UPDATE_SCORE|") {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() != 2 {
                return None;
            }
            return Some(ClientMessage::UpdateScore {
                id: fields[0].parse().ok()?,
                score: fields[1].parse().ok()?,
            });
        }

        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 4 {
            return None;
        }
        Some(ClientMessage::PlayerState {
            x: fields[0].parse().ok()?,
            y: fields[1].parse().ok()?,
            rot: fields[2].parse().ok()?,
            score: fields[3].parse().ok()?,
        })
    }
}

/// Frames the server sends, unicast or broadcast.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// Every active asteroid; inactive ones are omitted at encode time.
    Asteroids(Vec<AsteroidState>),
    /// Every live bullet. Senders suppress the frame entirely when empty.
    Bullets(Vec<BulletState>),
    AsteroidDestroyed { id: u32 },
    ScoreUpdate { id: u32, score: i32 },
    Time { seconds_remaining: u64 },
    /// Identity assignment, unicast once to a newly created session.
    Welcome { id: u32 },
    /// One line per session; later lines for the same id override earlier.
    Players(Vec<PlayerRecord>),
    Shutdown,
}

impl ServerFrame {
    pub fn encode(&self) -> String {
        match self {
            ServerFrame::Asteroids(asteroids) => {
                let mut out = String::from("ASTEROIDS");
                for a in asteroids {
                    out.push_str(&format!(
                        "|{},{:.2},{:.2},{:.2},{:.2},{:.2},{:.2},{}",
                        a.id,
                        a.x,
                        a.y,
                        a.vx,
                        a.vy,
                        a.scale_x,
                        a.scale_y,
                        if a.active { 1 } else { 0 }
                    ));
                }
                out
            }
            ServerFrame::Bullets(bullets) => {
                let mut out = String::from("BULLETS");
                for b in bullets {
                    out.push_str(&format!(
                        "|{},{:.2},{:.2},{:.2},{:.2},{:.2}",
                        b.id, b.x, b.y, b.vx, b.vy, b.dir
                    ));
                }
                out
            }
            ServerFrame::AsteroidDestroyed { id } => format!("DESTROY_ASTEROID|{}", id),
            ServerFrame::ScoreUpdate { id, score } => format!("SCORE_UPDATE|{} {}", id, score),
            ServerFrame::Time { seconds_remaining } => format!("TIME {}", seconds_remaining),
            ServerFrame::Welcome { id } => format!("{}", id),
            ServerFrame::Players(players) => {
                let lines: Vec<String> = players
                    .iter()
                    .map(|p| {
                        format!(
                            "{} {:.6} {:.6} {:.6} {} {}",
                            p.id, p.x, p.y, p.rot, p.score, p.addr
                        )
                    })
                    .collect();
                lines.join("\n")
            }
            ServerFrame::Shutdown => String::from("SERVER_SHUTDOWN"),
        }
    }

    /// Decodes a server datagram on the client side.
    ///
    /// Mirrors the inbound rule: any malformed entry invalidates the whole
    /// frame rather than applying part of it.
    pub fn parse(text: &str) -> Option<ServerFrame> {
        let text = text.trim_end_matches(['\r', '\n']);

        if let Some(rest) = text.strip_prefix("ASTEROIDS") {
            let mut asteroids = Vec::new();
            for entry in rest.split('|').filter(|e| !e.is_empty()) {
                let f: Vec<&str> = entry.split(',').collect();
                if f.len() != 8 {
                    return None;
                }
                asteroids.push(AsteroidState {
                    id: f[0].parse().ok()?,
                    x: f[1].parse().ok()?,
                    y: f[2].parse().ok()?,
                    vx: f[3].parse().ok()?,
                    vy: f[4].parse().ok()?,
                    scale_x: f[5].parse().ok()?,
                    scale_y: f[6].parse().ok()?,
                    active: f[7].parse::<i32>().ok()? != 0,
                });
            }
            return Some(ServerFrame::Asteroids(asteroids));
        }

        if let Some(rest) = text.strip_prefix("BULLETS") {
            let mut bullets = Vec::new();
            for entry in rest.split('|').filter(|e| !e.is_empty()) {
                let f: Vec<&str> = entry.split(',').collect();
                if f.len() != 6 {
                    return None;
                }
                bullets.push(BulletState {
                    id: f[0].to_string(),
                    x: f[1].parse().ok()?,
                    y: f[2].parse().ok()?,
                    vx: f[3].parse().ok()?,
                    vy: f[4].parse().ok()?,
                    dir: f[5].parse().ok()?,
                });
            }
            return Some(ServerFrame::Bullets(bullets));
        }

        if let Some(rest) = text.strip_prefix("DESTROY_ASTEROID|") {
            let id = rest.trim().parse().ok()?;
            return Some(ServerFrame::AsteroidDestroyed { id });
        }

        if let Some(rest) = text.strip_prefix("SCORE_UPDATE|") {
            let fields: Vec<&str> = rest.split_whitespace().collect();
            if fields.len() != 2 {
                return None;
            }
            return Some(ServerFrame::ScoreUpdate {
                id: fields[0].parse().ok()?,
                score: fields[1].parse().ok()?,
            });
        }

        if let Some(rest) = text.strip_prefix("TIME ") {
            let seconds_remaining = rest.trim().parse().ok()?;
            return Some(ServerFrame::Time { seconds_remaining });
        }

        if text == "SERVER_SHUTDOWN" {
            return Some(ServerFrame::Shutdown);
        }

        // A lone integer is an identity assignment.
        if !text.contains(char::is_whitespace) {
            if let Ok(id) = text.parse() {
                return Some(ServerFrame::Welcome { id });
            }
        }

        // Fallback: player-state lines.
        let mut players = Vec::new();
        for line in text.lines() {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() != 6 {
                return None;
            }
            players.push(PlayerRecord {
                id: f[0].parse().ok()?,
                x: f[1].parse().ok()?,
                y: f[2].parse().ok()?,
                rot: f[3].parse().ok()?,
                score: f[4].parse().ok()?,
                addr: f[5].to_string(),
            });
        }
        if players.is_empty() {
            return None;
        }
        Some(ServerFrame::Players(players))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_parse_destroy_asteroid() {
        let msg = ClientMessage::parse("DESTROY_ASTEROID|7").unwrap();
        assert_eq!(msg, ClientMessage::DestroyAsteroid { id: 7 });
    }

    #[test]
    fn test_parse_bullet_create() {
        let msg = ClientMessage::parse("BULLET_CREATE 0 0 400 0 0 p1_123").unwrap();
        match msg {
            ClientMessage::BulletCreate {
                x,
                y,
                vx,
                vy,
                dir,
                id,
            } => {
                assert_approx_eq!(x, 0.0);
                assert_approx_eq!(y, 0.0);
                assert_approx_eq!(vx, 400.0);
                assert_approx_eq!(vy, 0.0);
                assert_approx_eq!(dir, 0.0);
                assert_eq!(id, "p1_123");
            }
            _ => panic!("wrong message kind"),
        }
    }

    #[test]
    fn test_parse_update_score() {
        let msg = ClientMessage::parse("UPDATE_SCORE|3 150").unwrap();
        assert_eq!(msg, ClientMessage::UpdateScore { id: 3, score: 150 });
    }

    #[test]
    fn test_parse_player_state_fallback() {
        let msg = ClientMessage::parse("120.0 45.0 0.78 50").unwrap();
        match msg {
            ClientMessage::PlayerState { x, y, rot, score } => {
                assert_approx_eq!(x, 120.0);
                assert_approx_eq!(y, 45.0);
                assert_approx_eq!(rot, 0.78);
                assert_eq!(score, 50);
            }
            _ => panic!("wrong message kind"),
        }
    }

    #[test]
    fn test_parse_rejects_wrong_field_counts() {
        // Too few / too many fields at each stage drops the whole datagram.
        assert!(ClientMessage::parse("BULLET_CREATE 0 0 400 0 0").is_none());
        assert!(ClientMessage::parse("BULLET_CREATE 0 0 400 0 0 p1_1 extra").is_none());
        assert!(ClientMessage::parse("UPDATE_SCORE|3").is_none());
        assert!(ClientMessage::parse("120.0 45.0 0.78").is_none());
        assert!(ClientMessage::parse("120.0 45.0 0.78 50 9").is_none());
        assert!(ClientMessage::parse("").is_none());
    }

    #[test]
    fn test_parse_rejects_non_numeric_fields() {
        assert!(ClientMessage::parse("DESTROY_ASTEROID|abc").is_none());
        assert!(ClientMessage::parse("x y z 50").is_none());
        assert!(ClientMessage::parse("UPDATE_SCORE|one 50").is_none());
    }

    #[test]
    fn test_prefix_priority_order() {
        // A bullet id that happens to contain digits must not fall through
        // to the player-state parser.
        let msg = ClientMessage::parse("BULLET_CREATE 1 2 3 4 5 6").unwrap();
        assert!(matches!(msg, ClientMessage::BulletCreate { .. }));
    }

    #[test]
    fn test_encode_asteroids_frame() {
        let frame = ServerFrame::Asteroids(vec![AsteroidState {
            id: 2,
            x: 10.0,
            y: -20.5,
            vx: 1.0,
            vy: 2.0,
            scale_x: 1.1,
            scale_y: 0.9,
            active: true,
        }]);
        assert_eq!(
            frame.encode(),
            "ASTEROIDS|2,10.00,-20.50,1.00,2.00,1.10,0.90,1"
        );
    }

    #[test]
    fn test_encode_empty_asteroids_frame() {
        assert_eq!(ServerFrame::Asteroids(vec![]).encode(), "ASTEROIDS");
        assert_eq!(
            ServerFrame::parse("ASTEROIDS").unwrap(),
            ServerFrame::Asteroids(vec![])
        );
    }

    #[test]
    fn test_encode_player_lines_at_six_decimals() {
        let frame = ServerFrame::Players(vec![PlayerRecord {
            id: 1,
            x: 120.0,
            y: 45.0,
            rot: 0.78,
            score: 50,
            addr: "127.0.0.1:9000".to_string(),
        }]);
        assert_eq!(
            frame.encode(),
            "1 120.000000 45.000000 0.780000 50 127.0.0.1:9000"
        );
    }

    #[test]
    fn test_frame_roundtrip_bullets() {
        let frame = ServerFrame::Bullets(vec![BulletState {
            id: "p1_123".to_string(),
            x: 0.0,
            y: 0.0,
            vx: 400.0,
            vy: 0.0,
            dir: 0.0,
        }]);
        let parsed = ServerFrame::parse(&frame.encode()).unwrap();
        match parsed {
            ServerFrame::Bullets(bullets) => {
                assert_eq!(bullets.len(), 1);
                assert_eq!(bullets[0].id, "p1_123");
                assert_approx_eq!(bullets[0].vx, 400.0);
            }
            _ => panic!("wrong frame kind"),
        }
    }

    #[test]
    fn test_parse_welcome_and_shutdown() {
        assert_eq!(
            ServerFrame::parse("17").unwrap(),
            ServerFrame::Welcome { id: 17 }
        );
        assert_eq!(
            ServerFrame::parse("SERVER_SHUTDOWN").unwrap(),
            ServerFrame::Shutdown
        );
    }

    #[test]
    fn test_parse_player_frame_multiple_lines() {
        let text = "1 0.000000 0.000000 0.000000 10 1.2.3.4:5\n2 5.000000 6.000000 0.500000 20 5.6.7.8:9";
        match ServerFrame::parse(text).unwrap() {
            ServerFrame::Players(players) => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[0].id, 1);
                assert_eq!(players[1].score, 20);
            }
            _ => panic!("wrong frame kind"),
        }
    }

    #[test]
    fn test_parse_time_and_score_update() {
        assert_eq!(
            ServerFrame::parse("TIME 42").unwrap(),
            ServerFrame::Time {
                seconds_remaining: 42
            }
        );
        assert_eq!(
            ServerFrame::parse("SCORE_UPDATE|2 99").unwrap(),
            ServerFrame::ScoreUpdate { id: 2, score: 99 }
        );
    }

    #[test]
    fn test_malformed_frame_is_dropped_whole() {
        // One bad entry poisons the frame; nothing is partially applied.
        assert!(ServerFrame::parse("ASTEROIDS|1,2,3").is_none());
        assert!(ServerFrame::parse("BULLETS|p1_1,0,0,bad,0,0").is_none());
        assert!(ServerFrame::parse("1 2.0 3.0 0.5 10 a:1\ngarbage line").is_none());
    }
}
