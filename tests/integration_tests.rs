//! Integration tests for the arena synchronization components.
//!
//! These tests exercise a real server over loopback UDP. Multi-client
//! scenarios use distinct loopback addresses (127.0.0.1 vs 127.0.0.2)
//! because sessions sharing a source address deliberately merge.

use server::dispatch::DispatchConfig;
use server::network::Server;
use shared::{ClientMessage, ServerFrame};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout, Instant};

/// Spawns a server on an ephemeral port and returns its address.
async fn spawn_server() -> SocketAddr {
    let mut server = Server::bind("127.0.0.1:0", DispatchConfig::default())
        .await
        .expect("bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    // Let the receiver and scheduler tasks come up.
    sleep(Duration::from_millis(20)).await;
    addr
}

async fn bind_client(ip: &str) -> UdpSocket {
    UdpSocket::bind(format!("{}:0", ip)).await.expect("bind client")
}

/// Receives datagrams until one satisfies the predicate or the deadline
/// passes. Broadcast traffic (TIME, ASTEROIDS, ...) is interleaved, so
/// tests must filter rather than assume the next datagram.
async fn recv_matching<F>(socket: &UdpSocket, deadline: Duration, pred: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    let end = Instant::now() + deadline;
    let mut buffer = [0u8; 2048];
    loop {
        let remaining = end.checked_duration_since(Instant::now())?;
        match timeout(remaining, socket.recv_from(&mut buffer)).await {
            Ok(Ok((len, _))) => {
                if let Ok(text) = std::str::from_utf8(&buffer[0..len]) {
                    if pred(text) {
                        return Some(text.to_string());
                    }
                }
            }
            _ => return None,
        }
    }
}

/// Collects every datagram received within the window.
async fn collect_frames(socket: &UdpSocket, window: Duration) -> Vec<String> {
    let end = Instant::now() + window;
    let mut buffer = [0u8; 2048];
    let mut frames = Vec::new();
    while let Some(remaining) = end.checked_duration_since(Instant::now()) {
        match timeout(remaining, socket.recv_from(&mut buffer)).await {
            Ok(Ok((len, _))) => {
                if let Ok(text) = std::str::from_utf8(&buffer[0..len]) {
                    frames.push(text.to_string());
                }
            }
            _ => break,
        }
    }
    frames
}

mod session_tests {
    use super::*;

    /// An unseen endpoint's first state datagram allocates id 1, which is
    /// unicast bare, and the next player broadcast carries the state.
    #[tokio::test]
    async fn first_contact_assigns_identity_and_broadcasts_state() {
        let server = spawn_server().await;
        let socket = bind_client("127.0.0.1").await;

        socket
            .send_to(b"120.0 45.0 0.78 50", server)
            .await
            .unwrap();

        let welcome = recv_matching(&socket, Duration::from_secs(1), |t| t == "1").await;
        assert_eq!(welcome.as_deref(), Some("1"));

        let line = recv_matching(&socket, Duration::from_secs(1), |t| {
            t.starts_with("1 120.000000 45.000000 0.780000 50 ")
        })
        .await;
        assert!(line.is_some(), "player broadcast should echo the state");
    }

    /// Distinct source addresses get distinct sessions and see each other
    /// in the player broadcast.
    #[tokio::test]
    async fn distinct_addresses_get_distinct_sessions() {
        let server = spawn_server().await;
        let a = bind_client("127.0.0.1").await;
        let b = bind_client("127.0.0.2").await;

        a.send_to(b"0 0 0 0", server).await.unwrap();
        assert!(recv_matching(&a, Duration::from_secs(1), |t| t == "1")
            .await
            .is_some());

        b.send_to(b"5 5 0 0", server).await.unwrap();
        assert!(recv_matching(&b, Duration::from_secs(1), |t| t == "2")
            .await
            .is_some());

        // Both ids appear in one player frame eventually.
        let both = recv_matching(&a, Duration::from_secs(1), |t| {
            let ids: Vec<&str> = t
                .lines()
                .filter_map(|l| l.split_whitespace().next())
                .collect();
            ids.contains(&"1") && ids.contains(&"2")
        })
        .await;
        assert!(both.is_some());
    }

    /// A new port from the same source address resumes the old session:
    /// no fresh welcome, old id, max of the scores.
    #[tokio::test]
    async fn reconnection_resumes_session_with_max_score() {
        let server = spawn_server().await;
        let first = bind_client("127.0.0.1").await;

        first.send_to(b"0 0 0 80", server).await.unwrap();
        assert!(recv_matching(&first, Duration::from_secs(1), |t| t == "1")
            .await
            .is_some());
        drop(first);

        let second = bind_client("127.0.0.1").await;
        second.send_to(b"0 0 0 30", server).await.unwrap();

        // The resumed endpoint receives broadcasts showing id 1 with the
        // preserved score and never a fresh identity unicast.
        let line = recv_matching(&second, Duration::from_secs(1), |t| {
            t.lines()
                .any(|l| l.starts_with("1 ") && l.split_whitespace().nth(4) == Some("80"))
        })
        .await;
        assert!(line.is_some(), "session 1 should survive with score 80");

        let stray_welcome = recv_matching(&second, Duration::from_millis(300), |t| t == "2").await;
        assert!(stray_welcome.is_none(), "reconnection must not allocate an id");
    }
}

mod world_tests {
    use super::*;

    /// A created bullet shows up in BULLETS frames until its lifetime
    /// elapses and in none after.
    #[tokio::test]
    async fn bullet_lifetime_over_the_wire() {
        let server = spawn_server().await;
        let socket = bind_client("127.0.0.1").await;

        socket.send_to(b"0 0 0 0", server).await.unwrap();
        assert!(recv_matching(&socket, Duration::from_secs(1), |t| t == "1")
            .await
            .is_some());

        socket
            .send_to(b"BULLET_CREATE 0 0 400 0 0 p1_123", server)
            .await
            .unwrap();

        let listed = recv_matching(&socket, Duration::from_secs(1), |t| {
            t.starts_with("BULLETS") && t.contains("p1_123")
        })
        .await;
        assert!(listed.is_some(), "bullet should appear while alive");

        // Wait out the lifetime, drain the backlog, then watch fresh frames.
        sleep(Duration::from_secs_f32(shared::BULLET_LIFETIME_SECS + 0.3)).await;
        let _ = collect_frames(&socket, Duration::from_millis(150)).await;
        let frames = collect_frames(&socket, Duration::from_millis(300)).await;
        assert!(
            frames
                .iter()
                .filter(|f| f.starts_with("BULLETS"))
                .all(|f| !f.contains("p1_123")),
            "expired bullet must not be listed"
        );
    }

    /// Repeating a destroy for an already-removed asteroid produces no
    /// second destroy broadcast.
    #[tokio::test]
    async fn destroy_asteroid_idempotent_over_the_wire() {
        let server = spawn_server().await;
        let socket = bind_client("127.0.0.1").await;

        socket.send_to(b"0 0 0 0", server).await.unwrap();
        assert!(recv_matching(&socket, Duration::from_secs(1), |t| t == "1")
            .await
            .is_some());

        // The spawner's first interval fires immediately, so asteroid 1
        // exists shortly after startup.
        let seen = recv_matching(&socket, Duration::from_secs(1), |t| {
            t.starts_with("ASTEROIDS|") && t.contains("|1,")
        })
        .await;
        assert!(seen.is_some(), "asteroid 1 should be broadcast");

        socket.send_to(b"DESTROY_ASTEROID|1", server).await.unwrap();
        socket.send_to(b"DESTROY_ASTEROID|1", server).await.unwrap();

        let frames = collect_frames(&socket, Duration::from_millis(500)).await;
        let destroys = frames
            .iter()
            .filter(|f| f.as_str() == "DESTROY_ASTEROID|1")
            .count();
        assert_eq!(destroys, 1, "exactly one destroy broadcast");
        assert!(
            frames
                .iter()
                .filter(|f| f.starts_with("ASTEROIDS"))
                .all(|f| !f.contains("|1,")),
            "destroyed asteroid must leave the snapshot"
        );
    }

    /// Malformed datagrams are dropped whole; the session they would have
    /// touched is unaffected.
    #[tokio::test]
    async fn malformed_datagrams_are_ignored() {
        let server = spawn_server().await;
        let socket = bind_client("127.0.0.1").await;

        socket.send_to(b"0 0 0 40", server).await.unwrap();
        assert!(recv_matching(&socket, Duration::from_secs(1), |t| t == "1")
            .await
            .is_some());

        socket.send_to(b"garbage datagram", server).await.unwrap();
        socket.send_to(b"UPDATE_SCORE|1", server).await.unwrap();
        socket.send_to(b"1 2 3", server).await.unwrap();

        // Score still reads 40 in the ongoing broadcasts.
        let line = recv_matching(&socket, Duration::from_secs(1), |t| {
            t.lines()
                .any(|l| l.starts_with("1 ") && l.split_whitespace().nth(4) == Some("40"))
        })
        .await;
        assert!(line.is_some());
    }

    /// TIME frames appear at a steady cadence once a session exists.
    #[tokio::test]
    async fn match_clock_broadcasts_once_active() {
        let server = spawn_server().await;
        let socket = bind_client("127.0.0.1").await;

        socket.send_to(b"0 0 0 0", server).await.unwrap();

        let time = recv_matching(&socket, Duration::from_secs(2), |t| t.starts_with("TIME "))
            .await
            .expect("time frame");
        let remaining: u64 = time.strip_prefix("TIME ").unwrap().parse().unwrap();
        assert!(remaining <= shared::MATCH_DURATION_SECS);
    }
}

mod client_tests {
    use super::*;
    use client::mirror::WorldMirror;

    /// The library client fires a bullet that the server registers and
    /// rebroadcasts; the local mirror keeps authority over it.
    #[tokio::test]
    async fn client_bullet_roundtrip() {
        let server_addr = spawn_server().await;

        let mut arena = client::network::Client::connect(&server_addr.to_string())
            .await
            .unwrap();
        arena.set_state(10.0, 20.0, 0.5);
        arena.send_state().await.unwrap();

        // Hand the assigned id to the mirror so fire_bullet can run; an
        // observer on a second address watches the broadcasts.
        arena.mirror.apply_frame(ServerFrame::Welcome { id: 1 });
        let observer = bind_client("127.0.0.2").await;
        observer.send_to(b"0 0 0 0", server_addr).await.unwrap();

        let id = arena
            .fire_bullet(0.0, 0.0, 400.0, 0.0, 0.0)
            .await
            .unwrap()
            .expect("bullet id");
        assert_eq!(id, "p1_1");
        assert!(arena.mirror.bullet(&id).unwrap().locally_owned);

        let listed = recv_matching(&observer, Duration::from_secs(1), |t| {
            t.starts_with("BULLETS") && t.contains("p1_1")
        })
        .await;
        assert!(listed.is_some(), "server should rebroadcast the bullet");
    }

    /// Server frames drive the mirror exactly as the codec decodes them.
    #[tokio::test]
    async fn mirror_follows_wire_frames() {
        let mut mirror = WorldMirror::new();

        for text in [
            "3",
            "ASTEROIDS|1,100.00,50.00,-10.00,-5.00,1.00,1.00,1",
            "BULLETS|p2_7,0.00,0.00,400.00,0.00,0.00",
            "1 0.000000 0.000000 0.000000 10 127.0.0.1:5000",
            "SCORE_UPDATE|1 99",
            "TIME 120",
        ] {
            mirror.apply_frame(ServerFrame::parse(text).expect(text));
        }

        assert_eq!(mirror.local_id, Some(3));
        assert!(mirror.asteroid(1).is_some());
        assert!(mirror.bullet("p2_7").is_some());
        assert_eq!(mirror.player(1).unwrap().score, 99);
        assert_eq!(mirror.seconds_remaining, Some(120));
    }
}

mod protocol_tests {
    use super::*;

    /// The exact scenario strings from the protocol contract decode to the
    /// expected message kinds.
    #[test]
    fn contract_scenario_strings_decode() {
        assert!(matches!(
            ClientMessage::parse("120.0 45.0 0.78 50"),
            Some(ClientMessage::PlayerState { score: 50, .. })
        ));
        assert!(matches!(
            ClientMessage::parse("BULLET_CREATE 0 0 400 0 0 p1_123"),
            Some(ClientMessage::BulletCreate { .. })
        ));
        assert!(matches!(
            ClientMessage::parse("DESTROY_ASTEROID|4"),
            Some(ClientMessage::DestroyAsteroid { id: 4 })
        ));
        assert!(matches!(
            ClientMessage::parse("UPDATE_SCORE|2 7"),
            Some(ClientMessage::UpdateScore { id: 2, score: 7 })
        ));
    }

    /// Raw UDP echo sanity check for the text framing.
    #[tokio::test]
    async fn udp_text_roundtrip() {
        let echo = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let echo_addr = echo.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            if let Ok((len, from)) = echo.recv_from(&mut buf).await {
                let _ = echo.send_to(&buf[0..len], from).await;
            }
        });

        let socket = bind_client("127.0.0.1").await;
        let frame = ServerFrame::ScoreUpdate { id: 9, score: 42 }.encode();
        socket.send_to(frame.as_bytes(), echo_addr).await.unwrap();

        let back = recv_matching(&socket, Duration::from_secs(1), |_| true)
            .await
            .unwrap();
        assert_eq!(
            ServerFrame::parse(&back),
            Some(ServerFrame::ScoreUpdate { id: 9, score: 42 })
        );
    }
}
