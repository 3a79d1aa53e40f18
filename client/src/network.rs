//! UDP client: sends local state and actions, feeds received frames into
//! the world mirror.
//!
//! The socket is bound to an ephemeral port; the server identifies this
//! client purely by the datagrams' source endpoint. Everything is
//! fire-and-forget, mirroring the server side.

use crate::mirror::WorldMirror;
use log::{error, info, warn};
use shared::{BulletState, ServerFrame, TICK_INTERVAL_MS};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::interval;

/// Connection to one arena server plus the reconciled mirror.
pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    pub mirror: WorldMirror,

    // Local authoritative state, reported to the server each tick.
    x: f32,
    y: f32,
    rot: f32,
    score: i32,
    bullet_seq: u32,
}

impl Client {
    /// Binds an ephemeral local port toward the given server address.
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;
        info!("Client bound to {}, server {}", socket.local_addr()?, server_addr);

        Ok(Client {
            socket,
            server_addr,
            mirror: WorldMirror::new(),
            x: 0.0,
            y: 0.0,
            rot: 0.0,
            score: 0,
            bullet_seq: 0,
        })
    }

    async fn send_text(&self, text: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.socket.send_to(text.as_bytes(), self.server_addr).await?;
        Ok(())
    }

    /// Updates the locally-owned transform.
    pub fn set_state(&mut self, x: f32, y: f32, rot: f32) {
        self.x = x;
        self.y = y;
        self.rot = rot;
    }

    pub fn add_score(&mut self, points: i32) {
        self.score += points;
    }

    /// Sends the ordinary `<x> <y> <rot> <score>` state datagram.
    pub async fn send_state(&self) -> Result<(), Box<dyn std::error::Error>> {
        let text = format!("{:.6} {:.6} {:.6} {}", self.x, self.y, self.rot, self.score);
        self.send_text(&text).await
    }

    /// Fires a bullet: registers it locally-owned in the mirror and tells
    /// the server. The id is prefixed with our session id so bullets from
    /// different clients can never collide.
    pub async fn fire_bullet(
        &mut self,
        x: f32,
        y: f32,
        vx: f32,
        vy: f32,
        dir: f32,
    ) -> Result<Option<String>, Box<dyn std::error::Error>> {
        let local_id = match self.mirror.local_id {
            Some(id) => id,
            None => {
                warn!("Cannot fire before the server assigns an id");
                return Ok(None);
            }
        };

        self.bullet_seq += 1;
        let id = format!("p{}_{}", local_id, self.bullet_seq);

        self.mirror.register_local_bullet(BulletState {
            id: id.clone(),
            x,
            y,
            vx,
            vy,
            dir,
        });

        let text = format!("BULLET_CREATE {} {} {} {} {} {}", x, y, vx, vy, dir, id);
        self.send_text(&text).await?;
        Ok(Some(id))
    }

    /// Reports an asteroid kill to the authoritative server.
    pub async fn destroy_asteroid(&self, id: u32) -> Result<(), Box<dyn std::error::Error>> {
        self.send_text(&format!("DESTROY_ASTEROID|{}", id)).await
    }

    /// Pushes an explicit score overwrite for our own session.
    pub async fn push_score(&mut self, score: i32) -> Result<(), Box<dyn std::error::Error>> {
        let local_id = match self.mirror.local_id {
            Some(id) => id,
            None => {
                warn!("Cannot push a score before the server assigns an id");
                return Ok(());
            }
        };
        self.score = score;
        self.send_text(&format!("UPDATE_SCORE|{} {}", local_id, score))
            .await
    }

    /// Applies one received datagram to the mirror. Unknown payloads are
    /// logged and dropped whole.
    fn handle_datagram(&mut self, payload: &[u8]) {
        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(_) => {
                warn!("Dropping non-UTF-8 datagram from server");
                return;
            }
        };

        match ServerFrame::parse(text) {
            Some(frame) => self.mirror.apply_frame(frame),
            None => warn!("Dropping unrecognized server frame: {:?}", text),
        }
    }

    /// Drives the connection: reports state every tick and keeps the mirror
    /// current until the server announces shutdown.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut send_tick = interval(Duration::from_millis(TICK_INTERVAL_MS));
        let mut buffer = [0u8; 2048];

        while !self.mirror.server_closed {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, from)) => {
                            if from == self.server_addr {
                                self.handle_datagram(&buffer[0..len]);
                            }
                        }
                        Err(e) => error!("Error receiving datagram: {}", e),
                    }
                }

                _ = send_tick.tick() => {
                    if let Err(e) = self.send_state().await {
                        error!("Error sending state: {}", e);
                    }
                    self.mirror.expire_bullets();
                }
            }
        }

        info!("Server closed, client stopping");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> Client {
        // Point at a local address nobody answers on; sends are
        // fire-and-forget so that is fine for unit tests.
        Client::connect("127.0.0.1:9").await.unwrap()
    }

    #[tokio::test]
    async fn test_fire_bullet_requires_assigned_id() {
        let mut client = test_client().await;
        let fired = client.fire_bullet(0.0, 0.0, 400.0, 0.0, 0.0).await.unwrap();
        assert!(fired.is_none());
        assert_eq!(client.mirror.bullets().count(), 0);
    }

    #[tokio::test]
    async fn test_fire_bullet_registers_locally_owned_entry() {
        let mut client = test_client().await;
        client.mirror.apply_frame(ServerFrame::Welcome { id: 1 });

        let id = client
            .fire_bullet(0.0, 0.0, 400.0, 0.0, 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(id, "p1_1");

        let entry = client.mirror.bullet(&id).unwrap();
        assert!(entry.locally_owned);

        // Sequence numbers keep ids unique per client.
        let second = client
            .fire_bullet(0.0, 0.0, 400.0, 0.0, 0.0)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, "p1_2");
    }

    #[tokio::test]
    async fn test_state_datagram_format() {
        let mut client = test_client().await;
        client.set_state(120.0, 45.0, 0.78);
        client.add_score(50);
        let text = format!(
            "{:.6} {:.6} {:.6} {}",
            client.x, client.y, client.rot, client.score
        );
        assert_eq!(text, "120.000000 45.000000 0.780000 50");
        // And the server's codec accepts it as a state update.
        assert!(matches!(
            shared::ClientMessage::parse(&text),
            Some(shared::ClientMessage::PlayerState { .. })
        ));
    }

    #[tokio::test]
    async fn test_shutdown_frame_marks_mirror_closed() {
        let mut client = test_client().await;
        client.handle_datagram(b"SERVER_SHUTDOWN");
        assert!(client.mirror.server_closed);
    }
}
