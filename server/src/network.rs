//! Server network layer: UDP receiver, outbound sender, datagram handling
//! and the tick scheduler.
//!
//! I/O is fully decoupled from scheduling. A dedicated receiver task feeds
//! the dispatch queue, workers decode and apply messages, and the scheduler
//! loop runs spawn/update/broadcast on its own timers. All shared maps are
//! uniformly guarded: the session directory and the world each live behind
//! their own `RwLock`.

use crate::dispatch::{Datagram, DispatchConfig, DispatchQueue};
use crate::sessions::{Resolution, SessionDirectory};
use crate::world::World;
use log::{debug, error, info, warn};
use shared::{
    ClientMessage, ServerFrame, ASTEROID_SPAWN_INTERVAL_SECS, MATCH_DURATION_SECS,
    SESSION_TIMEOUT_SECS, TICK_INTERVAL_MS,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::{interval, Instant};

/// Commands queued for the sender task. The channel is FIFO, and the
/// identity unicast for a new session is enqueued before the directory
/// write lock releases, so no broadcast naming that session can be queued
/// ahead of it.
#[derive(Debug)]
pub enum OutboundCommand {
    Send {
        frame: ServerFrame,
        addr: SocketAddr,
    },
    Broadcast {
        frame: ServerFrame,
    },
}

/// Shared state handed to dispatch workers.
pub struct ServerContext {
    pub sessions: Arc<RwLock<SessionDirectory>>,
    pub world: Arc<RwLock<World>>,
    out_tx: mpsc::UnboundedSender<OutboundCommand>,
    match_start: Mutex<Option<Instant>>,
}

impl ServerContext {
    fn new(
        sessions: Arc<RwLock<SessionDirectory>>,
        world: Arc<RwLock<World>>,
        out_tx: mpsc::UnboundedSender<OutboundCommand>,
    ) -> Self {
        Self {
            sessions,
            world,
            out_tx,
            match_start: Mutex::new(None),
        }
    }

    fn send(&self, frame: ServerFrame, addr: SocketAddr) {
        if let Err(e) = self.out_tx.send(OutboundCommand::Send { frame, addr }) {
            error!("Failed to queue unicast frame: {}", e);
        }
    }

    fn broadcast(&self, frame: ServerFrame) {
        if let Err(e) = self.out_tx.send(OutboundCommand::Broadcast { frame }) {
            error!("Failed to queue broadcast frame: {}", e);
        }
    }

    /// Starts the match clock on the first session.
    async fn mark_match_started(&self) {
        let mut start = self.match_start.lock().await;
        if start.is_none() {
            *start = Some(Instant::now());
            info!("First session created, match clock started");
        }
    }

    async fn seconds_remaining(&self) -> Option<u64> {
        let start = self.match_start.lock().await;
        start.map(|s| MATCH_DURATION_SECS.saturating_sub(s.elapsed().as_secs()))
    }

    /// Decodes and applies one datagram. A malformed datagram is logged and
    /// dropped whole; nothing is partially applied.
    pub async fn handle_datagram(&self, datagram: Datagram) {
        let text = match std::str::from_utf8(&datagram.payload) {
            Ok(text) => text,
            Err(_) => {
                warn!("Dropping non-UTF-8 datagram from {}", datagram.addr);
                return;
            }
        };

        let message = match ClientMessage::parse(text) {
            Some(message) => message,
            None => {
                warn!(
                    "Dropping malformed datagram from {}: {:?}",
                    datagram.addr, text
                );
                return;
            }
        };

        match message {
            ClientMessage::PlayerState { x, y, rot, score } => {
                let created = {
                    let mut sessions = self.sessions.write().await;
                    let resolution = sessions.resolve(datagram.addr, score);
                    sessions.apply_state(datagram.addr, x, y, rot, score);

                    // The identity unicast is enqueued while the write
                    // lock is still held: a tick cannot read the new
                    // session and enqueue a broadcast naming it until
                    // the Welcome frame is already ahead of it in the
                    // FIFO channel.
                    if let Resolution::Created(id) = resolution {
                        self.send(ServerFrame::Welcome { id }, datagram.addr);
                        true
                    } else {
                        false
                    }
                };

                if created {
                    self.mark_match_started().await;
                }
            }

            ClientMessage::BulletCreate {
                x,
                y,
                vx,
                vy,
                dir,
                id,
            } => {
                debug!("Bullet {} created by {}", id, datagram.addr);
                self.world.write().await.add_bullet(id, x, y, vx, vy, dir);
            }

            ClientMessage::DestroyAsteroid { id } => {
                // Broadcast only on the transition; repeats are no-ops.
                if self.world.write().await.destroy_asteroid(id) {
                    self.broadcast(ServerFrame::AsteroidDestroyed { id });
                }
            }

            ClientMessage::UpdateScore { id, score } => {
                if self
                    .sessions
                    .write()
                    .await
                    .overwrite_score(id, score)
                    .is_some()
                {
                    self.broadcast(ServerFrame::ScoreUpdate { id, score });
                } else {
                    warn!("Score update for unknown session {}", id);
                }
            }
        }
    }
}

/// Authoritative UDP synchronization server.
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionDirectory>>,
    world: Arc<RwLock<World>>,
    tick_interval: Duration,
    dispatch: DispatchConfig,
}

impl Server {
    /// Binds the listen socket. Any failure here is fatal to the process.
    pub async fn bind(
        addr: &str,
        dispatch: DispatchConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionDirectory::new())),
            world: Arc::new(RwLock::new(World::new())),
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            dispatch,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that drains the outbound command channel.
    fn spawn_sender(
        &self,
        mut out_rx: mpsc::UnboundedReceiver<OutboundCommand>,
    ) -> tokio::task::JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);

        tokio::spawn(async move {
            while let Some(command) = out_rx.recv().await {
                match command {
                    OutboundCommand::Send { frame, addr } => {
                        let text = frame.encode();
                        if let Err(e) = socket.send_to(text.as_bytes(), addr).await {
                            error!("Failed to send to {}: {}", addr, e);
                        }
                    }
                    OutboundCommand::Broadcast { frame } => {
                        let endpoints = sessions.read().await.endpoints();
                        let text = frame.encode();
                        for addr in endpoints {
                            if let Err(e) = socket.send_to(text.as_bytes(), addr).await {
                                error!("Failed to broadcast to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        })
    }

    /// Spawns the task that feeds received datagrams into the dispatch
    /// queue. Stops producing once the queue shuts down.
    fn spawn_receiver(&self, queue: Arc<DispatchQueue>) -> tokio::task::JoinHandle<()> {
        let socket = Arc::clone(&self.socket);

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];
            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let datagram = Datagram {
                            payload: buffer[0..len].to_vec(),
                            addr,
                        };
                        // push returns false both when full (keep going)
                        // and when closed (stop producing).
                        if !queue.push(datagram) && queue.is_closed() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error receiving datagram: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
            debug!("Receiver task stopped");
        })
    }

    /// One scheduler tick: advance the world and fan out the state frames.
    async fn on_tick(&self, ctx: &ServerContext, dt: f32) {
        {
            let mut world = self.world.write().await;
            world.update_asteroids(dt);
            world.update_bullets(dt);
        }

        let records = self.sessions.read().await.records();
        if records.is_empty() {
            return;
        }

        let (asteroids, bullets) = {
            let world = self.world.read().await;
            (world.asteroid_states(), world.bullet_states())
        };

        ctx.broadcast(ServerFrame::Players(records));
        ctx.broadcast(ServerFrame::Asteroids(asteroids));
        // The bullets frame is suppressed entirely when none exist.
        if !bullets.is_empty() {
            ctx.broadcast(ServerFrame::Bullets(bullets));
        }
    }

    /// Main loop: receiver and sender tasks plus the timer-driven
    /// scheduler, coordinated through message passing.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let sender_handle = self.spawn_sender(out_rx);

        let ctx = Arc::new(ServerContext::new(
            Arc::clone(&self.sessions),
            Arc::clone(&self.world),
            out_tx,
        ));

        let handler_ctx = Arc::clone(&ctx);
        let queue = Arc::new(DispatchQueue::start(self.dispatch, move |datagram| {
            let ctx = Arc::clone(&handler_ctx);
            async move {
                ctx.handle_datagram(datagram).await;
            }
        }));

        let receiver_handle = self.spawn_receiver(Arc::clone(&queue));

        let mut tick = interval(self.tick_interval);
        let mut spawner = interval(Duration::from_secs_f32(ASTEROID_SPAWN_INTERVAL_SECS));
        let mut sweeper = interval(Duration::from_secs(1));
        let mut clock = interval(Duration::from_secs(1));
        let mut last_tick = Instant::now();

        info!("Server started");

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;
                    self.on_tick(&ctx, dt).await;
                }

                _ = spawner.tick() => {
                    self.world.write().await.spawn_asteroid();
                }

                _ = sweeper.tick() => {
                    let removed = self
                        .sessions
                        .write()
                        .await
                        .check_timeouts(Duration::from_secs(SESSION_TIMEOUT_SECS));
                    if !removed.is_empty() {
                        debug!("Swept {} inactive session(s)", removed.len());
                    }
                }

                _ = clock.tick() => {
                    if let Some(seconds_remaining) = ctx.seconds_remaining().await {
                        ctx.broadcast(ServerFrame::Time { seconds_remaining });
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        // Graceful shutdown: announce, stop producing, let in-flight
        // workers finish, then close the transport.
        ctx.broadcast(ServerFrame::Shutdown);
        drop(ctx);

        receiver_handle.abort();
        let _ = receiver_handle.await;

        match Arc::try_unwrap(queue) {
            Ok(queue) => {
                let socket = Arc::clone(&self.socket);
                queue
                    .shutdown(move || {
                        drop(socket);
                        info!("Transport closed");
                    })
                    .await;
            }
            Err(_) => warn!("Dispatch queue still referenced at shutdown"),
        }

        let _ = sender_handle.await;
        info!("Server stopped");
        Ok(())
    }
}
