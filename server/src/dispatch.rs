//! Bounded datagram queue feeding a fixed pool of worker tasks.
//!
//! Decouples datagram receipt from message handling: the receiver pushes
//! each datagram as an opaque unit and a worker invokes the handler exactly
//! once per datagram. No ordering guarantee is provided across or within
//! endpoints; two datagrams from the same sender may be handled out of
//! order by different workers.

use log::{debug, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// One received datagram: payload bytes plus sender address.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub addr: SocketAddr,
}

/// Queue capacity and worker pool size.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    pub capacity: usize,
    pub workers: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            workers: 4,
        }
    }
}

/// Bounded buffer plus its worker pool.
///
/// When the buffer is full the incoming datagram is dropped with a warning
/// rather than blocking the producer; the transport is fire-and-forget and
/// a blocked receiver would stall the socket.
pub struct DispatchQueue {
    tx: mpsc::Sender<Datagram>,
    handles: Vec<JoinHandle<()>>,
}

impl DispatchQueue {
    /// Starts the worker pool with the given message handler.
    pub fn start<F, Fut>(config: DispatchConfig, handler: F) -> Self
    where
        F: Fn(Datagram) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(config.workers);
        for worker_id in 0..config.workers {
            let rx = Arc::clone(&rx);
            let handler = handler.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    // Hold the lock only while popping so workers run
                    // handlers concurrently.
                    let datagram = { rx.lock().await.recv().await };
                    match datagram {
                        Some(datagram) => handler(datagram).await,
                        None => break,
                    }
                }
                debug!("Dispatch worker {} stopped", worker_id);
            }));
        }

        Self { tx, handles }
    }

    /// Pushes a datagram onto the queue.
    ///
    /// Returns false when the datagram was dropped because the queue was
    /// full or already shut down.
    pub fn push(&self, datagram: Datagram) -> bool {
        match self.tx.try_send(datagram) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    "Dispatch queue full, dropping {} byte datagram from {}",
                    dropped.payload.len(),
                    dropped.addr
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// True once the queue has shut down and accepts no more datagrams.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Stops intake, waits for in-flight handler calls to finish, then
    /// invokes the shutdown handler. Workers are joined, never cancelled.
    pub async fn shutdown<S: FnOnce()>(self, on_shutdown: S) {
        drop(self.tx);
        for handle in self.handles {
            let _ = handle.await;
        }
        on_shutdown();
    }
}
