//! TCP Server
//!
//! Accepts connections and serves each on its own worker thread.

use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::Result;
use crate::service::Service;

use super::Connection;

/// How often the accept loop checks the shutdown flag
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Cloneable handle that stops a running [`Server`]
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// TCP server for PathKV
pub struct Server {
    listener: TcpListener,
    service: Arc<Service>,
    shutdown: ShutdownHandle,
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the configured listen address
    pub fn bind(service: Arc<Service>) -> Result<Self> {
        let listener = TcpListener::bind(&service.config().listen_addr)?;
        listener.set_nonblocking(true)?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            service,
            shutdown: ShutdownHandle {
                flag: Arc::new(AtomicBool::new(false)),
            },
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Number of connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Accept connections until shutdown (blocking)
    pub fn run(&self) -> Result<()> {
        let config = self.service.config();
        let max_connections = config.max_connections;
        let (read_ms, write_ms) = (config.read_timeout_ms, config.write_timeout_ms);

        while !self.shutdown.is_shutdown() {
            let (stream, peer) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("Accept failed: {}", e);
                    return Err(e.into());
                }
            };

            if self.active.load(Ordering::SeqCst) >= max_connections {
                tracing::warn!(
                    "Rejecting {}: {} connections already active",
                    peer,
                    max_connections
                );
                drop(stream);
                continue;
            }

            // Accepted sockets inherit non-blocking mode on some platforms
            stream.set_nonblocking(false)?;

            let service = Arc::clone(&self.service);
            let active = Arc::clone(&self.active);
            active.fetch_add(1, Ordering::SeqCst);
            let spawned = thread::Builder::new()
                .name(format!("pathkv-conn-{}", peer))
                .spawn(move || {
                    let result = Connection::new(stream, service).and_then(|mut conn| {
                        conn.set_timeouts(read_ms, write_ms)?;
                        conn.handle()
                    });
                    if let Err(e) = result {
                        tracing::debug!("Connection {} closed with error: {}", peer, e);
                    }
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            if let Err(e) = spawned {
                self.active.fetch_sub(1, Ordering::SeqCst);
                tracing::error!("Failed to spawn worker for {}: {}", peer, e);
            }
        }

        tracing::info!("Server shutting down");
        Ok(())
    }
}
