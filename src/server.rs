//! Acceptor and lifecycle controller.
//!
//! Owns the listening socket, the handoff queue, and the worker pool. A
//! single thread runs the accept loop; every exit path (shutdown token,
//! rejected enqueue, fatal accept error) funnels into one shutdown
//! sequence: stop accepting, shut the queue down, join the workers, then
//! release the queue and the listener.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener, TcpStream};
use std::sync::Arc;

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::LISTEN_BACKLOG;
use crate::metrics;
use crate::pool::{JoinError, RequestHandler, WorkerPool};
use crate::queue::{HandoffQueue, Rejected};
use crate::shutdown::{ShutdownHandle, ShutdownToken};

/// Fatal failures: any of these ends the process with a non-zero status.
/// Per-connection problems never show up here.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
    #[error("failed to spawn worker pool: {0}")]
    Spawn(#[source] io::Error),
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error(transparent)]
    Join(#[from] JoinError),
}

pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    queue: Arc<HandoffQueue<TcpStream>>,
    pool: WorkerPool,
    token: ShutdownToken,
}

impl Server {
    /// Bind the listener, create the queue, and spawn the worker pool.
    ///
    /// `port` 0 asks the kernel for a free port; the bound address is
    /// available via [`local_addr`](Self::local_addr).
    pub fn bind<H>(
        port: u16,
        workers: usize,
        queue_capacity: usize,
        handler: Arc<H>,
    ) -> Result<Self, ServerError>
    where
        H: RequestHandler,
    {
        let listener = create_listener(port).map_err(ServerError::Bind)?;
        let local_addr = listener.local_addr().map_err(ServerError::Bind)?;
        let queue = Arc::new(HandoffQueue::new(queue_capacity));
        let pool = WorkerPool::spawn(workers, Arc::clone(&queue), handler)
            .map_err(ServerError::Spawn)?;
        info!(
            %local_addr,
            workers,
            queue_capacity,
            "listener bound, worker pool running"
        );
        Ok(Self {
            listener,
            local_addr,
            queue,
            pool,
            token: ShutdownToken::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle for requesting shutdown from another thread (signal handler,
    /// tests). Cheap to clone.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle::new(self.token.clone(), wake_addr(self.local_addr))
    }

    /// Run the accept loop until shutdown, then drive the shutdown
    /// sequence to completion. Connections queued before shutdown are
    /// still served; the accepted-but-not-enqueued connection on the exit
    /// path is closed unserved.
    ///
    /// Returns `Ok(())` on a clean signal-triggered shutdown and the fatal
    /// error otherwise; either way all workers have terminated.
    pub fn run(self) -> Result<(), ServerError> {
        let mut fatal = None;

        loop {
            if self.token.is_triggered() {
                info!("shutdown requested, leaving accept loop");
                break;
            }
            match self.listener.accept() {
                Ok((conn, peer)) => {
                    metrics::inc_accepted();
                    if self.token.is_triggered() {
                        // Usually the wake poke itself; no new work is
                        // admitted once the token is set.
                        info!("shutdown requested, leaving accept loop");
                        break;
                    }
                    debug!(%peer, "connection accepted");
                    if let Err(Rejected(conn)) = self.queue.push(conn) {
                        // Shutdown raced the accept; ownership stayed with
                        // us, so the connection closes unserved here.
                        metrics::inc_rejected();
                        drop(conn);
                        info!("queue rejected connection, leaving accept loop");
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!("accept failed: {e}");
                    fatal = Some(ServerError::Accept(e));
                    break;
                }
            }
        }

        // One-shot shutdown sequence, identical for every exit path.
        self.queue.shutdown();
        let joined = self.pool.join();
        drop(self.queue);
        drop(self.listener);

        match fatal {
            Some(e) => {
                // Workers were still joined above; the accept error wins.
                if let Err(join_err) = joined {
                    error!("worker pool join also failed: {join_err}");
                }
                Err(e)
            }
            None => {
                joined?;
                info!("shutdown complete");
                Ok(())
            }
        }
    }
}

/// Listener construction kept explicit: reuse-address for fast restarts,
/// fixed backlog, all local addresses.
fn create_listener(port: u16) -> io::Result<TcpListener> {
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}

/// Address the shutdown wake poke connects to. Listening on the
/// unspecified address is reachable via loopback on the same port.
fn wake_addr(local: SocketAddr) -> SocketAddr {
    let mut addr = local;
    if addr.ip().is_unspecified() {
        addr.set_ip(Ipv4Addr::LOCALHOST.into());
    }
    addr
}
