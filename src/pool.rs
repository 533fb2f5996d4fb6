//! Fixed pool of worker threads consuming connections from the handoff
//! queue.
//!
//! Each worker runs the same loop: pop a connection, hand it to the request
//! handler, close it, repeat. A `None` from the queue is the shutdown
//! signal and the only way a worker terminates. Handler failures stay
//! inside the handler call; they never reach the queue or other workers.

use std::io;
use std::net::TcpStream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics;
use crate::queue::HandoffQueue;

/// Per-connection request handling, invoked by worker threads.
///
/// Implementations read the request from the stream and write the response,
/// dealing with failures internally (log and return). The stream is closed
/// when `handle` returns; the worker owns it for exactly the duration of
/// the call.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, conn: TcpStream);
}

impl<F> RequestHandler for F
where
    F: Fn(TcpStream) + Send + Sync + 'static,
{
    fn handle(&self, conn: TcpStream) {
        self(conn)
    }
}

/// One or more workers exited by panicking instead of observing shutdown.
#[derive(Debug, Error)]
#[error("{panicked} worker thread(s) panicked")]
pub struct JoinError {
    pub panicked: usize,
}

/// Handles to `count` long-lived worker threads sharing one queue.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` named worker threads.
    ///
    /// If thread creation fails partway, the queue is shut down so the
    /// already-running workers terminate, they are joined, and the spawn
    /// error is returned.
    ///
    /// # Panics
    /// Panics if `count` is zero.
    pub fn spawn<H>(
        count: usize,
        queue: Arc<HandoffQueue<TcpStream>>,
        handler: Arc<H>,
    ) -> io::Result<Self>
    where
        H: RequestHandler,
    {
        assert!(count > 0, "worker pool needs at least 1 thread");
        let mut workers = Vec::with_capacity(count);
        for id in 0..count {
            let queue_ref = Arc::clone(&queue);
            let handler_ref = Arc::clone(&handler);
            let spawned = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || worker_loop(id, queue_ref, handler_ref));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    queue.shutdown();
                    for handle in workers {
                        let _ = handle.join();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Join every worker to completion. Call only after the queue has been
    /// shut down, otherwise workers blocked in `pop` never return.
    pub fn join(self) -> Result<(), JoinError> {
        let mut panicked = 0;
        for handle in self.workers {
            if handle.join().is_err() {
                panicked += 1;
            }
        }
        if panicked == 0 {
            Ok(())
        } else {
            Err(JoinError { panicked })
        }
    }
}

fn worker_loop<H: RequestHandler>(
    id: usize,
    queue: Arc<HandoffQueue<TcpStream>>,
    handler: Arc<H>,
) {
    while let Some(conn) = queue.pop() {
        // The stream moves into the handler call and is dropped (closed)
        // when it returns, panic or not. A panicking handler must not take
        // the worker down with it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(conn)));
        match outcome {
            Ok(()) => metrics::inc_served(),
            Err(_) => {
                metrics::inc_handler_panics();
                warn!(worker = id, "request handler panicked, connection dropped");
            }
        }
    }
    debug!(worker = id, "shutdown observed, worker exiting");
}
