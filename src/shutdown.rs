//! Cooperative shutdown signalling for the acceptor.
//!
//! The token replaces the usual process-global "keep running" flag with an
//! explicit value handed to whoever needs to observe or trigger shutdown.
//! It is only consulted at the accept-call boundary; in-flight request
//! handling always runs to completion.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How long the wake poke waits for the acceptor before giving up. The
/// connect target is the local listener, so this only expires if the
/// listener is already gone.
const WAKE_CONNECT_TIMEOUT: Duration = Duration::from_millis(250);

/// One-way cancellation flag shared between the signal handler, the
/// acceptor, and tests. Monotonic: once triggered it never resets.
#[derive(Clone, Default)]
pub struct ShutdownToken(Arc<AtomicBool>);

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Token plus the listener's wake address: triggering alone does not
/// unblock a thread parked in `accept`, so [`shutdown`](Self::shutdown)
/// also opens a throwaway loopback connection to make `accept` return.
#[derive(Clone)]
pub struct ShutdownHandle {
    token: ShutdownToken,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    pub(crate) fn new(token: ShutdownToken, wake_addr: SocketAddr) -> Self {
        Self { token, wake_addr }
    }

    /// Request shutdown and wake the acceptor. Safe to call any number of
    /// times; repeat calls only produce extra wake pokes, which the
    /// acceptor discards.
    pub fn shutdown(&self) {
        self.token.trigger();
        // The accepted poke is dropped by the acceptor once it sees the
        // token set; a failed connect means accept is not blocking anyway.
        let _ = TcpStream::connect_timeout(&self.wake_addr, WAKE_CONNECT_TIMEOUT);
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_triggered()
    }
}
