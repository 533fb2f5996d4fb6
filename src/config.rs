//! Server sizing and operational configuration.
//!
//! Defaults here are CLI-overridable (`--workers`, `--queue-capacity`);
//! the rest are fixed operational constants.

/// Default number of worker threads pulling connections off the queue.
pub const DEFAULT_WORKER_THREADS: usize = 5;

/// Default pending-connection capacity of the handoff queue. Once this many
/// connections are waiting, enqueue blocks the acceptor, throttling the
/// accept rate to worker throughput.
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// Listen backlog handed to the kernel.
pub const LISTEN_BACKLOG: i32 = 5;

/// Chunk size for request reads and for streaming file bytes to the socket.
pub const READ_BUF_SIZE: usize = 512;

/// Upper bound on one request (request line + headers). A connection that
/// sends this much without a terminating blank line is dropped.
pub const MAX_REQUEST_BYTES: usize = 8192;

// Compile-time sanity checks
const _: () = assert!(
    DEFAULT_WORKER_THREADS > 0,
    "worker pool needs at least 1 thread"
);
const _: () = assert!(
    DEFAULT_QUEUE_CAPACITY > 0,
    "queue capacity must be at least 1"
);
const _: () = assert!(LISTEN_BACKLOG > 0, "listen backlog must be positive");
const _: () = assert!(
    MAX_REQUEST_BYTES >= READ_BUF_SIZE,
    "request bound must cover at least one read"
);
