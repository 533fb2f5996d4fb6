//! Library crate for qserve: bounded handoff queue, worker pool, acceptor
//! lifecycle, and static-file request handling.
//!
//! The **binary** (`main.rs`) only adds the process boundary: CLI parsing,
//! logging setup, signal wiring, and exit codes. Everything with behavior
//! worth testing lives here, so the queue, pool, and server are exercised
//! directly by unit and integration tests.

pub mod config;
pub mod http;
pub mod metrics;
pub mod mime;
pub mod pool;
pub mod queue;
pub mod server;
pub mod shutdown;
