use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use qserve::config::{DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKER_THREADS};
use qserve::http::StaticFiles;
use qserve::metrics;
use qserve::server::Server;

#[derive(Parser)]
#[command(about = "Static file server with a bounded worker-pool handoff queue")]
struct Args {
    /// Directory to serve files from
    directory: PathBuf,

    /// Port to listen on
    port: u16,

    /// Number of worker threads
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_WORKER_THREADS as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    workers: u64,

    /// Pending-connection capacity of the handoff queue
    #[arg(
        short,
        long,
        default_value_t = DEFAULT_QUEUE_CAPACITY as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    queue_capacity: u64,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_thread_names(true)
        .init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let root = args
        .directory
        .canonicalize()
        .map_err(|e| format!("serve directory {:?}: {e}", args.directory))?;
    if !root.is_dir() {
        return Err(format!("serve directory {root:?} is not a directory").into());
    }

    metrics::spawn_reporter();

    let handler = Arc::new(StaticFiles::new(&root));
    let server = Server::bind(
        args.port,
        args.workers as usize,
        args.queue_capacity as usize,
        handler,
    )?;
    info!(root = %root.display(), addr = %server.local_addr(), "serving");

    let handle = server.shutdown_handle();
    ctrlc::set_handler(move || {
        // A second interrupt just re-triggers the monotonic token.
        info!("interrupt received, shutting down");
        handle.shutdown();
    })?;

    server.run()?;
    Ok(())
}
