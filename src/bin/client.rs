use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Instant;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(about = "Test client for the qserve static file server")]
struct Args {
    /// Server port
    #[arg(short, long, default_value_t = 8000)]
    port: u16,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch one resource and print the response (default: /index.html)
    Get {
        #[arg(default_value = "/index.html")]
        resource: String,
    },
    /// Verify a 200 for an existing resource and a 404 for a missing one
    Smoke {
        /// Resource expected to exist
        #[arg(default_value = "/index.html")]
        resource: String,
    },
    /// Measure request throughput with concurrent connections
    Bench {
        /// Resource to fetch
        #[arg(default_value = "/index.html")]
        resource: String,
        /// Number of concurrent connections
        #[arg(short, long, default_value_t = 4)]
        connections: usize,
        /// Requests per connection (one connection each, no keep-alive)
        #[arg(short, long, default_value_t = 1000)]
        requests: usize,
    },
}

/// One full exchange: connect, send the GET, read to EOF (the server
/// closes after one response). Returns the raw response bytes.
fn fetch(addr: &str, resource: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("failed to connect");
    let request = format!("GET {resource} HTTP/1.0\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .expect("failed to write request");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .expect("failed to read response");
    response
}

fn status_line(response: &[u8]) -> &str {
    let end = response
        .windows(2)
        .position(|w| w == b"\r\n")
        .unwrap_or(response.len());
    std::str::from_utf8(&response[..end]).expect("status line is not UTF-8")
}

fn main() {
    let args = Args::parse();
    let addr = format!("127.0.0.1:{}", args.port);

    match args.command.unwrap_or(Command::Get {
        resource: "/index.html".to_string(),
    }) {
        Command::Get { resource } => get(&addr, &resource),
        Command::Smoke { resource } => smoke_test(&addr, &resource),
        Command::Bench {
            resource,
            connections,
            requests,
        } => bench_test(&addr, &resource, connections, requests),
    }
}

fn get(addr: &str, resource: &str) {
    let response = fetch(addr, resource);
    if response.is_empty() {
        eprintln!("connection closed without a response");
        std::process::exit(1);
    }
    let mut stdout = std::io::stdout();
    stdout.write_all(&response).expect("failed to write stdout");
}

fn smoke_test(addr: &str, resource: &str) {
    eprintln!("smoke test: connecting to {}", addr);

    let response = fetch(addr, resource);
    let status = status_line(&response);
    assert!(
        status.starts_with("HTTP/1.0 200"),
        "{resource}: expected 200, got {status:?}"
    );
    eprintln!("  {resource}: OK ({status})");

    let response = fetch(addr, "/no-such-file.txt");
    let status = status_line(&response);
    assert!(
        status.starts_with("HTTP/1.0 404"),
        "missing file: expected 404, got {status:?}"
    );
    eprintln!("  /no-such-file.txt: OK ({status})");

    eprintln!("smoke test: PASSED");
}

fn bench_test(addr: &str, resource: &str, num_connections: usize, requests_per_conn: usize) {
    eprintln!(
        "bench: {} connections x {} requests to {}{}",
        num_connections, requests_per_conn, addr, resource
    );

    let start = Instant::now();

    let handles: Vec<_> = (0..num_connections)
        .map(|_| {
            let addr = addr.to_string();
            let resource = resource.to_string();
            std::thread::spawn(move || {
                let mut bytes = 0usize;
                for _ in 0..requests_per_conn {
                    let response = fetch(&addr, &resource);
                    assert!(
                        status_line(&response).starts_with("HTTP/1.0 200"),
                        "unexpected status: {}",
                        status_line(&response)
                    );
                    bytes += response.len();
                }
                bytes
            })
        })
        .collect();

    let mut total_bytes = 0usize;
    for h in handles {
        total_bytes += h.join().expect("thread panicked");
    }

    let elapsed = start.elapsed();
    let total = num_connections * requests_per_conn;
    let qps = total as f64 / elapsed.as_secs_f64();
    eprintln!(
        "bench: {} requests ({:.1} MB) in {:.2}s = {:.0} QPS",
        total,
        total_bytes as f64 / 1_000_000.0,
        elapsed.as_secs_f64(),
        qps
    );
}
