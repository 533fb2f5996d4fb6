#![allow(dead_code)]

use std::fs;
use std::io::{Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use qserve::pool::RequestHandler;
use qserve::server::{Server, ServerError};
use qserve::shutdown::ShutdownHandle;

/// Bind on an ephemeral port and run the server on its own thread.
/// Returns the loopback address clients should connect to.
pub fn start_server<H: RequestHandler>(
    workers: usize,
    queue_capacity: usize,
    handler: Arc<H>,
) -> (SocketAddr, ShutdownHandle, JoinHandle<Result<(), ServerError>>) {
    let server = Server::bind(0, workers, queue_capacity, handler).expect("bind failed");
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), server.local_addr().port());
    let handle = server.shutdown_handle();
    let thread = std::thread::spawn(move || server.run());
    (addr, handle, thread)
}

/// One full exchange: send `request` verbatim, read to EOF (the server
/// closes after one response).
pub fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).expect("connect failed");
    stream.write_all(request).expect("write failed");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read failed");
    response
}

pub fn get(addr: SocketAddr, resource: &str) -> Vec<u8> {
    exchange(addr, format!("GET {resource} HTTP/1.0\r\n\r\n").as_bytes())
}

/// Split a response into (header block, body). Panics if the terminator is
/// missing.
pub fn split_response(response: &[u8]) -> (String, Vec<u8>) {
    let end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("no header terminator in response");
    let head = String::from_utf8(response[..end].to_vec()).expect("header block is not UTF-8");
    (head, response[end + 4..].to_vec())
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) {
    fs::write(dir.join(name), contents).expect("write file failed");
}
