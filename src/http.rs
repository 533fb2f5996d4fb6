//! Minimal HTTP/1.0-style request reading and static-file response writing.
//!
//! One request per connection, no keep-alive: read the request line and
//! headers up to the terminating blank line, serve the named file, close.
//! Failures here are per-connection only; [`StaticFiles::handle`] logs them
//! and returns, so a malformed request never disturbs the worker pool.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{MAX_REQUEST_BYTES, READ_BUF_SIZE};
use crate::mime;
use crate::pool::RequestHandler;

const NOT_FOUND_RESPONSE: &[u8] = b"HTTP/1.0 404 Not Found\r\nContent-Length: 0\r\n\r\n";

/// Per-connection failure taxonomy. None of these are fatal to the server;
/// the handler logs them and the connection is closed.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed request: {0}")]
    Malformed(&'static str),
    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),
    #[error("request exceeds {MAX_REQUEST_BYTES} bytes")]
    RequestTooLarge,
    #[error("resource path escapes the serve directory")]
    Traversal,
    #[error("no MIME type for {0:?}")]
    UnknownExtension(String),
    #[error("resource is not a regular file")]
    NotAFile,
}

/// Read one request from `reader` and return the resource path token.
///
/// The request line must be `GET <resource> ...` with `<resource>` starting
/// with `/`. Bytes are consumed until the blank line ending the header
/// block so the peer is not reset before it finishes sending, bounded by
/// `MAX_REQUEST_BYTES`.
pub fn read_request<R: Read>(reader: &mut R) -> Result<String, HttpError> {
    let mut buf = Vec::with_capacity(READ_BUF_SIZE);
    let mut chunk = [0u8; READ_BUF_SIZE];
    let header_end = loop {
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
        if buf.len() >= MAX_REQUEST_BYTES {
            return Err(HttpError::RequestTooLarge);
        }
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Err(HttpError::Malformed("connection closed mid-request"));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..header_end])
        .map_err(|_| HttpError::Malformed("request is not valid UTF-8"))?;
    let request_line = head
        .lines()
        .next()
        .ok_or(HttpError::Malformed("empty request"))?;
    let mut tokens = request_line.split_whitespace();
    let method = tokens
        .next()
        .ok_or(HttpError::Malformed("missing method"))?;
    if method != "GET" {
        return Err(HttpError::UnsupportedMethod(method.to_string()));
    }
    let resource = tokens
        .next()
        .ok_or(HttpError::Malformed("missing resource path"))?;
    if !resource.starts_with('/') {
        return Err(HttpError::Malformed("resource path must start with '/'"));
    }
    Ok(resource.to_string())
}

/// Byte offset one past the `\r\n\r\n` (or bare `\n\n`) header terminator.
fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| i + 4)
        .or_else(|| buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2))
}

/// Write the response for `path` to `writer`.
///
/// A missing file gets the fixed 404; an existing regular file with a known
/// extension gets a 200 with `Content-Type`/`Content-Length` followed by
/// the file bytes streamed in `READ_BUF_SIZE` chunks. Anything else is a
/// handler error and the connection is closed without a response.
pub fn write_response<W: Write>(writer: &mut W, path: &Path) -> Result<(), HttpError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            writer.write_all(NOT_FOUND_RESPONSE)?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_file() {
        return Err(HttpError::NotAFile);
    }

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mime = mime::from_extension(ext)
        .ok_or_else(|| HttpError::UnknownExtension(ext.to_string()))?;

    let mut file = File::open(path)?;
    let header = format!(
        "HTTP/1.0 200 OK\r\nContent-Type: {mime}\r\nContent-Length: {}\r\n\r\n",
        meta.len()
    );
    writer.write_all(header.as_bytes())?;

    let mut buf = [0u8; READ_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
    }
    Ok(())
}

/// Serves files beneath a fixed root directory; the concrete
/// [`RequestHandler`] handed to every worker.
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join the request's resource onto the serve root, rejecting any
    /// component that would climb out of it.
    fn resolve(&self, resource: &str) -> Result<PathBuf, HttpError> {
        let relative = Path::new(resource.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(HttpError::Traversal);
        }
        Ok(self.root.join(relative))
    }

    fn serve(&self, conn: &mut TcpStream) -> Result<(), HttpError> {
        let resource = read_request(conn)?;
        debug!(resource, "serving request");
        let path = self.resolve(&resource)?;
        write_response(conn, &path)
    }
}

impl RequestHandler for StaticFiles {
    fn handle(&self, mut conn: TcpStream) {
        if let Err(e) = self.serve(&mut conn) {
            crate::metrics::inc_handler_errors();
            warn!("request failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn request(bytes: &[u8]) -> Result<String, HttpError> {
        read_request(&mut Cursor::new(bytes.to_vec()))
    }

    #[test]
    fn parses_resource_from_get_request() {
        let resource =
            request(b"GET /quote.txt HTTP/1.0\r\nHost: localhost\r\n\r\n").expect("parse failed");
        assert_eq!(resource, "/quote.txt");
    }

    #[test]
    fn accepts_bare_lf_terminator() {
        let resource = request(b"GET /index.html HTTP/1.0\n\n").expect("parse failed");
        assert_eq!(resource, "/index.html");
    }

    #[test]
    fn rejects_non_get_method() {
        match request(b"POST /quote.txt HTTP/1.0\r\n\r\n") {
            Err(HttpError::UnsupportedMethod(m)) => assert_eq!(m, "POST"),
            other => panic!("expected UnsupportedMethod, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_resource() {
        assert!(matches!(
            request(b"GET\r\n\r\n"),
            Err(HttpError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_relative_resource() {
        assert!(matches!(
            request(b"GET quote.txt HTTP/1.0\r\n\r\n"),
            Err(HttpError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_truncated_request() {
        assert!(matches!(
            request(b"GET /quote.txt HTTP/1.0\r\n"),
            Err(HttpError::Malformed(_))
        ));
    }

    #[test]
    fn rejects_oversized_request() {
        let mut big = b"GET /quote.txt HTTP/1.0\r\n".to_vec();
        big.resize(MAX_REQUEST_BYTES + 1, b'x');
        assert!(matches!(request(&big), Err(HttpError::RequestTooLarge)));
    }

    #[test]
    fn resolve_joins_beneath_root() {
        let files = StaticFiles::new("/srv/www");
        let path = files.resolve("/sub/quote.txt").expect("resolve failed");
        assert_eq!(path, Path::new("/srv/www/sub/quote.txt"));
    }

    #[test]
    fn resolve_rejects_parent_components() {
        let files = StaticFiles::new("/srv/www");
        assert!(matches!(
            files.resolve("/../etc/passwd"),
            Err(HttpError::Traversal)
        ));
        assert!(matches!(
            files.resolve("/sub/../../etc/passwd"),
            Err(HttpError::Traversal)
        ));
    }

    #[test]
    fn response_for_missing_file_is_404() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut out = Vec::new();
        write_response(&mut out, &dir.path().join("nope.txt")).expect("write failed");
        assert_eq!(out, NOT_FOUND_RESPONSE);
    }

    #[test]
    fn response_for_file_has_mime_length_and_body() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("quote.txt");
        fs::write(&path, b"ever tried. ever failed.\n").expect("write file failed");

        let mut out = Vec::new();
        write_response(&mut out, &path).expect("write failed");
        let text = String::from_utf8(out).expect("response not UTF-8");
        let (head, body) = text.split_once("\r\n\r\n").expect("no header terminator");
        assert!(head.starts_with("HTTP/1.0 200 OK"));
        assert!(head.contains("Content-Type: text/plain"));
        assert!(head.contains("Content-Length: 25"));
        assert_eq!(body, "ever tried. ever failed.\n");
    }

    #[test]
    fn response_streams_bodies_larger_than_one_chunk() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("big.txt");
        let payload = vec![b'a'; READ_BUF_SIZE * 3 + 17];
        fs::write(&path, &payload).expect("write file failed");

        let mut out = Vec::new();
        write_response(&mut out, &path).expect("write failed");
        let end_of_head = out
            .windows(4)
            .position(|w| w == b"\r\n\r\n")
            .expect("no header terminator")
            + 4;
        assert_eq!(&out[end_of_head..], &payload[..]);
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let path = dir.path().join("payload.bin");
        fs::write(&path, b"\x00\x01").expect("write file failed");

        let mut out = Vec::new();
        match write_response(&mut out, &path) {
            Err(HttpError::UnknownExtension(ext)) => assert_eq!(ext, "bin"),
            other => panic!("expected UnknownExtension, got {other:?}"),
        }
        assert!(out.is_empty(), "no partial response should be written");
    }

    #[test]
    fn directory_is_not_served() {
        let dir = tempfile::tempdir().expect("tempdir failed");
        let mut out = Vec::new();
        assert!(matches!(
            write_response(&mut out, dir.path()),
            Err(HttpError::NotAFile)
        ));
    }
}
