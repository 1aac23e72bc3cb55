//! Minimal HTTP/1.1 request reading and response writing over a `TcpStream`.
//!
//! One request per connection (`Connection: close`). Bodies are framed by
//! `Content-Length` only; chunked uploads are rejected. `Expect:
//! 100-continue` is answered once the declared length has been accepted.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, Instant};

use anyhow::Result;

use super::ApiError;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const READ_TIMEOUT: Duration = Duration::from_secs(30);
/// Unread request bytes discarded before closing, so the peer sees our
/// response instead of a reset.
const DRAIN_LIMIT_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug)]
pub(crate) struct HttpRequest {
    pub method: String,
    pub path: String,
    headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Read one request. Bodies longer than `max_body` are refused with 413
/// before any of the body is read.
pub(crate) fn read_request<S: Read + Write>(
    stream: &mut S,
    max_body: u64,
) -> std::result::Result<HttpRequest, ApiError> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = find_subslice(&data, b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(ApiError::bad_request("Request headers too large"));
        }
        let n = stream
            .read(&mut buf)
            .map_err(|e| ApiError::bad_request(format!("Failed to read request: {}", e)))?;
        if n == 0 {
            return Err(ApiError::bad_request("Incomplete request"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| ApiError::bad_request("Empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| ApiError::bad_request("Missing method"))?;
    let raw_path = parts
        .next()
        .ok_or_else(|| ApiError::bad_request("Missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
    }

    if headers
        .get("transfer-encoding")
        .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    {
        return Err(ApiError::bad_request("Chunked request bodies are not supported"));
    }
    let content_length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| ApiError::bad_request("Invalid Content-Length"))?,
        None => 0,
    };
    if content_length > max_body {
        return Err(ApiError::payload_too_large(max_body));
    }

    let content_length = content_length as usize;
    let mut body = data.split_off(header_end + 4);
    body.truncate(content_length);
    if body.len() < content_length {
        let expects_continue = headers
            .get("expect")
            .is_some_and(|v| v.eq_ignore_ascii_case("100-continue"));
        if expects_continue {
            stream
                .write_all(b"HTTP/1.1 100 Continue\r\n\r\n")
                .and_then(|_| stream.flush())
                .map_err(|e| ApiError::bad_request(format!("Failed to write response: {}", e)))?;
        }
        let remaining = (content_length - body.len()) as u64;
        (&mut *stream)
            .take(remaining)
            .read_to_end(&mut body)
            .map_err(|e| ApiError::bad_request(format!("Failed to read request body: {}", e)))?;
        if body.len() < content_length {
            return Err(ApiError::bad_request("Request body shorter than Content-Length"));
        }
    }

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        headers,
        body,
    })
}

pub(crate) fn set_timeouts(stream: &std::net::TcpStream) -> Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_write_timeout(Some(READ_TIMEOUT))?;
    Ok(())
}

/// Half-close and discard whatever the peer is still sending, bounded in
/// bytes and time, so closing does not reset the connection before the
/// response is read.
pub(crate) fn finish_connection(stream: &mut TcpStream, timeout: Duration) {
    if stream.shutdown(Shutdown::Write).is_err() {
        return;
    }
    if stream.set_read_timeout(Some(timeout)).is_err() {
        return;
    }
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 8192];
    let mut drained = 0u64;
    while drained < DRAIN_LIMIT_BYTES && Instant::now() < deadline {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => drained += n as u64,
        }
    }
}

pub(crate) fn write_json_response<W: Write>(
    stream: &mut W,
    status: u16,
    body: &serde_json::Value,
) -> Result<()> {
    let payload = serde_json::to_vec(body)?;
    write_response(stream, status, "application/json", &payload)
}

pub(crate) fn write_response<W: Write>(
    stream: &mut W,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status = status,
        reason = reason_phrase(status),
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        503 => "Service Unavailable",
        _ => "Internal Server Error",
    }
}

pub(crate) fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Reads from a fixed request, records what the server writes back.
    struct Duplex {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Duplex {
        fn new(raw: &[u8]) -> Self {
            Self {
                input: Cursor::new(raw.to_vec()),
                output: Vec::new(),
            }
        }
    }

    impl Read for Duplex {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Duplex {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn reads_headers_and_body() {
        let raw = b"POST /api/v1/detect?x=1 HTTP/1.1\r\nHost: a\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let req = read_request(&mut Duplex::new(raw), 1024).unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/api/v1/detect");
        assert_eq!(req.header("Content-Type"), Some("text/plain"));
        assert_eq!(req.body, b"hello");
    }

    #[test]
    fn oversized_body_is_413() {
        let raw = b"POST /api/v1/detect HTTP/1.1\r\nContent-Length: 2048\r\n\r\n";
        let err = read_request(&mut Duplex::new(raw), 1024).unwrap_err();
        assert_eq!(err.status, 413);
    }

    #[test]
    fn short_body_is_rejected() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc";
        let err = read_request(&mut Duplex::new(raw), 1024).unwrap_err();
        assert_eq!(err.status, 400);
    }

    #[test]
    fn expect_continue_is_answered_before_body() {
        let raw = b"POST /api/v1/detect HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\n";
        let mut stream = Duplex::new(raw);
        // The body arrives only after the interim response in practice; here it
        // is simply missing, so the read fails after the 100 was sent.
        let err = read_request(&mut stream, 1024).unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(stream.output, b"HTTP/1.1 100 Continue\r\n\r\n");

        let mut stream = Duplex::new(b"POST / HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 3\r\n\r\nabc");
        let req = read_request(&mut stream, 1024).unwrap();
        assert_eq!(req.body, b"abc");
        assert!(stream.output.is_empty());
    }

    #[test]
    fn oversized_expect_continue_gets_no_interim_response() {
        let raw = b"POST / HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4096\r\n\r\n";
        let mut stream = Duplex::new(raw);
        let err = read_request(&mut stream, 1024).unwrap_err();
        assert_eq!(err.status, 413);
        assert!(stream.output.is_empty());
    }

    #[test]
    fn response_has_status_line_and_length() {
        let mut out = Vec::new();
        write_json_response(&mut out, 405, &serde_json::json!({"success": false})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
        assert!(text.contains("Content-Length: 17\r\n"));
        assert!(text.ends_with("{\"success\":false}"));
    }
}
