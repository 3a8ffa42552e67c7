// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use super::HandshakeError;
use crate::net::{read_exact_timed, write_all_timed, NonBlockingSocket};
use base64::Engine;
use std::time::Duration;

/// The response is read one byte at a time until this sentinel appears, or
/// until the buffer below is exhausted — per spec.md §4.3.3. Bytes a
/// pipelining proxy sends immediately after the response are out of scope
/// (see DESIGN.md Open Questions).
const RESPONSE_TERMINATOR: &[u8] = b"\r\n\r\n";
const MAX_RESPONSE_BYTES: usize = 2047;

/// HTTP CONNECT tunnel establishment, with optional Basic proxy
/// authentication, per spec.md §4.3.3.
pub fn http_connect<S: NonBlockingSocket>(
  sock: &mut S,
  dest_host: &str,
  dest_port: u16,
  username: Option<&str>,
  password: Option<&str>,
  timeout: Duration,
) -> Result<(), HandshakeError> {
  let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n", host = dest_host, port = dest_port);
  if let (Some(user), Some(pass)) = (username, password) {
    if !user.is_empty() && !pass.is_empty() {
      let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", user, pass));
      request.push_str(&format!("Proxy-Authorization: Basic {}\r\n", encoded));
    }
  }
  request.push_str("\r\n");

  write_all_timed(sock, request.as_bytes(), timeout)?;

  let response = read_response_until_terminator(sock, timeout)?;
  let status = parse_status_code(&response)?;
  if status == 200 {
    Ok(())
  } else {
    Err(HandshakeError::Rejected(status))
  }
}

fn read_response_until_terminator<S: NonBlockingSocket>(sock: &mut S, timeout: Duration) -> Result<Vec<u8>, HandshakeError> {
  let mut buf = Vec::with_capacity(256);
  loop {
    if buf.len() >= MAX_RESPONSE_BYTES {
      return Err(HandshakeError::IoError("HTTP CONNECT response exceeded buffer".into()));
    }
    let byte = read_exact_timed(sock, 1, timeout)?;
    buf.push(byte[0]);
    if buf.ends_with(RESPONSE_TERMINATOR) {
      return Ok(buf);
    }
  }
}

fn parse_status_code(response: &[u8]) -> Result<u16, HandshakeError> {
  let text = String::from_utf8_lossy(response);
  let status_line = text
    .lines()
    .next()
    .ok_or_else(|| HandshakeError::IoError("empty HTTP response".into()))?;
  if !status_line.starts_with("HTTP/1.") {
    return Err(HandshakeError::IoError(format!("malformed HTTP status line: {}", status_line)));
  }
  let code = status_line
    .split_whitespace()
    .nth(1)
    .ok_or_else(|| HandshakeError::IoError("missing HTTP status code".into()))?;
  if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
    return Err(HandshakeError::IoError(format!("malformed HTTP status code: {}", code)));
  }
  code.parse::<u16>().map_err(|_| HandshakeError::IoError("malformed HTTP status code".into()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::fake::FakeSocket;

  #[test]
  fn basic_auth_header_matches_fixture() {
    let mut sock = FakeSocket::new(b"HTTP/1.1 200 OK\r\n\r\n");
    http_connect(&mut sock, "example.org", 443, Some("a"), Some("b"), Duration::from_secs(1)).unwrap();
    let written = String::from_utf8(sock.written).unwrap();
    assert!(written.contains("Proxy-Authorization: Basic YTpi\r\n"));
    assert!(written.starts_with("CONNECT example.org:443 HTTP/1.1\r\n"));
  }

  #[test]
  fn non_200_status_is_rejected() {
    let mut sock = FakeSocket::new(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n");
    let err = http_connect(&mut sock, "example.org", 443, None, None, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::Rejected(407));
  }

  #[test]
  fn no_credentials_omits_auth_header() {
    let mut sock = FakeSocket::new(b"HTTP/1.1 200 OK\r\n\r\n");
    http_connect(&mut sock, "example.org", 80, None, None, Duration::from_secs(1)).unwrap();
    let written = String::from_utf8(sock.written).unwrap();
    assert!(!written.contains("Proxy-Authorization"));
  }
}
