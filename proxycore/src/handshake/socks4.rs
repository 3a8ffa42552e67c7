// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use super::HandshakeError;
use crate::net::{read_exact_timed, write_all_timed, NonBlockingSocket};
use crate::resolve::{AddressFamily, Resolver};
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

const REQUEST_GRANTED: u8 = 0x5A;

/// SOCKS4 CONNECT, per spec.md §4.3.1.
///
/// SOCKS4a's `0.0.0.x` hostname-extension trick is not used: `dest_host` is
/// always resolved to a literal IPv4 address before the request is built,
/// matching the documented limitation in the source tool.
pub fn socks4_connect<S: NonBlockingSocket>(
  sock: &mut S,
  resolver: &dyn Resolver,
  dest_host: &str,
  dest_port: u16,
  username: Option<&str>,
  timeout: Duration,
) -> Result<(), HandshakeError> {
  let ip = resolve_ipv4(resolver, dest_host, dest_port)?;

  let mut request = Vec::with_capacity(9 + username.map(str::len).unwrap_or(0));
  request.push(0x04);
  request.push(0x01);
  request.extend_from_slice(&dest_port.to_be_bytes());
  request.extend_from_slice(&ip.octets());
  if let Some(user) = username {
    if !user.is_empty() {
      request.extend_from_slice(user.as_bytes());
    }
  }
  request.push(0x00);

  write_all_timed(sock, &request, timeout)?;

  let reply = read_exact_timed(sock, 8, timeout)?;
  if reply[0] == 0 && reply[1] == REQUEST_GRANTED {
    Ok(())
  } else {
    Err(HandshakeError::Rejected(reply[1] as u16))
  }
}

fn resolve_ipv4(resolver: &dyn Resolver, dest_host: &str, dest_port: u16) -> Result<Ipv4Addr, HandshakeError> {
  if let Ok(ip) = dest_host.parse::<Ipv4Addr>() {
    return Ok(ip);
  }
  match resolver.resolve(dest_host, dest_port, AddressFamily::Inet)? {
    SocketAddr::V4(v4) => Ok(*v4.ip()),
    SocketAddr::V6(_) => Err(HandshakeError::ResolveError(format!(
      "{} resolved to an IPv6 address; SOCKS4 requires IPv4",
      dest_host
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::fake::FakeSocket;
  use crate::resolve::ResolveError;

  struct NoopResolver;
  impl Resolver for NoopResolver {
    fn resolve(&self, host: &str, _port: u16, _family: AddressFamily) -> Result<SocketAddr, ResolveError> {
      Err(ResolveError(format!("unexpected DNS lookup for {}", host)))
    }
  }

  #[test]
  fn writes_expected_bytes_with_literal_ipv4_and_userid() {
    let mut sock = FakeSocket::new(&[0x00, REQUEST_GRANTED, 0, 0, 0, 0, 0, 0]);
    let result = socks4_connect(&mut sock, &NoopResolver, "198.51.100.9", 6667, Some("alice"), Duration::from_secs(1));
    assert!(result.is_ok());
    let mut expected = vec![0x04, 0x01, 0x1A, 0x0B, 198, 51, 100, 9];
    expected.extend_from_slice(b"alice");
    expected.push(0x00);
    assert_eq!(sock.written, expected);
  }

  #[test]
  fn rejection_surfaces_the_status_byte() {
    let mut sock = FakeSocket::new(&[0x00, 0x5B, 0, 0, 0, 0, 0, 0]);
    let err = socks4_connect(&mut sock, &NoopResolver, "198.51.100.9", 1080, None, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::Rejected(0x5B));
  }

  #[test]
  fn short_reply_is_peer_closed() {
    let mut sock = FakeSocket::new(&[0x00, REQUEST_GRANTED]);
    let err = socks4_connect(&mut sock, &NoopResolver, "198.51.100.9", 1080, None, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::PeerClosed);
  }
}
