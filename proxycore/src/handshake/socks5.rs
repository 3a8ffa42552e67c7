// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use super::HandshakeError;
use crate::net::{read_exact_timed, write_all_timed, NonBlockingSocket};
use std::time::Duration;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_NONE_ACCEPTABLE: u8 = 0xFF;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// SOCKS5 CONNECT per RFC 1928 (and RFC 1929 for username/password auth),
/// implementing the GREET → AUTH → REQUEST → READ_BND state machine from
/// spec.md §4.3.2.
///
/// The REQUEST always uses ATYP=DOMAINNAME, even when the caller already
/// holds a resolved IP for the destination — preserved for wire-byte
/// compatibility with the fixtures in spec.md §8 (see DESIGN.md).
pub fn socks5_connect<S: NonBlockingSocket>(
  sock: &mut S,
  dest_host: &str,
  dest_port: u16,
  username: Option<&str>,
  password: Option<&str>,
  timeout: Duration,
) -> Result<(), HandshakeError> {
  let creds = eligible_credentials(username, password);

  greet(sock, creds.is_some(), timeout)?;

  let selected = read_exact_timed(sock, 2, timeout)?;
  if selected[0] != VERSION {
    return Err(HandshakeError::IoError("unexpected SOCKS version in method selection".into()));
  }
  match selected[1] {
    METHOD_USER_PASS => {
      let (user, pass) = creds.ok_or(HandshakeError::NoAcceptableMethod)?;
      authenticate(sock, user, pass, timeout)?;
    }
    METHOD_NO_AUTH => {}
    METHOD_NONE_ACCEPTABLE => return Err(HandshakeError::NoAcceptableMethod),
    _ => return Err(HandshakeError::IoError("unrecognized SOCKS5 method selection".into())),
  }

  request_connect(sock, dest_host, dest_port, timeout)
}

/// Credentials are eligible for SOCKS5 auth only when both are 1..255 bytes;
/// empty credentials silently downgrade to no-auth, per spec.md §4.3.2.
fn eligible_credentials<'a>(username: Option<&'a str>, password: Option<&'a str>) -> Option<(&'a str, &'a str)> {
  match (username, password) {
    (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() && u.len() <= 255 && p.len() <= 255 => Some((u, p)),
    _ => None,
  }
}

fn greet<S: NonBlockingSocket>(sock: &mut S, offer_auth: bool, timeout: Duration) -> Result<(), HandshakeError> {
  let methods: &[u8] = if offer_auth { &[METHOD_NO_AUTH, METHOD_USER_PASS] } else { &[METHOD_NO_AUTH] };
  let mut greeting = Vec::with_capacity(2 + methods.len());
  greeting.push(VERSION);
  greeting.push(methods.len() as u8);
  greeting.extend_from_slice(methods);
  write_all_timed(sock, &greeting, timeout)
}

fn authenticate<S: NonBlockingSocket>(sock: &mut S, user: &str, pass: &str, timeout: Duration) -> Result<(), HandshakeError> {
  let mut request = Vec::with_capacity(3 + user.len() + pass.len());
  request.push(0x01);
  request.push(user.len() as u8);
  request.extend_from_slice(user.as_bytes());
  request.push(pass.len() as u8);
  request.extend_from_slice(pass.as_bytes());
  write_all_timed(sock, &request, timeout)?;

  let reply = read_exact_timed(sock, 2, timeout)?;
  if reply[1] == 0x00 {
    Ok(())
  } else {
    Err(HandshakeError::AuthFailed)
  }
}

fn request_connect<S: NonBlockingSocket>(sock: &mut S, dest_host: &str, dest_port: u16, timeout: Duration) -> Result<(), HandshakeError> {
  let host_bytes = dest_host.as_bytes();
  if host_bytes.len() > 255 {
    return Err(HandshakeError::IoError("destination hostname too long for SOCKS5 DOMAINNAME".into()));
  }
  let mut request = Vec::with_capacity(7 + host_bytes.len());
  request.extend_from_slice(&[VERSION, 0x01, 0x00, ATYP_DOMAIN, host_bytes.len() as u8]);
  request.extend_from_slice(host_bytes);
  request.extend_from_slice(&dest_port.to_be_bytes());
  write_all_timed(sock, &request, timeout)?;

  let header = read_exact_timed(sock, 4, timeout)?;
  if header[0] != VERSION {
    return Err(HandshakeError::IoError("unexpected SOCKS version in reply".into()));
  }
  if header[1] != 0x00 {
    return Err(HandshakeError::Rejected(header[1] as u16));
  }

  // Drain BND.ADDR/BND.PORT so the socket is left clean for tunneled traffic.
  let tail_len = match header[3] {
    ATYP_IPV4 => 4 + 2,
    ATYP_IPV6 => 16 + 2,
    ATYP_DOMAIN => {
      let len = read_exact_timed(sock, 1, timeout)?;
      len[0] as usize + 2
    }
    other => return Err(HandshakeError::IoError(format!("unsupported ATYP {} in reply", other))),
  };
  read_exact_timed(sock, tail_len, timeout)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::fake::FakeSocket;

  #[test]
  fn no_auth_connect_matches_fixture_bytes() {
    let mut server_bytes = vec![0x05, 0x00];
    server_bytes.extend_from_slice(&[0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
    let mut sock = FakeSocket::new(&server_bytes);
    socks5_connect(&mut sock, "example.org", 6667, None, None, Duration::from_secs(1)).unwrap();

    let mut expected = vec![0x05, 0x01, 0x00];
    expected.extend_from_slice(&[0x05, 0x01, 0x00, 0x03, 0x0B]);
    expected.extend_from_slice(b"example.org");
    expected.extend_from_slice(&6667u16.to_be_bytes());
    assert_eq!(sock.written, expected);
  }

  #[test]
  fn auth_offered_when_credentials_present() {
    let mut server_bytes = vec![0x05, 0x02, 0x01, 0x00];
    server_bytes.extend_from_slice(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    let mut sock = FakeSocket::new(&server_bytes);
    socks5_connect(&mut sock, "example.org", 80, Some("u"), Some("p"), Duration::from_secs(1)).unwrap();
    assert_eq!(sock.written[..5], [0x05, 0x02, 0x00, 0x02, 0x01]);
  }

  #[test]
  fn auth_failure_is_terminal() {
    let server_bytes = vec![0x05, 0x02, 0x01, 0x01];
    let mut sock = FakeSocket::new(&server_bytes);
    let err = socks5_connect(&mut sock, "example.org", 80, Some("u"), Some("p"), Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::AuthFailed);
  }

  #[test]
  fn no_acceptable_method_is_terminal() {
    let server_bytes = vec![0x05, 0xFF];
    let mut sock = FakeSocket::new(&server_bytes);
    let err = socks5_connect(&mut sock, "example.org", 80, None, None, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::NoAcceptableMethod);
  }

  #[test]
  fn request_rejected_surfaces_code() {
    let mut server_bytes = vec![0x05, 0x00];
    server_bytes.extend_from_slice(&[0x05, 0x02, 0x00, 0x01]);
    let mut sock = FakeSocket::new(&server_bytes);
    let err = socks5_connect(&mut sock, "example.org", 80, None, None, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::Rejected(0x02));
  }

  #[test]
  fn empty_credentials_downgrade_to_no_auth() {
    let mut server_bytes = vec![0x05, 0x00];
    server_bytes.extend_from_slice(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    let mut sock = FakeSocket::new(&server_bytes);
    socks5_connect(&mut sock, "example.org", 80, Some(""), Some(""), Duration::from_secs(1)).unwrap();
    assert_eq!(sock.written[..3], [0x05, 0x01, 0x00]);
  }
}
