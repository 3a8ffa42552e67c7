// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("DNS resolution failed: {0}")]
pub struct ResolveError(pub String);

/// Address family restriction applied during resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
  Unspec,
  Inet,
  Inet6,
}

impl AddressFamily {
  fn accepts(&self, addr: &SocketAddr) -> bool {
    match self {
      AddressFamily::Unspec => true,
      AddressFamily::Inet => addr.is_ipv4(),
      AddressFamily::Inet6 => addr.is_ipv6(),
    }
  }
}

/// Performs the one synchronous, fallible name lookup the parser and the
/// SOCKS4 handshake both need. Abstracted behind a trait so tests can
/// substitute a scripted resolver instead of touching a real DNS resolver.
///
/// TODO: a purpose-built async resolver would let the parser stop blocking
/// the caller's thread; kept synchronous for now since this mirrors the
/// single call site the original tool made per proxy-list entry.
pub trait Resolver {
  fn resolve(&self, host: &str, port: u16, family: AddressFamily) -> Result<SocketAddr, ResolveError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdResolver;

impl Resolver for StdResolver {
  fn resolve(&self, host: &str, port: u16, family: AddressFamily) -> Result<SocketAddr, ResolveError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
      let candidate = SocketAddr::new(ip, port);
      if family.accepts(&candidate) {
        return Ok(candidate);
      }
      return Err(ResolveError(format!(
        "literal address {} does not match requested address family",
        host
      )));
    }

    let addrs = (host, port)
      .to_socket_addrs()
      .map_err(|e| ResolveError(format!("{}: {}", host, e)))?;
    addrs
      .filter(|addr| family.accepts(addr))
      .next()
      .ok_or_else(|| ResolveError(format!("{}: no address of the requested family", host)))
  }
}
