// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use crate::config::DialTimeouts;
use crate::handshake::{http_connect, socks4_connect, socks5_connect, HandshakeError};
use crate::net::{NonBlockingSocket, SocketFactory};
use crate::resolve::Resolver;
use crate::types::{Proxy, ProxyType};

#[derive(thiserror::Error, Debug)]
pub enum DialError {
  #[error("connect to proxy timed out")]
  ConnectTimeout,
  #[error("proxy refused the connection (errno {0})")]
  ConnectRefused(i32),
  #[error("I/O error: {0}")]
  IoError(String),
  #[error(transparent)]
  Handshake(#[from] HandshakeError),
}

impl From<std::io::Error> for DialError {
  fn from(e: std::io::Error) -> Self {
    DialError::IoError(e.to_string())
  }
}

/// Dials a destination through one proxy: non-blocking connect with a
/// bounded timeout, then the protocol handshake in spec.md §4.3 selected by
/// `proxy.declared_type`. On any failure the socket is dropped (closing the
/// underlying fd); on success the caller gets back a socket positioned
/// right after the handshake, ready for application traffic.
pub struct Dialer<F: SocketFactory, R: Resolver> {
  factory: F,
  resolver: R,
  timeouts: DialTimeouts,
}

impl<F: SocketFactory, R: Resolver> Dialer<F, R> {
  pub fn new(factory: F, resolver: R, timeouts: DialTimeouts) -> Self {
    Self { factory, resolver, timeouts }
  }

  pub fn dial(&self, proxy: &Proxy, dest_host: &str, dest_port: u16) -> Result<F::Socket, DialError> {
    let mut sock = self.factory.connect(proxy.resolved_addr)?;

    let ready = sock.wait_writable(self.timeouts.connect_timeout)?;
    if !ready {
      return Err(DialError::ConnectTimeout);
    }
    if let Some(err) = sock.take_error()? {
      return Err(DialError::ConnectRefused(err.raw_os_error().unwrap_or(0)));
    }

    self.handshake(&mut sock, proxy, dest_host, dest_port)?;
    Ok(sock)
  }

  fn handshake(&self, sock: &mut F::Socket, proxy: &Proxy, dest_host: &str, dest_port: u16) -> Result<(), HandshakeError> {
    match proxy.declared_type {
      ProxyType::Socks4 => socks4_connect(sock, &self.resolver, dest_host, dest_port, proxy.username.as_deref(), self.timeouts.handshake_timeout),
      ProxyType::Socks5 => {
        socks5_connect(sock, dest_host, dest_port, proxy.username.as_deref(), proxy.password.as_deref(), self.timeouts.handshake_timeout)
      }
      ProxyType::Http | ProxyType::Https | ProxyType::None => {
        http_connect(sock, dest_host, dest_port, proxy.username.as_deref(), proxy.password.as_deref(), self.timeouts.handshake_timeout)
      }
    }
  }
}
