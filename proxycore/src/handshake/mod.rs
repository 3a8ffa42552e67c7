// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
pub mod http_connect;
pub mod socks4;
pub mod socks5;

pub use http_connect::http_connect;
pub use socks4::socks4_connect;
pub use socks5::socks5_connect;

/// Errors from the handshake engine's framed timed I/O and from protocol-
/// level refusals, per spec.md §7. `Rejected` carries the SOCKS reply code
/// or the HTTP status as a `u16` uniformly.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
  #[error("operation timed out")]
  Timeout,
  #[error("peer closed the connection")]
  PeerClosed,
  #[error("I/O error: {0}")]
  IoError(String),
  #[error("destination resolution failed: {0}")]
  ResolveError(String),
  #[error("proxy rejected the request (code {0})")]
  Rejected(u16),
  #[error("proxy authentication failed")]
  AuthFailed,
  #[error("no acceptable authentication method offered by proxy")]
  NoAcceptableMethod,
}

impl From<crate::resolve::ResolveError> for HandshakeError {
  fn from(e: crate::resolve::ResolveError) -> Self {
    HandshakeError::ResolveError(e.0)
  }
}
