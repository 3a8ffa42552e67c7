// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
mod mio_socket;

pub use mio_socket::{MioSocket, MioSocketFactory};

use crate::handshake::HandshakeError;
use std::io;
use std::time::{Duration, Instant};

/// A connected, non-blocking stream socket. Implementors back the framed
/// timed I/O primitive (spec.md §4.3.4): `try_read`/`try_write` behave like
/// the raw non-blocking syscalls (returning `WouldBlock` when not ready),
/// and `wait_readable`/`wait_writable` block the calling thread up to
/// `timeout` for readiness, returning `Ok(false)` on expiry rather than an
/// error so callers can distinguish "timed out" from "syscall failed".
pub trait NonBlockingSocket {
  fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
  fn try_write(&mut self, buf: &[u8]) -> io::Result<usize>;
  fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool>;
  fn wait_writable(&mut self, timeout: Duration) -> io::Result<bool>;
  /// `SO_ERROR`: Some(err) if the socket completed a failed async connect.
  fn take_error(&self) -> io::Result<Option<io::Error>>;
}

/// Produces connected, non-blocking sockets of the correct address family —
/// the "socket factory" collaborator from spec.md §1.
pub trait SocketFactory {
  type Socket: NonBlockingSocket;

  fn connect(&self, addr: std::net::SocketAddr) -> io::Result<Self::Socket>;
}

pub(crate) fn is_transient(e: &io::Error) -> bool {
  matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted)
}

/// Reads exactly `n` bytes, bounded by `timeout` for the *whole* operation —
/// each readiness wait is given the remaining budget, not the original, so a
/// handshake cannot be starved by a peer that trickles one byte per poll
/// interval forever. Loops over partial reads; treats a zero-byte read as
/// peer close unless the full count was already satisfied.
pub fn read_exact_timed<S: NonBlockingSocket + ?Sized>(
  sock: &mut S,
  n: usize,
  timeout: Duration,
) -> Result<Vec<u8>, HandshakeError> {
  let mut buf = vec![0u8; n];
  let mut filled = 0;
  let deadline = Instant::now() + timeout;
  while filled < n {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
      return Err(HandshakeError::Timeout);
    }
    let ready = sock.wait_readable(remaining).map_err(|e| HandshakeError::IoError(e.to_string()))?;
    if !ready {
      return Err(HandshakeError::Timeout);
    }
    match sock.try_read(&mut buf[filled..]) {
      Ok(0) => return Err(HandshakeError::PeerClosed),
      Ok(k) => filled += k,
      Err(e) if is_transient(&e) => continue,
      Err(e) => return Err(HandshakeError::IoError(e.to_string())),
    }
  }
  Ok(buf)
}

/// Writes all of `buf`, with the same remaining-budget timeout semantics as
/// [`read_exact_timed`].
pub fn write_all_timed<S: NonBlockingSocket + ?Sized>(sock: &mut S, buf: &[u8], timeout: Duration) -> Result<(), HandshakeError> {
  let mut written = 0;
  let deadline = Instant::now() + timeout;
  while written < buf.len() {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
      return Err(HandshakeError::Timeout);
    }
    let ready = sock.wait_writable(remaining).map_err(|e| HandshakeError::IoError(e.to_string()))?;
    if !ready {
      return Err(HandshakeError::Timeout);
    }
    match sock.try_write(&buf[written..]) {
      Ok(0) => return Err(HandshakeError::PeerClosed),
      Ok(k) => written += k,
      Err(e) if is_transient(&e) => continue,
      Err(e) => return Err(HandshakeError::IoError(e.to_string())),
    }
  }
  Ok(())
}

#[cfg(test)]
pub(crate) mod fake {
  use super::*;
  use std::collections::VecDeque;

  /// A scripted in-memory socket for exercising the handshake state
  /// machines without real sockets. `to_read` is consumed byte-by-byte (or
  /// in larger chunks, honoring the caller's buffer size) and `written`
  /// records every byte handed to `try_write`, in order.
  pub struct FakeSocket {
    to_read: VecDeque<u8>,
    pub written: Vec<u8>,
    pub always_would_block_reads: bool,
  }

  impl FakeSocket {
    pub fn new(server_bytes: &[u8]) -> Self {
      Self {
        to_read: server_bytes.iter().copied().collect(),
        written: Vec::new(),
        always_would_block_reads: false,
      }
    }

    pub fn stalled() -> Self {
      Self {
        to_read: VecDeque::new(),
        written: Vec::new(),
        always_would_block_reads: true,
      }
    }
  }

  impl NonBlockingSocket for FakeSocket {
    fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
      if self.always_would_block_reads {
        return Err(io::Error::from(io::ErrorKind::WouldBlock));
      }
      if self.to_read.is_empty() {
        return Ok(0);
      }
      let n = buf.len().min(self.to_read.len());
      for slot in buf.iter_mut().take(n) {
        *slot = self.to_read.pop_front().unwrap();
      }
      Ok(n)
    }

    fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
      self.written.extend_from_slice(buf);
      Ok(buf.len())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
      Ok(!self.always_would_block_reads)
    }

    fn wait_writable(&mut self, _timeout: Duration) -> io::Result<bool> {
      Ok(true)
    }

    fn take_error(&self) -> io::Result<Option<io::Error>> {
      Ok(None)
    }
  }

  /// A socket whose readiness waits always time out — for exercising the
  /// timeout-bound property against a hung proxy.
  pub struct NeverReadySocket;

  impl NonBlockingSocket for NeverReadySocket {
    fn try_read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
      Err(io::Error::from(io::ErrorKind::WouldBlock))
    }
    fn try_write(&mut self, _buf: &[u8]) -> io::Result<usize> {
      Err(io::Error::from(io::ErrorKind::WouldBlock))
    }
    fn wait_readable(&mut self, _timeout: Duration) -> io::Result<bool> {
      Ok(false)
    }
    fn wait_writable(&mut self, _timeout: Duration) -> io::Result<bool> {
      Ok(false)
    }
    fn take_error(&self) -> io::Result<Option<io::Error>> {
      Ok(None)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::fake::{FakeSocket, NeverReadySocket};
  use super::*;

  #[test]
  fn read_exact_timed_times_out_against_a_hung_socket() {
    let mut sock = NeverReadySocket;
    let err = read_exact_timed(&mut sock, 4, Duration::from_millis(50)).unwrap_err();
    assert_eq!(err, HandshakeError::Timeout);
  }

  #[test]
  fn write_all_timed_times_out_against_a_hung_socket() {
    let mut sock = NeverReadySocket;
    let err = write_all_timed(&mut sock, b"hello", Duration::from_millis(50)).unwrap_err();
    assert_eq!(err, HandshakeError::Timeout);
  }

  #[test]
  fn read_exact_timed_reports_peer_closed_on_short_stream() {
    let mut sock = FakeSocket::new(&[0x01, 0x02]);
    let err = read_exact_timed(&mut sock, 4, Duration::from_secs(1)).unwrap_err();
    assert_eq!(err, HandshakeError::PeerClosed);
  }

  #[test]
  fn read_exact_timed_loops_over_partial_reads() {
    let mut sock = FakeSocket::new(&[1, 2, 3, 4, 5]);
    let buf = read_exact_timed(&mut sock, 5, Duration::from_secs(1)).unwrap();
    assert_eq!(buf, vec![1, 2, 3, 4, 5]);
  }
}
