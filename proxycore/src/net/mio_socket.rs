// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use super::{NonBlockingSocket, SocketFactory};
use mio::net::TcpStream as MioTcpStream;
use mio::{Events, Interest, Poll, Token};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

const TOKEN: Token = Token(0);

/// A non-blocking TCP socket backed by `mio`, with a dedicated single-socket
/// [`Poll`] used only for readiness waits. This is the production
/// implementation of [`NonBlockingSocket`] — the layer at which spec.md
/// §4.3.4's readiness-poll-with-remaining-budget primitive is meant to
/// operate, below any async runtime abstraction.
pub struct MioSocket {
  poll: Poll,
  events: Events,
  stream: MioTcpStream,
}

impl MioSocket {
  pub fn connect(addr: SocketAddr) -> io::Result<Self> {
    let mut stream = MioTcpStream::connect(addr)?;
    let poll = Poll::new()?;
    poll
      .registry()
      .register(&mut stream, TOKEN, Interest::READABLE | Interest::WRITABLE)?;
    Ok(Self { poll, events: Events::with_capacity(4), stream })
  }

  fn wait(&mut self, interest: Interest, timeout: Duration) -> io::Result<bool> {
    self.poll.poll(&mut self.events, Some(timeout))?;
    Ok(self.events.iter().any(|ev| {
      ev.token() == TOKEN && ((interest.is_readable() && ev.is_readable()) || (interest.is_writable() && ev.is_writable()))
    }))
  }
}

impl NonBlockingSocket for MioSocket {
  fn try_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.stream.read(buf)
  }

  fn try_write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.stream.write(buf)
  }

  fn wait_readable(&mut self, timeout: Duration) -> io::Result<bool> {
    self.wait(Interest::READABLE, timeout)
  }

  fn wait_writable(&mut self, timeout: Duration) -> io::Result<bool> {
    self.wait(Interest::WRITABLE, timeout)
  }

  fn take_error(&self) -> io::Result<Option<io::Error>> {
    self.stream.take_error()
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MioSocketFactory;

impl SocketFactory for MioSocketFactory {
  type Socket = MioSocket;

  fn connect(&self, addr: SocketAddr) -> io::Result<MioSocket> {
    MioSocket::connect(addr)
  }
}
