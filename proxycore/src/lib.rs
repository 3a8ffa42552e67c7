// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0

//! Proxy pool parsing, SOCKS4/SOCKS5/HTTP CONNECT dialing, and concurrent
//! validation for an IRC clone-bouncer's upstream proxy pool.
//!
//! Five collaborating pieces, leaves first: [`parse`] turns one text line
//! into a canonical [`types::Proxy`]; [`pool`] holds an ordered collection
//! of them with a round-robin cursor; [`handshake`] implements the three
//! wire protocols over an already-connected socket; [`dial`] performs the
//! non-blocking connect and orchestrates a handshake; [`validate`] runs a
//! concurrent reachability + auto-detection sweep over a [`pool::Pool`].

pub mod config;
pub mod dial;
pub mod handshake;
pub mod logging;
pub mod net;
pub mod parse;
pub mod pool;
pub mod resolve;
pub mod types;
pub mod validate;

pub use config::{DialTimeouts, ValidatorConfig};
pub use dial::{DialError, Dialer};
pub use logging::{Logger, TracingLogger};
pub use net::{MioSocket, MioSocketFactory, NonBlockingSocket, SocketFactory};
pub use parse::{parse_line, ParseError};
pub use pool::Pool;
pub use resolve::{AddressFamily, ResolveError, Resolver, StdResolver};
pub use types::{Proxy, ProxyType};
pub use validate::validate_pool;
