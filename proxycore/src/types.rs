// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::net::SocketAddr;

/// Declared or detected proxy protocol. `None` means "unspecified" — the
/// caller's default applies at parse time, and auto-detection applies at
/// validation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProxyType {
  None,
  Http,
  Https,
  Socks4,
  Socks5,
}

impl ProxyType {
  /// The URL scheme this type is saved under, empty for [`ProxyType::None`].
  pub fn scheme(&self) -> &'static str {
    match self {
      ProxyType::None => "",
      ProxyType::Http => "http",
      ProxyType::Https => "https",
      ProxyType::Socks4 => "socks4",
      ProxyType::Socks5 => "socks5",
    }
  }

  pub fn from_scheme(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "http" => Some(ProxyType::Http),
      "https" => Some(ProxyType::Https),
      "socks4" => Some(ProxyType::Socks4),
      "socks5" => Some(ProxyType::Socks5),
      _ => None,
    }
  }
}

/// One upstream relay, as described by spec.md §3.
///
/// Created by the parser, mutated only by the validator (validation-state
/// fields) and the dialer (may flip `is_active` false on a dead proxy),
/// destroyed only through [`crate::pool::Pool`]'s removal path.
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
  pub host: String,
  pub port: u16,
  pub username: Option<String>,
  pub password: Option<String>,
  pub declared_type: ProxyType,
  pub resolved_addr: SocketAddr,

  pub validated: bool,
  pub is_active: bool,
  pub detected_type: ProxyType,
  pub last_rtt_ms: u64,
  pub has_auth: bool,
}

impl Proxy {
  pub fn is_ipv6(&self) -> bool {
    self.resolved_addr.is_ipv6()
  }

  /// Resets validation-state fields to their pre-validation values, matching
  /// the invariant `¬validated ⇒ is_active = false ∧ detected_type = NONE ∧
  /// last_rtt_ms = 0` from spec.md §3. Freshly parsed proxies do not go
  /// through this path — see the `next()` policy decision in DESIGN.md for
  /// why they start `is_active = true` instead.
  pub fn mark_unvalidated(&mut self) {
    self.validated = false;
    self.is_active = false;
    self.detected_type = ProxyType::None;
    self.last_rtt_ms = 0;
  }
}
