// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use crate::resolve::{AddressFamily, ResolveError, Resolver};
use crate::types::{Proxy, ProxyType};

/// Lines longer than this are truncated before parsing, per spec.md §4.1/§6.
pub const MAX_LINE_LEN: usize = 512;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
  /// Blank line or a `#` comment; the caller should skip it silently.
  #[error("blank or comment line")]
  Empty,
  #[error("line has fewer than two colon-separated fields")]
  TooFewFields,
  #[error("unbalanced '[' in host token")]
  UnbalancedBracket,
  #[error("unrecognized scheme")]
  UnknownScheme,
  #[error("port out of range")]
  InvalidPort,
  #[error("empty host")]
  EmptyHost,
  #[error(transparent)]
  Resolve(#[from] ResolveError),
}

/// Parses one proxy-list line into a canonical [`Proxy`], per the grammar in
/// spec.md §4.1. Blank lines and `#`-comments return [`ParseError::Empty`]
/// (reject silently, do not log). `default_type` applies when no
/// `scheme://` prefix is present.
///
/// Limitation preserved from the source tool: the credentials separator is
/// found via the *rightmost* `@`, so a password containing `@` cannot be
/// expressed in `USER:PASS@HOST:PORT` form (see DESIGN.md Open Questions).
pub fn parse_line(line: &str, default_type: ProxyType, resolver: &dyn Resolver) -> Result<Proxy, ParseError> {
  let line = if line.len() > MAX_LINE_LEN { &line[..MAX_LINE_LEN] } else { line };
  let line = line.trim_end_matches(['\r', '\n']).trim();
  if line.is_empty() || line.starts_with('#') {
    return Err(ParseError::Empty);
  }

  let (scheme, rest) = split_scheme(line);
  let declared_type = match scheme {
    Some(s) => ProxyType::from_scheme(s).ok_or(ParseError::UnknownScheme)?,
    None => default_type,
  };

  let rest = peel_wrapping_brackets(rest);

  let (cred_part, host_part) = match rest.rfind('@') {
    Some(idx) => (Some(&rest[..idx]), &rest[idx + 1..]),
    None => (None, rest),
  };

  let bracketed = host_part.starts_with('[');
  let (host, port, trailing) = parse_host_port(host_part)?;
  if host.trim().is_empty() {
    return Err(ParseError::EmptyHost);
  }

  let (username, password) = match cred_part {
    Some(cred) => split_credentials(cred),
    None => match trailing {
      Some(trailing) => split_credentials(&trailing),
      None => (None, None),
    },
  };

  let family = if bracketed { AddressFamily::Inet6 } else { AddressFamily::Unspec };
  let resolved_addr = resolver.resolve(&host, port, family)?;

  Ok(Proxy {
    host,
    port,
    username,
    password,
    declared_type,
    resolved_addr,
    validated: false,
    // A freshly parsed, not-yet-validated proxy is presumed usable; see the
    // `next()` policy decision recorded in DESIGN.md.
    is_active: true,
    detected_type: ProxyType::None,
    last_rtt_ms: 0,
    has_auth: false,
  })
}

fn split_credentials(cred: &str) -> (Option<String>, Option<String>) {
  let mut parts = cred.splitn(2, ':');
  let user = parts.next().filter(|s| !s.trim().is_empty()).map(|s| s.to_string());
  let pass = parts.next().filter(|s| !s.trim().is_empty()).map(|s| s.to_string());
  // §3 invariant: password may be set only if username is set.
  let pass = user.as_ref().and_then(|_| pass);
  (user, pass)
}

/// Splits a leading `scheme://` prefix off, case-insensitively. Returns the
/// raw scheme text (not yet validated against the known set) and the
/// remainder of the line.
fn split_scheme(s: &str) -> (Option<&str>, &str) {
  if let Some(idx) = s.find("://") {
    let candidate = &s[..idx];
    if !candidate.is_empty() && candidate.chars().all(|c| c.is_ascii_alphanumeric()) {
      return (Some(candidate), &s[idx + 3..]);
    }
  }
  (None, s)
}

/// Peels one wrapping pair of brackets enclosing the entire token when an
/// `@` is present inside, per spec.md §4.1 (`[user:pass@[v6]:port]`).
fn peel_wrapping_brackets(s: &str) -> &str {
  if s.starts_with('[') && s.ends_with(']') {
    let inner = &s[1..s.len() - 1];
    if inner.contains('@') {
      return inner;
    }
  }
  s
}

/// Parses `HOST:PORT[:TRAILING]` or `[HOST]:PORT[:TRAILING]`, returning the
/// host, the port, and an optional trailing segment (`USER:PASS` for the
/// `HOST:PORT:USER:PASS` grammar form).
fn parse_host_port(s: &str) -> Result<(String, u16, Option<String>), ParseError> {
  if let Some(rest) = s.strip_prefix('[') {
    let close = rest.find(']').ok_or(ParseError::UnbalancedBracket)?;
    let host = rest[..close].to_string();
    let after = &rest[close + 1..];
    let after = after.strip_prefix(':').ok_or(ParseError::TooFewFields)?;
    let mut parts = after.splitn(2, ':');
    let port = parse_port(parts.next().ok_or(ParseError::TooFewFields)?)?;
    let trailing = parts.next().map(|s| s.to_string());
    Ok((host, port, trailing))
  } else {
    if !s.contains(':') {
      return Err(ParseError::TooFewFields);
    }
    let mut parts = s.splitn(2, ':');
    let host = parts.next().unwrap().to_string();
    let remainder = parts.next().ok_or(ParseError::TooFewFields)?;
    let mut parts = remainder.splitn(2, ':');
    let port = parse_port(parts.next().ok_or(ParseError::TooFewFields)?)?;
    let trailing = parts.next().map(|s| s.to_string());
    Ok((host, port, trailing))
  }
}

fn parse_port(s: &str) -> Result<u16, ParseError> {
  let trimmed = s.trim_end();
  if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
    return Err(ParseError::InvalidPort);
  }
  let value: u32 = trimmed.parse().map_err(|_| ParseError::InvalidPort)?;
  if value < 1 || value > 65535 {
    return Err(ParseError::InvalidPort);
  }
  Ok(value as u16)
}
