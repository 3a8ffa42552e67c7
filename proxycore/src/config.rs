// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use std::time::Duration;

pub const CONCURRENCY_RANGE: std::ops::RangeInclusive<usize> = 1..=128;
pub const TIMEOUT_MS_RANGE: std::ops::RangeInclusive<u64> = 100..=60_000;
pub const TEST_PORT_RANGE: std::ops::RangeInclusive<u16> = 1..=65535;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_TEST_HOST: &str = "irc.libera.chat";
pub const DEFAULT_TEST_PORT: u16 = 6667;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for a validation sweep, per spec.md §4.5/§6. Constructors
/// clamp out-of-range input rather than reject it, matching the CLI verb
/// table's documented parameter ranges.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
  pub concurrency: usize,
  pub timeout: Duration,
  pub test_host: String,
  pub test_port: u16,
}

impl ValidatorConfig {
  pub fn new(concurrency: usize, timeout_ms: u64, test_host: impl Into<String>, test_port: u16) -> Self {
    Self {
      concurrency: concurrency.clamp(*CONCURRENCY_RANGE.start(), *CONCURRENCY_RANGE.end()),
      timeout: Duration::from_millis(timeout_ms.clamp(*TIMEOUT_MS_RANGE.start(), *TIMEOUT_MS_RANGE.end())),
      test_host: test_host.into(),
      test_port: test_port.clamp(*TEST_PORT_RANGE.start(), *TEST_PORT_RANGE.end()),
    }
  }
}

impl Default for ValidatorConfig {
  fn default() -> Self {
    Self::new(DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_MS, DEFAULT_TEST_HOST, DEFAULT_TEST_PORT)
  }
}

/// Timeouts the dialer applies per spec.md §4.4: a connect-readiness budget
/// and a separate per-handshake budget.
#[derive(Debug, Clone, Copy)]
pub struct DialTimeouts {
  pub connect_timeout: Duration,
  pub handshake_timeout: Duration,
}

impl Default for DialTimeouts {
  fn default() -> Self {
    Self { connect_timeout: DEFAULT_CONNECT_TIMEOUT, handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT }
  }
}
