// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0
use crate::config::ValidatorConfig;
use crate::handshake::{http_connect, socks4_connect, socks5_connect, HandshakeError};
use crate::logging::Logger;
use crate::net::{NonBlockingSocket, SocketFactory};
use crate::pool::Pool;
use crate::resolve::Resolver;
use crate::types::{Proxy, ProxyType};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Stats {
  working: usize,
  removed: usize,
  per_protocol: HashMap<ProxyType, usize>,
}

/// Runs a concurrent reachability + protocol auto-detection sweep over
/// `pool`, per spec.md §4.5. Returns the working count, or `-1` if the pool
/// was empty at entry.
///
/// Workers are OS threads sharing a monotonic work-index counter. Each
/// worker claims an index, validates that one proxy to completion, and
/// writes only its own proxy's outcome fields — matching the "no two
/// workers ever touch the same Proxy" invariant from spec.md §5. Disjoint
/// mutable access to the shared snapshot is made safe with a `Mutex` per
/// proxy: because indices are claimed exclusively, every lock is
/// uncontended in practice, so this adds no real serialization beyond the
/// three named locks (index, stats, log) spec.md §5 calls for.
pub fn validate_pool<F, R>(pool: &mut Pool, factory: Arc<F>, resolver: Arc<R>, config: ValidatorConfig, logger: Arc<dyn Logger + Send + Sync>) -> i64
where
  F: SocketFactory + Send + Sync + 'static,
  F::Socket: Send,
  R: Resolver + Send + Sync + 'static,
{
  let n = pool.count();
  if n == 0 {
    return -1;
  }

  let snapshot = pool.take_snapshot();
  let proxies: Arc<Vec<Mutex<Proxy>>> = Arc::new(snapshot.into_iter().map(Mutex::new).collect());
  let index_lock = Arc::new(Mutex::new(0usize));
  let stats = Arc::new(Mutex::new(Stats::default()));
  let log_lock = Arc::new(Mutex::new(()));
  let config = Arc::new(config);

  let mut handles = Vec::with_capacity(config.concurrency);
  for _ in 0..config.concurrency {
    let proxies = Arc::clone(&proxies);
    let index_lock = Arc::clone(&index_lock);
    let stats = Arc::clone(&stats);
    let log_lock = Arc::clone(&log_lock);
    let factory = Arc::clone(&factory);
    let resolver = Arc::clone(&resolver);
    let config = Arc::clone(&config);
    let logger = Arc::clone(&logger);
    handles.push(thread::spawn(move || {
      worker(&proxies, &index_lock, &stats, &log_lock, factory.as_ref(), resolver.as_ref(), &config, logger.as_ref());
    }));
  }
  for handle in handles {
    let _ = handle.join();
  }

  let proxies = Arc::try_unwrap(proxies).expect("all validator workers joined before this point").into_iter();
  let working: Vec<Proxy> = proxies
    .map(|m| m.into_inner().expect("proxy mutex never poisoned"))
    .filter(|p| p.validated && p.is_active && p.detected_type != ProxyType::None)
    .collect();
  let working_count = working.len() as i64;
  pool.restore_from(working);

  let stats = stats.lock().expect("stats mutex never poisoned");
  logger.info(&format!(
    "validation complete: {} working, {} removed (socks5={}, socks4={}, http={}, https={})",
    stats.working,
    stats.removed,
    stats.per_protocol.get(&ProxyType::Socks5).copied().unwrap_or(0),
    stats.per_protocol.get(&ProxyType::Socks4).copied().unwrap_or(0),
    stats.per_protocol.get(&ProxyType::Http).copied().unwrap_or(0),
    stats.per_protocol.get(&ProxyType::Https).copied().unwrap_or(0),
  ));

  working_count
}

fn worker<F, R>(
  proxies: &Arc<Vec<Mutex<Proxy>>>,
  index_lock: &Mutex<usize>,
  stats: &Mutex<Stats>,
  log_lock: &Mutex<()>,
  factory: &F,
  resolver: &R,
  config: &ValidatorConfig,
  logger: &dyn Logger,
) where
  F: SocketFactory,
  R: Resolver,
{
  loop {
    let idx = {
      let mut next = index_lock.lock().expect("index mutex never poisoned");
      if *next >= proxies.len() {
        break;
      }
      let claimed = *next;
      *next += 1;
      claimed
    };

    let mut proxy = proxies[idx].lock().expect("proxy mutex never poisoned");
    let started = Instant::now();
    {
      let _guard = log_lock.lock().expect("log mutex never poisoned");
      logger.info(&format!("validating {}:{}", proxy.host, proxy.port));
    }

    let outcome = attempt_order_for(proxy.declared_type)
      .into_iter()
      .find_map(|attempt_type| attempt_once(factory, resolver, &proxy, attempt_type, config).ok().map(|rtt| (attempt_type, rtt)));

    let elapsed = started.elapsed();
    match outcome {
      Some((detected, rtt)) => {
        proxy.validated = true;
        proxy.is_active = true;
        proxy.detected_type = detected;
        proxy.last_rtt_ms = rtt.as_millis() as u64;
        proxy.has_auth = matches!(
          (proxy.username.as_deref(), proxy.password.as_deref()),
          (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        );

        {
          let mut stats = stats.lock().expect("stats mutex never poisoned");
          stats.working += 1;
          *stats.per_protocol.entry(detected).or_insert(0) += 1;
        }
        let _guard = log_lock.lock().expect("log mutex never poisoned");
        logger.success(&format!(
          "{}:{} OK as {:?} ({} ms, total {:?})",
          proxy.host,
          proxy.port,
          detected,
          rtt.as_millis(),
          elapsed
        ));
      }
      None => {
        proxy.mark_unvalidated();
        {
          let mut stats = stats.lock().expect("stats mutex never poisoned");
          stats.removed += 1;
        }
        let _guard = log_lock.lock().expect("log mutex never poisoned");
        logger.error(&format!("{}:{} removed after {:?}", proxy.host, proxy.port, elapsed));
      }
    }
  }
}

/// The two auto-detect policies from spec.md §4.5/§9, kept as separate
/// named code paths rather than folded into one loop with a one-element
/// array standing in for "declared type only".
fn attempt_order_for(declared: ProxyType) -> Vec<ProxyType> {
  match declared {
    ProxyType::None => vec![ProxyType::Socks5, ProxyType::Socks4, ProxyType::Http],
    other => vec![other],
  }
}

fn attempt_once<F, R>(factory: &F, resolver: &R, proxy: &Proxy, attempt_type: ProxyType, config: &ValidatorConfig) -> Result<Duration, HandshakeError>
where
  F: SocketFactory,
  R: Resolver,
{
  let connect_start = Instant::now();
  let mut sock = factory.connect(proxy.resolved_addr).map_err(|e| HandshakeError::IoError(e.to_string()))?;
  let ready = sock.wait_writable(config.timeout).map_err(|e| HandshakeError::IoError(e.to_string()))?;
  if !ready {
    return Err(HandshakeError::Timeout);
  }
  if let Some(err) = sock.take_error().map_err(|e| HandshakeError::IoError(e.to_string()))? {
    return Err(HandshakeError::IoError(err.to_string()));
  }
  let rtt = connect_start.elapsed();

  let result = match attempt_type {
    ProxyType::Socks4 => socks4_connect(&mut sock, resolver, &config.test_host, config.test_port, proxy.username.as_deref(), config.timeout),
    ProxyType::Socks5 => socks5_connect(&mut sock, &config.test_host, config.test_port, proxy.username.as_deref(), proxy.password.as_deref(), config.timeout),
    ProxyType::Http | ProxyType::Https => http_connect(&mut sock, &config.test_host, config.test_port, proxy.username.as_deref(), proxy.password.as_deref(), config.timeout),
    ProxyType::None => unreachable!("attempt_order_for never yields ProxyType::None"),
  };
  result.map(|_| rtt)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::net::fake::{FakeSocket, NeverReadySocket};
  use crate::resolve::StdResolver;
  use std::net::SocketAddr;

  struct ScriptedFactory {
    responses: Mutex<Vec<Vec<u8>>>,
  }

  impl SocketFactory for ScriptedFactory {
    type Socket = FakeSocket;
    fn connect(&self, _addr: SocketAddr) -> std::io::Result<FakeSocket> {
      let script = self.responses.lock().unwrap().pop().unwrap_or_default();
      Ok(FakeSocket::new(&script))
    }
  }

  struct HangingFactory;
  impl SocketFactory for HangingFactory {
    type Socket = NeverReadySocket;
    fn connect(&self, _addr: SocketAddr) -> std::io::Result<NeverReadySocket> {
      Ok(NeverReadySocket)
    }
  }

  fn socks5_ok_bytes() -> Vec<u8> {
    let mut bytes = vec![0x05, 0x00];
    bytes.extend_from_slice(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0]);
    bytes
  }

  fn proxy_with(host: &str, port: u16, declared: ProxyType) -> Proxy {
    Proxy {
      host: host.to_string(),
      port,
      username: None,
      password: None,
      declared_type: declared,
      resolved_addr: format!("{}:{}", host, port).parse().unwrap(),
      validated: false,
      is_active: true,
      detected_type: ProxyType::None,
      last_rtt_ms: 0,
      has_auth: false,
    }
  }

  struct NullLogger;
  impl Logger for NullLogger {
    fn info(&self, _msg: &str) {}
    fn success(&self, _msg: &str) {}
    fn error(&self, _msg: &str) {}
  }

  #[test]
  fn empty_pool_returns_negative_one() {
    let mut pool = Pool::new();
    let result = validate_pool(
      &mut pool,
      Arc::new(ScriptedFactory { responses: Mutex::new(vec![]) }),
      Arc::new(StdResolver),
      ValidatorConfig::default(),
      Arc::new(NullLogger),
    );
    assert_eq!(result, -1);
  }

  #[test]
  fn successful_sweep_marks_every_remaining_proxy_validated_and_active() {
    let mut pool = Pool::new();
    pool.restore_from(vec![
      proxy_with("198.51.100.1", 1080, ProxyType::Socks5),
      proxy_with("198.51.100.2", 1080, ProxyType::Socks5),
    ]);
    let factory = Arc::new(ScriptedFactory { responses: Mutex::new(vec![socks5_ok_bytes(), socks5_ok_bytes()]) });
    let working = validate_pool(&mut pool, factory, Arc::new(StdResolver), ValidatorConfig::new(2, 1000, "irc.libera.chat", 6667), Arc::new(NullLogger));
    assert_eq!(working, 2);
    for p in pool.proxies() {
      assert!(p.validated);
      assert!(p.is_active);
      assert_ne!(p.detected_type, ProxyType::None);
    }
  }

  #[test]
  fn hung_proxy_is_removed_within_timeout_bound() {
    let mut pool = Pool::new();
    pool.restore_from(vec![proxy_with("198.51.100.1", 1080, ProxyType::Socks5), proxy_with("198.51.100.2", 1080, ProxyType::None)]);
    let config = ValidatorConfig::new(3, 500, "irc.libera.chat", 6667);
    let start = Instant::now();
    let working = validate_pool(&mut pool, Arc::new(HangingFactory), Arc::new(StdResolver), config, Arc::new(NullLogger));
    let elapsed = start.elapsed();
    assert_eq!(working, 0);
    assert!(pool.count() == 0);
    assert!(elapsed < Duration::from_secs(2), "sweep took {:?}", elapsed);
  }
}
