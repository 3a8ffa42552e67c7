// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0

//! A reference control surface over `proxycore`, standing in for the verb
//! table an IRC clone-bouncer exposes on its own command line (spec.md §6).
//! Each invocation performs one verb; pool state that must persist between
//! invocations (the loaded file path and default type) is kept in a small
//! JSON sidecar next to the working directory, mirroring what `Pool` itself
//! already remembers in-process.

mod state;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use proxycore::{DialTimeouts, Logger, MioSocketFactory, Pool, ProxyType, StdResolver, TracingLogger, ValidatorConfig};
use std::sync::Arc;

/// Mirrors spec.md §6's verb table directly: `proxy <file> [--type…]` loads
/// with `file` as a plain positional (no `load` keyword), while `check` and
/// `clear` remain subcommands. clap resolves the ambiguity the same way the
/// verb table implies: a first argument that exactly matches a subcommand
/// name is dispatched as that subcommand, anything else is taken as `file` —
/// so a proxy list literally named `check` or `clear` can't be loaded this
/// way (pass a path like `./check` instead).
#[derive(Parser)]
#[command(name = "proxy", about = "Load, validate, and rotate through a pool of upstream proxies")]
struct Cli {
  /// Proxy list file to load and replace the pool with.
  file: Option<String>,
  #[arg(long, value_enum, default_value_t = CliProxyType::None)]
  r#type: CliProxyType,
  #[arg(long)]
  check: bool,
  #[arg(long)]
  no_check: bool,
  #[arg(long, default_value_t = proxycore::config::DEFAULT_CONCURRENCY)]
  concurrency: usize,
  #[arg(long, default_value_t = proxycore::config::DEFAULT_TIMEOUT_MS)]
  timeout: u64,
  #[arg(long)]
  save: Option<String>,
  #[arg(long, default_value = proxycore::config::DEFAULT_TEST_HOST)]
  test_host: String,
  #[arg(long, default_value_t = proxycore::config::DEFAULT_TEST_PORT)]
  test_port: u16,

  #[command(subcommand)]
  verb: Option<Verb>,
}

#[derive(Subcommand)]
enum Verb {
  /// Re-validate the pool loaded by the last `proxy <file>`.
  Check {
    #[arg(long, default_value_t = proxycore::config::DEFAULT_CONCURRENCY)]
    concurrency: usize,
    #[arg(long, default_value_t = proxycore::config::DEFAULT_TIMEOUT_MS)]
    timeout: u64,
    #[arg(long)]
    save: Option<String>,
    #[arg(long, default_value = proxycore::config::DEFAULT_TEST_HOST)]
    test_host: String,
    #[arg(long, default_value_t = proxycore::config::DEFAULT_TEST_PORT)]
    test_port: u16,
  },
  /// Empty the pool.
  Clear,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CliProxyType {
  None,
  Http,
  Https,
  Socks4,
  Socks5,
}

impl From<CliProxyType> for ProxyType {
  fn from(t: CliProxyType) -> Self {
    match t {
      CliProxyType::None => ProxyType::None,
      CliProxyType::Http => ProxyType::Http,
      CliProxyType::Https => ProxyType::Https,
      CliProxyType::Socks4 => ProxyType::Socks4,
      CliProxyType::Socks5 => ProxyType::Socks5,
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();
  let cli = Cli::parse();
  let logger: Arc<dyn Logger + Send + Sync> = Arc::new(TracingLogger);

  match (cli.verb, cli.file) {
    (Some(Verb::Clear), _) => {
      state::clear()?;
      println!("proxy pool cleared");
      Ok(())
    }
    (Some(Verb::Check { concurrency, timeout, save, test_host, test_port }), _) => {
      let saved = state::load()?.context("no pool has been loaded yet; run `proxy <file>` first")?;
      let mut pool = Pool::new();
      let resolver = StdResolver;
      let count = pool.load(&saved.path, saved.default_type, &resolver, logger.as_ref())?;
      println!("reloaded {} proxies from {}", count, saved.path);
      run_validation(&mut pool, concurrency, timeout, &test_host, test_port, &save, logger)?;
      Ok(())
    }
    (None, Some(file)) => {
      let mut pool = Pool::new();
      let resolver = StdResolver;
      let default_type = cli.r#type.into();
      let count = pool.load(&file, default_type, &resolver, logger.as_ref()).with_context(|| format!("loading {}", file))?;
      println!("loaded {} proxies from {}", count, file);
      state::save(&file, default_type)?;

      if cli.check && !cli.no_check {
        run_validation(&mut pool, cli.concurrency, cli.timeout, &cli.test_host, cli.test_port, &cli.save, logger)?;
      }
      Ok(())
    }
    (None, None) => print_status(),
  }
}

fn run_validation(
  pool: &mut Pool,
  concurrency: usize,
  timeout_ms: u64,
  test_host: &str,
  test_port: u16,
  save: &Option<String>,
  logger: Arc<dyn Logger + Send + Sync>,
) -> Result<()> {
  let config = ValidatorConfig::new(concurrency, timeout_ms, test_host, test_port);
  let factory = Arc::new(MioSocketFactory);
  let resolver = Arc::new(StdResolver);
  let working = proxycore::validate_pool(pool, factory, resolver, config, logger);
  if working < 0 {
    println!("pool was empty; nothing to validate");
  } else {
    println!("{} working proxies after validation", working);
  }
  if let Some(path) = save {
    pool.save_validated(path).with_context(|| format!("saving validated pool to {}", path))?;
    println!("saved validated pool to {}", path);
  }
  let _ = DialTimeouts::default();
  Ok(())
}

fn print_status() -> Result<()> {
  match state::load()? {
    Some(saved) => println!("pool source: {} (default type {:?})", saved.path, saved.default_type),
    None => println!("no pool loaded"),
  }
  Ok(())
}
