// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0

/// The ambient logger the core depends on. Pool loading, dialing, and the
/// validator call through this trait rather than a global logging macro —
/// per spec.md §9, the variadic logging macros of the source are purely
/// formatting and are replaced here with a small structured interface,
/// unrelated to the rest of the design.
pub trait Logger {
  fn info(&self, msg: &str);
  fn success(&self, msg: &str);
  fn error(&self, msg: &str);
}

/// Default [`Logger`] backed by `tracing`, matching the teacher's own
/// logging backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
  fn info(&self, msg: &str) {
    tracing::info!("{}", msg);
  }

  fn success(&self, msg: &str) {
    tracing::info!(target: "success", "{}", msg);
  }

  fn error(&self, msg: &str) {
    tracing::error!("{}", msg);
  }
}
