// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license OR Apache 2.0

//! Tiny JSON sidecar recording the last `load`ed file and default type, so
//! `check`/status verbs issued as separate process invocations can find the
//! pool again without the caller having to repeat `--type` every time.

use anyhow::Result;
use proxycore::ProxyType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Serialize, Deserialize)]
pub struct SavedState {
  pub path: String,
  pub default_type: ProxyType,
}

fn state_path() -> PathBuf {
  PathBuf::from(".proxycore_state.json")
}

pub fn save(path: &str, default_type: ProxyType) -> Result<()> {
  let state = SavedState { path: path.to_string(), default_type };
  fs::write(state_path(), serde_json::to_string_pretty(&state)?)?;
  Ok(())
}

pub fn load() -> Result<Option<SavedState>> {
  match fs::read_to_string(state_path()) {
    Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(e.into()),
  }
}

pub fn clear() -> Result<()> {
  match fs::remove_file(state_path()) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(e.into()),
  }
}
