//! Session persistence
//!
//! The terminal client keeps its navigation history between runs, the way a
//! browser tab keeps its history across reloads. The file lives in the
//! working directory unless `set_session_path` names another one.
//!
//! ## --no-session-cache flag
//!
//! When the client is started with `--no-session-cache`, save and load are
//! skipped and every run starts from a fresh history. Call
//! `set_no_cache(true)` early in startup to enable this.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::core::history::MemoryHistory;

pub const DEFAULT_SESSION_FILE: &str = "simkit_session.json";

static NO_SESSION_CACHE: AtomicBool = AtomicBool::new(false);
static SESSION_PATH: OnceCell<PathBuf> = OnceCell::new();

pub fn set_no_cache(enabled: bool) {
    NO_SESSION_CACHE.store(enabled, Ordering::SeqCst);
    if enabled {
        log::info!("🚫 Session cache disabled (--no-session-cache)");
    }
}

fn is_no_cache() -> bool {
    NO_SESSION_CACHE.load(Ordering::SeqCst)
}

/// Use `path` instead of the default file. Only the first call counts.
pub fn set_session_path(path: &Path) {
    if SESSION_PATH.set(path.to_path_buf()).is_err() {
        log::warn!("Session path already set, ignoring {path:?}");
    }
}

fn get_session_path() -> Result<PathBuf> {
    if let Some(path) = SESSION_PATH.get() {
        return Ok(path.clone());
    }
    let dir = std::env::current_dir().context("Failed to get current working directory")?;
    Ok(dir.join(DEFAULT_SESSION_FILE))
}

/// Save the history as JSON.
///
/// # Returns
/// - `Ok(())` if the save succeeded or was skipped
/// - `Err` if serializing or writing failed
pub fn save_session(history: &serde_json::Value) -> Result<()> {
    if is_no_cache() {
        log::debug!("Skipping session save (--no-session-cache enabled)");
        return Ok(());
    }
    let path = get_session_path()?;
    let json = serde_json::to_string_pretty(history).context("Failed to serialize session")?;
    fs::write(&path, json).with_context(|| format!("Failed to write session to {path:?}"))?;
    log::debug!("💾 Saved session to {path:?}");
    Ok(())
}

/// Load the saved history.
///
/// # Returns
/// - `Ok(Some(history))` when a session was found
/// - `Ok(None)` when there is none or caching is disabled
/// - `Err` if the file exists but cannot be read or parsed
pub fn load_session() -> Result<Option<MemoryHistory>> {
    if is_no_cache() {
        log::debug!("Skipping session load (--no-session-cache enabled)");
        return Ok(None);
    }
    let path = get_session_path()?;
    if !path.exists() {
        log::debug!("📂 No saved session at {path:?}");
        return Ok(None);
    }
    let json = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read session from {path:?}"))?;
    let history: MemoryHistory =
        serde_json::from_str(&json).context("Failed to deserialize session")?;
    Ok(Some(history.sanitized()))
}
