//! Two-tier persistence for the active tenant selection.
//!
//! A session tier lives for the process; a durable tier survives restarts.
//! Writes always hit both tiers, reads prefer the session tier. Storage is
//! best-effort: tier failures are logged and never propagate, since losing
//! a selection only means it gets repaired on the next recompute.

use directories::ProjectDirs;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::warn;

/// A single string-per-key storage tier.
pub trait SelectionTier: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
}

/// Process-lifetime tier; the session-scoped half of the pair.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: HashMap<String, String>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionTier for MemoryTier {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// Durable tier keeping one file per key under a state directory.
#[derive(Debug)]
pub struct FileTier {
    dir: PathBuf,
}

impl FileTier {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Tier rooted at the per-user data directory for this crate.
    pub fn for_project() -> Option<Self> {
        ProjectDirs::from("com", "oap", "oap-discovery")
            .map(|dirs| Self::new(dirs.data_dir().to_path_buf()))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl SelectionTier for FileTier {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Some(raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!(key, error = %err, "Failed to read durable selection tier");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Err(err) = self.write_atomic(key, value) {
            warn!(key, error = %err, "Failed to write durable selection tier");
        }
    }
}

impl FileTier {
    fn write_atomic(&self, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
        fs::create_dir_all(&self.dir)?;
        let mut temp_file = NamedTempFile::new_in(&self.dir)?;
        temp_file.write_all(value.as_bytes())?;
        temp_file.as_file_mut().sync_all()?;
        temp_file.persist(self.path_for(key))?;
        Ok(())
    }
}

/// Reads a tier entry, decoding legacy JSON-string-encoded values.
///
/// Earlier storage serialized values as JSON, so the plain string `abc` was
/// persisted as `"abc"`. If the raw value parses as a JSON string the
/// decoded form wins; anything else is used verbatim. Empty entries count
/// as absent.
pub fn read_decoded(tier: &dyn SelectionTier, key: &str) -> Option<String> {
    let raw = tier.get(key)?;
    if raw.is_empty() {
        return None;
    }
    if let Ok(decoded) = serde_json::from_str::<String>(&raw) {
        return Some(decoded);
    }
    Some(raw)
}
