//! Locally persisted library state: uploaded video names and the sample flag.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Small key-value state read at startup and rewritten on every change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryState {
    /// Display names of uploaded videos, oldest first.
    #[serde(default)]
    pub uploaded_videos: Vec<String>,
    /// Whether the bundled sample lecture is available.
    #[serde(default)]
    pub has_sample_video: bool,
}

impl LibraryState {
    /// Reads the state file; a missing file yields the default state.
    pub fn load(path: &Path) -> Result<Self> {
        let body = match fs::read_to_string(path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&body)
            .with_context(|| format!("invalid library state in {}", path.display()))
    }

    /// Writes the state file, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
    }

    /// Appends an uploaded video name. Blank and already-listed names are
    /// ignored; returns whether the list changed.
    pub fn record_upload(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.uploaded_videos.iter().any(|v| v == name) {
            return false;
        }
        self.uploaded_videos.push(name.to_string());
        true
    }

    /// Sets the sample-video flag; returns whether it changed.
    pub fn mark_sample_video(&mut self, available: bool) -> bool {
        let changed = self.has_sample_video != available;
        self.has_sample_video = available;
        changed
    }
}
