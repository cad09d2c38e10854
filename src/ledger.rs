use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Persistent record of file ids already delivered, keyed by course id.
/// Extended only after every email for a course went out.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    seen: HashMap<String, Vec<String>>,
}

impl Ledger {
    /// A missing file is a fresh start; a corrupt or unreadable one degrades
    /// to empty with a log entry, never a crash.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::error!("Failed to read {}: {e}", path.display());
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(ledger) => ledger,
            Err(e) => {
                tracing::error!("{} is corrupted: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn seen_for(&self, course_id: &str) -> &[String] {
        self.seen.get(course_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record(&mut self, course_id: &str, file_ids: Vec<String>) {
        self.seen
            .entry(course_id.to_string())
            .or_default()
            .extend(file_ids);
    }

    /// Write to a temp file and rename over the canonical path, so a crash
    /// mid-write leaves the previous ledger intact.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = tmp_path(path);
        std::fs::write(&tmp, &json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        tracing::info!("Saved {}", path.display());
        Ok(())
    }
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}
