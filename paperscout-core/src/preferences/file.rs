use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::preferences::data::PreferenceMemory;

/// JSON-backed storage for the preference memory. Saves write a complete
/// snapshot to a sibling temp file and rename it over the target, so readers
/// never observe a partial write.
#[derive(Debug)]
pub struct PreferenceFile {
    path: PathBuf,
}

impl PreferenceFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Default location: ~/.paperscout/data/preferences.json
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home
            .join(".paperscout")
            .join("data")
            .join("preferences.json"))
    }

    /// Load the stored snapshot. Returns None for a missing file; an
    /// unreadable or unparseable file is logged and treated as missing
    /// rather than aborting startup.
    pub fn load(&self) -> Option<PreferenceMemory> {
        if !self.path.exists() {
            return None;
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Failed to read preference file");
                return None;
            }
        };

        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Failed to parse preference file");
                return None;
            }
        };

        match PreferenceMemory::from_json(value) {
            Ok(memory) => Some(memory),
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Invalid preference file contents");
                None
            }
        }
    }

    /// Save a complete snapshot, creating directories as needed.
    pub fn save(&self, memory: &PreferenceMemory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create preference directory: {}", parent.display())
            })?;
        }

        let content =
            serde_json::to_string_pretty(memory).context("Failed to serialize preferences")?;

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write preference file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!("Failed to replace preference file: {}", self.path.display())
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = PreferenceFile::new(temp_dir.path().join("preferences.json"));
        assert!(file.load().is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = PreferenceFile::new(temp_dir.path().join("data").join("preferences.json"));

        let mut memory = PreferenceMemory::default();
        memory.memory = "Likes agents.".to_string();
        memory.pending_updates.push("pending".to_string());
        file.save(&memory).unwrap();

        let loaded = file.load().unwrap();
        assert_eq!(loaded.memory, "Likes agents.");
        assert_eq!(loaded.pending_updates, vec!["pending".to_string()]);
    }

    #[test]
    fn test_corrupt_file_treated_as_missing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preferences.json");
        std::fs::write(&path, "{ not json").unwrap();

        let file = PreferenceFile::new(path);
        assert!(file.load().is_none());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("preferences.json");
        let file = PreferenceFile::new(path.clone());

        file.save(&PreferenceMemory::default()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
