use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;

use super::SweepSettings;

/// Stores named sweep settings as JSON files in one directory
pub struct SettingsStorage {
    storage_dir: PathBuf,
}

impl SettingsStorage {
    /// Creates the storage directory if it doesn't exist
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&storage_dir).context("Failed to create settings directory")?;
        Ok(Self { storage_dir })
    }

    pub fn save(&self, settings: &SweepSettings) -> Result<()> {
        let path = self.settings_path(&settings.name)?;
        let json = serde_json::to_string_pretty(settings).context("Failed to serialize sweep settings")?;
        fs::write(&path, json).context(format!("Failed to write settings to {:?}", path))?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<SweepSettings> {
        let path = self.settings_path(name)?;
        let json = fs::read_to_string(&path).context(format!("Failed to read settings from {:?}", path))?;
        let settings: SweepSettings = serde_json::from_str(&json).context("Failed to deserialize sweep settings")?;
        settings.plan.check().context(format!("Stored plan {:?} is invalid", name))?;
        Ok(settings)
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let path = self.settings_path(name)?;
        if path.exists() {
            fs::remove_file(&path).context(format!("Failed to delete settings at {:?}", path))?;
        }
        Ok(())
    }

    /// All readable settings files; unparsable files are skipped
    pub fn list_all(&self) -> Result<Vec<SweepSettings>> {
        let mut all = Vec::new();

        for entry in fs::read_dir(&self.storage_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                let json = fs::read_to_string(&path)?;
                if let Ok(settings) = serde_json::from_str::<SweepSettings>(&json) {
                    all.push(settings);
                }
            }
        }

        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    /// Names map to one file inside the storage directory
    fn settings_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            bail!("Invalid settings name {:?}", name);
        }
        Ok(self.storage_dir.join(format!("{}.json", name)))
    }
}
