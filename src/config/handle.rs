//! Process-wide settings snapshot with atomic replacement.
//!
//! Uses `arc-swap` for lock-free reads and atomic snapshot replacement.
//! Reads are cached process-wide; saving settings re-installs the snapshot,
//! which is the only invalidation trigger.

use arc_swap::ArcSwap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

use super::Settings;

/// Global settings storage.
static SETTINGS: LazyLock<ArcSwap<Settings>> =
    LazyLock::new(|| ArcSwap::from_pointee(Settings::default()));

/// Settings persistence errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("settings file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("settings serialization error")]
    TomlSer(#[from] toml::ser::Error),
}

/// Current settings snapshot (lock-free read).
#[inline]
pub fn settings() -> Arc<Settings> {
    SETTINGS.load_full()
}

/// Sanitize and install a snapshot, applying the logging toggle.
pub fn install_settings(mut settings: Settings) -> Arc<Settings> {
    settings.sanitize();
    crate::logger::set_enabled(settings.enable_logging);
    let arc = Arc::new(settings);
    SETTINGS.store(Arc::clone(&arc));
    arc
}

/// Load settings from a TOML file (sanitized, not installed).
pub fn load_settings(path: &Path) -> Result<Settings, SettingsError> {
    let text = fs::read_to_string(path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
    Ok(super::from_toml(&text)?)
}

/// Persist settings to disk and re-install the process snapshot.
///
/// The write invalidates the cached snapshot: subsequent [`settings`] calls
/// observe the saved values.
pub fn save_settings(settings: Settings, path: &Path) -> Result<Arc<Settings>, SettingsError> {
    let arc = install_settings(settings);
    let text = super::to_toml(&arc)?;
    fs::write(path, text).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
    Ok(arc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("minipress.toml");

        let to_save = Settings {
            site_url: "https://site.example/".into(),
            async_css: true,
            ..Settings::default()
        };
        let installed = save_settings(to_save, &path).unwrap();
        // Sanitization happened before installation.
        assert_eq!(installed.site_url, "https://site.example");

        let loaded = load_settings(&path).unwrap();
        assert_eq!(loaded.site_url, "https://site.example");
        assert!(loaded.async_css);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_settings(Path::new("/nonexistent/minipress.toml")).is_err());
    }
}
