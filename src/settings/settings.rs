// Settings management and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio::output::OutputOptions;
use crate::error::{PlayerError, Result};

/// Playback behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackSettings {
    pub auto_advance: bool,
    pub progress_interval_frames: u32, // 1 = every frame
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            auto_advance: true,
            progress_interval_frames: 8,
        }
    }
}

/// Output device settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputSettings {
    pub buffer_ms: u32, // 50-2000ms
    pub volume: f32,    // 0.0-1.0
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            buffer_ms: 250,
            volume: 1.0,
        }
    }
}

impl OutputSettings {
    pub fn options(&self) -> OutputOptions {
        OutputOptions {
            buffer_ms: self.buffer_ms.clamp(50, 2000),
            volume: self.volume.clamp(0.0, 1.0),
        }
    }
}

/// Interface settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct InterfaceSettings {
    pub show_remaining_time: bool,
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    pub version: i32, // Settings schema version for future migrations
    pub playback: PlaybackSettings,
    pub output: OutputSettings,
    pub interface: InterfaceSettings,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            version: 1,
            playback: PlaybackSettings::default(),
            output: OutputSettings::default(),
            interface: InterfaceSettings::default(),
        }
    }
}

impl PlayerSettings {
    /// Get the settings file path
    pub fn get_settings_path(app_dir: &Path) -> PathBuf {
        app_dir.join("settings.json")
    }

    /// Load settings from file, or return defaults if file doesn't exist
    pub fn load(app_dir: &Path) -> Result<Self> {
        let path = Self::get_settings_path(app_dir);

        if !path.exists() {
            log::info!("[Settings] No settings file found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| PlayerError::Settings(format!("failed to read {:?}: {}", path, e)))?;

        let settings: PlayerSettings = serde_json::from_str(&content)
            .map_err(|e| PlayerError::Settings(format!("failed to parse {:?}: {}", path, e)))?;

        log::info!("[Settings] Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, app_dir: &Path) -> Result<()> {
        fs::create_dir_all(app_dir)
            .map_err(|e| PlayerError::Settings(format!("failed to create {:?}: {}", app_dir, e)))?;

        let path = Self::get_settings_path(app_dir);
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| PlayerError::Settings(format!("failed to serialize settings: {}", e)))?;

        fs::write(&path, content)
            .map_err(|e| PlayerError::Settings(format!("failed to write {:?}: {}", path, e)))?;

        log::info!("[Settings] Saved settings to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(PlayerSettings::load(dir.path()).unwrap(), PlayerSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let app_dir = dir.path().join("framedeck");
        let mut settings = PlayerSettings::default();
        settings.playback.auto_advance = false;
        settings.output.volume = 0.5;

        settings.save(&app_dir).unwrap();
        assert_eq!(PlayerSettings::load(&app_dir).unwrap(), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            PlayerSettings::get_settings_path(dir.path()),
            r#"{ "playback": { "progress_interval_frames": 1 } }"#,
        )
        .unwrap();

        let settings = PlayerSettings::load(dir.path()).unwrap();
        assert_eq!(settings.playback.progress_interval_frames, 1);
        assert!(settings.playback.auto_advance);
        assert_eq!(settings.output, OutputSettings::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(PlayerSettings::get_settings_path(dir.path()), "{ nope").unwrap();
        assert!(matches!(PlayerSettings::load(dir.path()), Err(PlayerError::Settings(_))));
    }

    #[test]
    fn test_output_options_are_clamped() {
        let output = OutputSettings { buffer_ms: 10, volume: 3.0 };
        let options = output.options();
        assert_eq!(options.buffer_ms, 50);
        assert_eq!(options.volume, 1.0);
    }
}
