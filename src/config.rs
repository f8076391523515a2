use crate::error::{LabelError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "point_labeler";
const SETTINGS_FILE: &str = "settings.json";

/// What survives between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub save_dir: Option<PathBuf>,
    pub last_open_dir: Option<PathBuf>,
    pub recent_files: Vec<PathBuf>,
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| LabelError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LabelError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| LabelError::io(path, e))?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Loads the settings file, falling back to defaults if it is missing or broken.
    pub fn load() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            log::warn!("Ignoring settings: {}", e);
            Self::default()
        })
    }

    pub fn save(&self) {
        if let Some(path) = Self::default_path() {
            if let Err(e) = self.save_to(&path) {
                log::warn!("Could not save settings: {}", e);
            }
        }
    }
}

/// Positional arguments: `[IMAGE_OR_LABEL_OR_DIR] [SAVE_DIR]`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub initial: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
}

impl CliArgs {
    pub fn parse<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter().skip(1).map(PathBuf::from);
        Self {
            initial: args.next(),
            save_dir: args.next(),
        }
    }
}
