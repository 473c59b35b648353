use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Directories holding analysis sidecars (used when a command has no path args).
    pub library_dirs: Vec<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Transition planning defaults.
    pub transition: TransitionConfig,
}

/// Defaults handed to the planner for every transition.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct TransitionConfig {
    /// Preferred transition length in seconds (<= 0 = let the planner decide).
    pub preferred_duration_secs: f64,
    /// Mix intensity passed through to the planner.
    pub intensity: f64,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            preferred_duration_secs: 8.0,
            intensity: 0.7,
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/setmix/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert!(config.library_dirs.is_empty());
        assert_eq!(config.workers, 0);
        assert_eq!(config.transition.preferred_duration_secs, 8.0);
        assert_eq!(config.transition.intensity, 0.7);
    }

    #[test]
    fn test_partial_config() {
        let config = AppConfig::parse(
            r#"
            library_dirs = ["/music/house"]
            workers = 3

            [transition]
            preferred_duration_secs = 12.5
            "#,
        )
        .unwrap();
        assert_eq!(config.library_dirs, vec![PathBuf::from("/music/house")]);
        assert_eq!(config.resolve_workers(), 3);
        assert_eq!(config.transition.preferred_duration_secs, 12.5);
        assert_eq!(config.transition.intensity, 0.7);
    }

    #[test]
    fn test_invalid_config() {
        assert!(AppConfig::parse("workers = \"many\"").is_err());
    }

    #[test]
    fn test_auto_workers() {
        assert!(AppConfig::default().resolve_workers() >= 1);
    }
}
