//! Configuration loading and management.

use std::path::{Path, PathBuf};

use attend_core::ValidationError;
use attend_core::time_of_day::parse_offset;
use chrono::FixedOffset;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Wall-clock offset of the organisation, e.g. `+07:00`.
    pub utc_offset: String,
    /// Actor recorded in audit entries when `--admin` is not given.
    pub admin_user_id: String,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("attend.db"),
            utc_offset: "+07:00".to_string(),
            admin_user_id: "admin".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ATTEND_*)
        figment = figment.merge(Env::prefixed("ATTEND_"));

        figment.extract()
    }

    /// The configured wall-clock offset.
    pub fn offset(&self) -> Result<FixedOffset, ValidationError> {
        parse_offset(&self.utc_offset)
    }
}

/// Returns the platform-specific config directory for attend.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("attend"))
}

/// Returns the platform-specific data directory for attend.
///
/// On Linux: `~/.local/share/attend`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("attend"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_attend() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "attend");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("attend.db"));
        assert_eq!(config.offset().unwrap(), FixedOffset::east_opt(7 * 3600).unwrap());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/attend-test.db\"\nutc_offset = \"-03:00\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/attend-test.db"));
        assert_eq!(config.offset().unwrap(), FixedOffset::west_opt(3 * 3600).unwrap());
        assert_eq!(config.admin_user_id, "admin");
    }

    #[test]
    fn test_bad_offset_is_rejected() {
        let config = Config {
            utc_offset: "GMT+7".to_string(),
            ..Config::default()
        };
        assert!(config.offset().is_err());
    }
}
