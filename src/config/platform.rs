use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Optional configuration file looked up inside the data directory.
pub const CONFIG_FILE: &str = "vellum.toml";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Drop change events.
    None,
    /// Write change events to the tracing log.
    #[default]
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub data_dir: PathBuf,
    /// Database file name, relative to `data_dir`.
    pub db_file: String,
    /// Store file attachments under `data_dir/attachments`.
    pub attachments: bool,
    pub notifications: NotificationMode,
}

impl PlatformConfig {
    /// Defaults rooted at `data_dir`, overridden by `data_dir/vellum.toml`
    /// when present.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let mut config = match fs::read_to_string(&path) {
            Ok(content) => toml::from_str::<PlatformConfig>(&content)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(Error::Io(e)),
        };
        config.data_dir = data_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_file.trim().is_empty() {
            return Err(Error::Config("db_file cannot be empty".to_string()));
        }
        if Path::new(&self.db_file).components().count() != 1 {
            return Err(Error::Config(format!(
                "db_file '{}' must be a plain file name",
                self.db_file
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    #[must_use]
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            db_file: "vellum.db".to_string(),
            attachments: true,
            notifications: NotificationMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() {
        let temp = TempDir::new().unwrap();
        let config = PlatformConfig::load(temp.path()).unwrap();

        assert_eq!(config.db_path(), temp.path().join("vellum.db"));
        assert_eq!(config.attachments_dir(), temp.path().join("attachments"));
        assert_eq!(config.notifications, NotificationMode::Log);
    }

    #[test]
    fn test_file_overrides() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE),
            "db_file = \"core.db\"\nattachments = false\nnotifications = \"none\"\n",
        )
        .unwrap();

        let config = PlatformConfig::load(temp.path()).unwrap();
        assert_eq!(config.db_path(), temp.path().join("core.db"));
        assert!(!config.attachments);
        assert_eq!(config.notifications, NotificationMode::None);
    }

    #[test]
    fn test_rejects_nested_db_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "db_file = \"../x.db\"\n").unwrap();
        assert!(matches!(
            PlatformConfig::load(temp.path()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE), "attachments = \"maybe\"").unwrap();
        assert!(matches!(
            PlatformConfig::load(temp.path()),
            Err(Error::Config(_))
        ));
    }
}
