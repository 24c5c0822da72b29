use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::records::DEFAULT_PAGE_LIMIT;

pub const BASE_URL_ENV: &str = "CRM_BASE_URL";
pub const PROJECT_ID_ENV: &str = "CRM_PROJECT_ID";

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("crm")
        .join("config.json")
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct CrmConfig {
    /// Root URL of the record store API; tables live beneath it.
    pub base_url: String,
    pub project_id: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    pub debug_logging: bool,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            project_id: String::new(),
            page_limit: DEFAULT_PAGE_LIMIT,
            debug_logging: false,
        }
    }
}

impl CrmConfig {
    /// Read config from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                });
            }
        };

        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: std::io::Error::other(e),
        })?;
        std::fs::write(path, json).map_err(write_err)
    }

    /// Load the file as written (no environment overrides), apply `change` and
    /// save it back.
    pub fn update_file(
        path: &Path,
        change: impl FnOnce(&mut CrmConfig),
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        change(&mut config);
        config.save(path)?;
        log::info!("Saved config to {}", path.display());
        Ok(config)
    }

    /// Apply `CRM_BASE_URL` / `CRM_PROJECT_ID` overrides from `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(project) = lookup(PROJECT_ID_ENV).filter(|v| !v.trim().is_empty()) {
            self.project_id = project;
        }
        if self.page_limit == 0 {
            self.page_limit = DEFAULT_PAGE_LIMIT;
        }
        self
    }

    /// Load from `path` and apply process environment overrides.
    pub fn resolve(path: &Path) -> Result<Self, ConfigError> {
        Ok(Self::load(path)?.with_overrides(|key| std::env::var(key).ok()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CrmConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, CrmConfig::default());
        assert_eq!(config.page_limit, 1000);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = CrmConfig {
            base_url: "https://records.example.com".to_string(),
            project_id: "p-42".to_string(),
            page_limit: 250,
            debug_logging: true,
        };
        config.save(&path).unwrap();
        assert_eq!(CrmConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn update_file_keeps_untouched_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"base_url": "https://old.example", "page_limit": 50}"#).unwrap();

        let updated = CrmConfig::update_file(&path, |c| c.project_id = "p-7".to_string()).unwrap();
        assert_eq!(updated.base_url, "https://old.example");
        assert_eq!(updated.project_id, "p-7");
        assert_eq!(updated.page_limit, 50);
        assert_eq!(CrmConfig::load(&path).unwrap(), updated);

        let fresh = dir.path().join("new").join("config.json");
        let created = CrmConfig::update_file(&fresh, |c| c.debug_logging = true).unwrap();
        assert!(created.debug_logging);
        assert_eq!(created.page_limit, 1000);
        assert!(fresh.exists());
    }

    #[test]
    fn partial_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"base_url": "https://x.example"}"#).unwrap();
        let config = CrmConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://x.example");
        assert_eq!(config.page_limit, 1000);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            CrmConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let config = CrmConfig {
            base_url: "https://file.example".to_string(),
            page_limit: 0,
            ..CrmConfig::default()
        }
        .with_overrides(|key| match key {
            BASE_URL_ENV => Some("https://env.example".to_string()),
            PROJECT_ID_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.base_url, "https://env.example");
        assert_eq!(config.project_id, "");
        assert_eq!(config.page_limit, 1000);
    }
}
