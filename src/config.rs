use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::key::{project_from_ticket_key, resolve_project};
use crate::error::{AppError, AppResult};
use crate::infra::http::{ClientConfig, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::infra::store::STORE_FILE_NAME;
use crate::workflow::batch::DEFAULT_MAX_CONCURRENT;

const CONFIG_DIR_NAME: &str = "jtc";
const CONFIG_FILE_NAME: &str = "config.json";
const MAPPING_FILE_NAME: &str = "project-mapping.json";

pub const DEFAULT_ISSUE_TYPE: &str = "Task";
pub const DEFAULT_PRIORITY: &str = "Medium";

pub fn config_directory() -> AppResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| {
            AppError::Configuration("unable to locate the user configuration directory".to_string())
        })
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}

/// Settings persisted by `jtc config init`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_token: Option<String>,
    pub default_project: Option<String>,
    pub default_issue_type: Option<String>,
    pub default_priority: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_concurrent: Option<usize>,
    pub store_path: Option<String>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|err| AppError::Configuration(format!("invalid config file: {err}"))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(self)
            .map_err(|err| AppError::Configuration(format!("failed to write config: {err}")))?;
        fs::write(path, data)?;
        Ok(())
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    pub project: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jira_base_url: Option<String>,
    pub jira_email: Option<String>,
    pub jira_token: Option<String>,
    /// Project key, or a ticket key whose project is used.
    pub project: Option<String>,
    pub default_issue_type: String,
    pub default_priority: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub max_concurrent: usize,
    pub store_path: PathBuf,
    pub project_mapping: ProjectMapping,
}

impl AppConfig {
    pub fn load(overrides: &ConfigOverrides) -> AppResult<Self> {
        let dir = config_directory()?;
        let stored = StoredConfig::load_from(&dir.join(CONFIG_FILE_NAME))?;
        let mapping = ProjectMapping::load(&dir.join(MAPPING_FILE_NAME))?;
        let mut config = Self::resolve(stored, overrides, |name| env::var(name).ok(), &dir);
        config.project_mapping = mapping;
        Ok(config)
    }

    /// Merges flag, environment, stored and built-in values in that order of precedence.
    pub fn resolve(
        stored: StoredConfig,
        overrides: &ConfigOverrides,
        env_lookup: impl Fn(&str) -> Option<String>,
        config_dir: &Path,
    ) -> Self {
        let env_value = |name: &str| env_lookup(name).filter(|value| !value.trim().is_empty());
        let pick = |flag: &Option<String>, names: &[&str], stored: Option<String>| {
            flag.clone()
                .or_else(|| names.iter().find_map(|name| env_value(name)))
                .or(stored)
                .filter(|value| !value.trim().is_empty())
        };

        let store_path = stored
            .store_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| config_dir.join(STORE_FILE_NAME));

        Self {
            jira_base_url: pick(&overrides.base_url, &["JIRA_URL"], stored.jira_base_url),
            jira_email: pick(&overrides.email, &["JIRA_EMAIL"], stored.jira_email),
            jira_token: pick(&overrides.token, &["JIRA_TOKEN"], stored.jira_token),
            project: pick(
                &overrides.project,
                &["JIRA_PROJECT", "JIRA_TICKET"],
                stored.default_project,
            ),
            default_issue_type: stored
                .default_issue_type
                .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string()),
            default_priority: stored
                .default_priority
                .unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            request_timeout: stored
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
            max_retries: stored.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            max_concurrent: stored
                .max_concurrent
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_MAX_CONCURRENT),
            store_path,
            project_mapping: ProjectMapping::default(),
        }
    }

    pub fn client_config(&self) -> AppResult<ClientConfig> {
        let base_url = required(
            &self.jira_base_url,
            "Jira base URL is required (--url, JIRA_URL or `jtc config init`)",
        )?;
        let email = required(
            &self.jira_email,
            "Jira email is required (--email, JIRA_EMAIL or `jtc config init`)",
        )?;
        let token = required(
            &self.jira_token,
            "Jira API token is required (--token, JIRA_TOKEN or `jtc config init`)",
        )?;
        Ok(ClientConfig {
            timeout: self.request_timeout,
            max_retries: self.max_retries,
            ..ClientConfig::new(base_url, email, token)
        })
    }

    pub fn browse_url(&self, key: &str) -> Option<String> {
        self.jira_base_url
            .as_deref()
            .map(|base| format!("{}/browse/{key}", base.trim_end_matches('/')))
    }

    pub fn project_key(&self) -> AppResult<String> {
        let project = required(
            &self.project,
            "Jira project or ticket key is required (--project, JIRA_PROJECT, JIRA_TICKET or `jtc config init`)",
        )?;
        resolve_project(&project).map_err(AppError::Configuration)
    }
}

fn required(value: &Option<String>, message: &str) -> AppResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Configuration(message.to_string()))
}

/// Groups ticket-key prefixes under logical project names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMapping {
    #[serde(default)]
    pub mappings: BTreeMap<String, ProjectInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    #[serde(default)]
    pub ticket_keys: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl ProjectMapping {
    pub fn load(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                AppError::Configuration(format!("invalid project mapping file: {err}"))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    pub fn find_project_for_key(&self, ticket_key: &str) -> Option<&str> {
        let prefix = project_from_ticket_key(ticket_key).unwrap_or(ticket_key.trim());
        self.mappings
            .iter()
            .find(|(_, info)| info.ticket_keys.iter().any(|key| key == prefix))
            .map(|(project, _)| project.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn flags_beat_env_beat_stored() {
        let stored = StoredConfig {
            jira_base_url: Some("https://stored.example.com".to_string()),
            jira_email: Some("stored@example.com".to_string()),
            jira_token: Some("stored-token".to_string()),
            ..StoredConfig::default()
        };
        let overrides = ConfigOverrides {
            token: Some("flag-token".to_string()),
            ..ConfigOverrides::default()
        };
        let env = env_of(&[
            ("JIRA_EMAIL", "env@example.com"),
            ("JIRA_TOKEN", "env-token"),
            ("JIRA_URL", ""),
        ]);

        let config = AppConfig::resolve(stored, &overrides, env, Path::new("/tmp/jtc"));
        assert_eq!(
            config.jira_base_url.as_deref(),
            Some("https://stored.example.com")
        );
        assert_eq!(config.jira_email.as_deref(), Some("env@example.com"));
        assert_eq!(config.jira_token.as_deref(), Some("flag-token"));
    }

    #[test]
    fn applies_builtin_defaults() {
        let config = AppConfig::resolve(
            StoredConfig::default(),
            &ConfigOverrides::default(),
            env_of(&[]),
            Path::new("/tmp/jtc"),
        );
        assert_eq!(config.default_issue_type, "Task");
        assert_eq!(config.default_priority, "Medium");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.store_path, Path::new("/tmp/jtc").join("tickets.json"));
        assert!(matches!(
            config.client_config(),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn project_can_come_from_ticket_key() {
        let config = AppConfig::resolve(
            StoredConfig::default(),
            &ConfigOverrides::default(),
            env_of(&[("JIRA_TICKET", "BACK-77")]),
            Path::new("/tmp/jtc"),
        );
        assert_eq!(config.project_key().unwrap(), "BACK");

        let config = AppConfig::resolve(
            StoredConfig::default(),
            &ConfigOverrides {
                project: Some("FRONT".to_string()),
                ..ConfigOverrides::default()
            },
            env_of(&[("JIRA_TICKET", "BACK-77")]),
            Path::new("/tmp/jtc"),
        );
        assert_eq!(config.project_key().unwrap(), "FRONT");
    }

    #[test]
    fn builds_client_config() {
        let stored = StoredConfig {
            jira_base_url: Some("https://jira.example.com".to_string()),
            jira_email: Some("dev@example.com".to_string()),
            jira_token: Some("token".to_string()),
            request_timeout_secs: Some(10),
            max_retries: Some(5),
            ..StoredConfig::default()
        };
        let config = AppConfig::resolve(
            stored,
            &ConfigOverrides::default(),
            env_of(&[]),
            Path::new("/tmp/jtc"),
        );
        let client = config.client_config().unwrap();
        assert_eq!(client.base_url, "https://jira.example.com");
        assert_eq!(client.timeout, Duration::from_secs(10));
        assert_eq!(client.max_retries, 5);
        assert_eq!(client.retry_base_delay, Duration::from_secs(1));
    }

    #[test]
    fn stored_config_round_trips_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("jtc").join(CONFIG_FILE_NAME);
        assert_eq!(StoredConfig::load_from(&path).unwrap(), StoredConfig::default());

        let stored = StoredConfig {
            jira_base_url: Some("https://jira.example.com".to_string()),
            max_concurrent: Some(5),
            ..StoredConfig::default()
        };
        stored.save_to(&path).unwrap();
        assert_eq!(StoredConfig::load_from(&path).unwrap(), stored);
    }

    #[test]
    fn maps_ticket_prefixes_to_projects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MAPPING_FILE_NAME);
        fs::write(
            &path,
            r#"{"mappings": {"Platform": {"ticket_keys": ["BACK", "OPS"], "description": "Infra"}}}"#,
        )
        .unwrap();

        let mapping = ProjectMapping::load(&path).unwrap();
        assert_eq!(mapping.find_project_for_key("OPS-12"), Some("Platform"));
        assert_eq!(mapping.find_project_for_key("BACKLOG-1"), None);
        assert_eq!(
            ProjectMapping::load(&dir.path().join("missing.json")).unwrap(),
            ProjectMapping::default()
        );
    }
}
