//! Persistent configuration for restscript.
//!
//! Services, environments, endpoint aliases, headers, named filters and
//! projections live in `~/.restscript/config.yaml`. JSON files are accepted
//! too, since JSON is valid YAML.
//!
//! ```yaml
//! default_service: users
//! default_environment: dev
//! services:
//!   users:
//!     environments:
//!       dev:
//!         base_url: http://localhost:8080
//!         headers:
//!           Authorization: Bearer ${USERS_TOKEN}
//!     aliases:
//!       user: /users/{id}
//! filters:
//!   ids: .[].id
//! projections:
//!   summary: [id, name]
//! ```
//!
//! `${NAME}` in base URLs and header values is replaced from the process
//! environment at load time; unknown names are left as written.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::value::Value;

const CONFIG_FILENAME: &str = "config.yaml";
const SCRIPTS_DIRNAME: &str = "scripts";

/// Default per-request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Returns `~/.restscript`.
pub fn restscript_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".restscript")
}

/// Returns `~/.restscript/scripts`, the user scripts directory.
pub fn scripts_dir() -> PathBuf {
    restscript_dir().join(SCRIPTS_DIRNAME)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,

    /// Short names for services, e.g. `u: user-service`.
    #[serde(default)]
    pub service_aliases: BTreeMap<String, String>,

    /// Headers sent to every service in an environment.
    #[serde(default)]
    pub headers: BTreeMap<String, BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_service: Option<String>,

    #[serde(default = "default_environment")]
    pub default_environment: String,

    /// Named filter expressions, referenced as `| @name`.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,

    /// Named projection specs, referenced as `| %name`.
    #[serde(default)]
    pub projections: BTreeMap<String, Value>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentConfig>,

    /// Endpoint aliases; paths may contain `{param}` placeholders.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentConfig {
    pub base_url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services: BTreeMap::new(),
            service_aliases: BTreeMap::new(),
            headers: BTreeMap::new(),
            default_service: None,
            default_environment: default_environment(),
            filters: BTreeMap::new(),
            projections: BTreeMap::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load config from `~/.restscript/config.yaml`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        Self::load_or_default(&restscript_dir().join(CONFIG_FILENAME))
    }

    /// Like [`Config::load_from`], but a missing file yields the defaults and
    /// an unreadable or invalid one is logged and replaced by them.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        Self::load_from(path).unwrap_or_else(|e| {
            warn!(error = %e, "ignoring invalid config, using defaults");
            Self::default()
        })
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&text).map_err(|source| ConfigError::Invalid {
            path: path.to_path_buf(),
            source,
        })?;
        config.expand_env(|name| std::env::var(name).ok());
        debug!(path = %path.display(), services = config.services.len(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Looks up a service by name or by service alias.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name).or_else(|| {
            self.service_aliases
                .get(name)
                .and_then(|actual| self.services.get(actual))
        })
    }

    /// Environment-wide headers for `environment`.
    pub fn environment_headers(&self, environment: &str) -> BTreeMap<String, String> {
        self.headers.get(environment).cloned().unwrap_or_default()
    }

    /// Replaces `${NAME}` in base URLs and header values.
    pub fn expand_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for service in self.services.values_mut() {
            for env in service.environments.values_mut() {
                env.base_url = substitute_env(&env.base_url, &lookup);
                for value in env.headers.values_mut() {
                    *value = substitute_env(value, &lookup);
                }
            }
        }
        for headers in self.headers.values_mut() {
            for value in headers.values_mut() {
                *value = substitute_env(value, &lookup);
            }
        }
    }
}

fn substitute_env(text: &str, lookup: &impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end)
                if end > 0
                    && after[..end]
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_') =>
            {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push_str("${");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default_service: user-service
services:
  user-service:
    environments:
      dev:
        base_url: http://localhost:8080
        headers:
          X-Token: ${TOKEN}
    aliases:
      user: /users/{id}
service_aliases:
  u: user-service
headers:
  dev:
    Accept: application/json
filters:
  ids: .[].id
projections:
  summary: [id, name]
"#;

    #[test]
    fn default_config_values() {
        let config = Config::default();
        assert_eq!(config.default_environment, "dev");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!(config.default_service.is_none());
    }

    #[test]
    fn parse_sample_yaml() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.default_service.as_deref(), Some("user-service"));
        assert_eq!(config.default_environment, "dev");
        assert_eq!(config.filters.get("ids").map(String::as_str), Some(".[].id"));
        assert!(config.projections.contains_key("summary"));
        assert_eq!(
            config.environment_headers("dev").get("Accept").map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn service_alias_lookup() {
        let config = Config::from_yaml(SAMPLE).unwrap();
        assert!(config.service("u").is_some());
        assert!(config.service("user-service").is_some());
        assert!(config.service("nope").is_none());
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(Config::from_yaml("  \n").unwrap(), Config::default());
    }

    #[test]
    fn json_is_accepted() {
        let config = Config::from_yaml(r#"{"default_environment": "qa", "timeout_ms": 500}"#).unwrap();
        assert_eq!(config.default_environment, "qa");
        assert_eq!(config.timeout_ms, 500);
    }

    #[test]
    fn expand_env_substitutes_known_names() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.expand_env(|name| (name == "TOKEN").then(|| "secret".to_string()));
        let env = &config.services["user-service"].environments["dev"];
        assert_eq!(env.headers["X-Token"], "secret");
    }

    #[test]
    fn substitute_env_leaves_unknown_and_malformed() {
        let lookup = |_: &str| None;
        assert_eq!(substitute_env("a ${MISSING} b", &lookup), "a ${MISSING} b");
        assert_eq!(substitute_env("cost ${ 5", &lookup), "cost ${ 5");
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let err = Config::load_from(Path::new("/nonexistent/restscript/config.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    fn scratch_file(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("restscript-config-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_or_default_for_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/restscript/config.yaml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn load_or_default_for_malformed_file() {
        let path = scratch_file("services: [unclosed\n  - {");
        let config = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.default_environment, "dev");
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    }

    #[test]
    fn load_or_default_reads_valid_file() {
        let path = scratch_file("default_service: users\ntimeout_ms: 500\n");
        let config = Config::load_or_default(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.default_service.as_deref(), Some("users"));
        assert_eq!(config.timeout_ms, 500);
    }
}
