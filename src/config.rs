use crate::error::ConfigError;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::info;

pub const CONFIG_PATH_ENV: &str = "CIRQL_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub cookie_name_base: String,
    pub cookie_domain: String,
    /// Origin of the web app, used to build invite and password reset links.
    pub public_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8886,
            allowed_origins: vec!["http://localhost:3000".into()],
            cookie_name_base: "cirql".into(),
            cookie_domain: "localhost".into(),
            public_base_url: "http://localhost:3000".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "cirql.sqlite".into(),
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
            public_url: "http://localhost:8886/storage".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub session_lifetime_seconds: i64,
    pub recovery_lifetime_seconds: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_lifetime_seconds: 60 * 60 * 24 * 30,
            recovery_lifetime_seconds: 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvitePolicy {
    pub code_prefix: String,
    pub default_total: i32,
    pub min_posts: i64,
    pub max_generation_attempts: u32,
}

impl Default for InvitePolicy {
    fn default() -> Self {
        Self {
            code_prefix: crate::INVITE_CODE_PREFIX.into(),
            default_total: crate::DEFAULT_INVITE_TOTAL,
            min_posts: crate::MIN_POSTS_FOR_INVITES,
            max_generation_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub sender_address: String,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub sessions: SessionConfig,
    pub invites: InvitePolicy,
    pub smtp: Option<SmtpConfig>,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|err| ConfigError::Read(path.to_owned(), err))?;
        Self::from_toml_str(&contents)
    }

    /// Loads from `$CIRQL_CONFIG` or the platform config directory, falling back to defaults
    /// when no file exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path: Option<PathBuf> = match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => default_config_path(),
        };
        match path {
            Some(path) if path.exists() => {
                info!("Loading config from {}", path.display());
                Self::from_file(&path)
            }
            Some(path) => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let prefix = &self.invites.code_prefix;
        if prefix.is_empty()
            || prefix.len() > crate::invite_ledger::MAX_INVITE_PREFIX_LENGTH
            || !prefix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Invalid(format!(
                "invites.code_prefix must be 1-24 uppercase alphanumeric or '-' characters, got {:?}",
                prefix
            )));
        }
        if self.invites.default_total < 0 {
            return Err(ConfigError::Invalid(
                "invites.default_total must not be negative".into(),
            ));
        }
        if self.invites.max_generation_attempts == 0 {
            return Err(ConfigError::Invalid(
                "invites.max_generation_attempts must be at least 1".into(),
            ));
        }
        if self.sessions.session_lifetime_seconds <= 0
            || self.sessions.recovery_lifetime_seconds <= 0
        {
            return Err(ConfigError::Invalid(
                "session lifetimes must be positive".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "cirql", "cirql").map(|dirs| dirs.config_dir().join("config.toml"))
}
