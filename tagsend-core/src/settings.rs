use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"# tagsend configuration
# Every key below is optional; commented values are the built-in defaults.
# Any key can also be overridden with TAGSEND__SECTION__KEY environment variables.

[app]
# name = "tagsend"

[message]
# Seconds to wait between two consecutive sends
# send_interval = 2.0
# retry_count = 3
# Ask before each batch send (interactive CLI only)
# confirm_before_send = true
# Require an exact contact name match in the chat client
# exact_match = true

[contacts]
# data_file = "~/.local/share/tagsend/contacts.json"
# backup_dir = "~/.local/share/tagsend/backups"
# auto_backup = true

[friend_details]
# data_file = "~/.local/share/tagsend/friend_details.json"

[logging]
# level = "info"
# file = "~/.local/share/tagsend/logs/tagsend.log"

[driver]
# "dry-run" only logs messages, "command" runs the helper program below
# kind = "dry-run"
# program = "wxauto-bridge"
# args = []
"#;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config key '{0}'")]
    InvalidKey(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub app: AppSection,
    pub message: MessageConfig,
    pub contacts: ContactsConfig,
    pub friend_details: FriendDetailsConfig,
    pub logging: LoggingConfig,
    pub driver: DriverConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MessageConfig {
    pub send_interval: f64,
    pub retry_count: u32,
    pub confirm_before_send: bool,
    pub exact_match: bool,
}

impl MessageConfig {
    /// `send_interval` must be a finite, non-negative number of seconds that
    /// fits a `Duration`.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if let Err(e) = std::time::Duration::try_from_secs_f64(self.send_interval) {
            return Err(SettingsError::InvalidValue {
                key: "message.send_interval",
                reason: format!("{} ({e})", self.send_interval),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContactsConfig {
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub auto_backup: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FriendDetailsConfig {
    pub data_file: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum DriverKind {
    DryRun,
    Command,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriverConfig {
    pub kind: DriverKind,
    pub program: String,
    pub args: Vec<String>,
}

/// Loaded configuration: the typed view plus the raw layered config for
/// dotted-key lookups such as `message.send_interval`.
#[derive(Debug, Clone)]
pub struct Settings {
    path: PathBuf,
    raw: Config,
    app: AppConfig,
    created: bool,
}

impl Settings {
    /// Loads the config file at `path` (or the platform default), writing a
    /// commented default file first if none exists.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| SettingsError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let created = !config_path.exists();
        if created {
            std::fs::write(&config_path, DEFAULT_CONFIG).map_err(|source| SettingsError::Io {
                path: config_path.clone(),
                source,
            })?;
        }

        let mut settings = Self::from_file(&config_path)?;
        settings.created = created;
        Ok(settings)
    }

    /// Loads `path` over the built-in defaults. A missing file is not an error.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = defaults()?
            .add_source(File::from(path).required(false))
            .add_source(env_overrides())
            .build()?;
        let app: AppConfig = raw.clone().try_deserialize()?;

        Ok(Self {
            path: path.to_path_buf(),
            raw,
            app,
            created: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether [`Settings::load`] wrote the default file this time.
    pub fn created_default(&self) -> bool {
        self.created
    }

    pub fn app(&self) -> &AppConfig {
        &self.app
    }

    /// Dotted-path lookup, `None` when the key is absent or has the wrong type.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.raw.get::<T>(key).ok()
    }

    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Writes `key = value` into the config file and reloads. `value` is read
    /// as a TOML literal when possible (`true`, `1.5`, `["a"]`), otherwise as
    /// a plain string. The file is left untouched if the result does not load.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(SettingsError::InvalidKey(key.to_string()));
        }

        let mut document = match std::fs::read_to_string(&self.path) {
            Ok(text) => text.parse::<toml::Table>()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => toml::Table::new(),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| SettingsError::InvalidKey(key.to_string()))?;
        let mut table = &mut document;
        for segment in parents {
            table = table
                .entry(segment.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()))
                .as_table_mut()
                .ok_or_else(|| SettingsError::InvalidKey(key.to_string()))?;
        }
        table.insert(last.to_string(), parse_value(value));

        let text = toml::to_string_pretty(&document)?;
        defaults()?
            .add_source(File::from_str(&text, FileFormat::Toml))
            .build()?
            .try_deserialize::<AppConfig>()?
            .message
            .validate()?;

        std::fs::write(&self.path, text).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!("Set config key {} in {:?}", key, self.path);

        *self = Self::from_file(&self.path)?;
        Ok(())
    }
}

fn parse_value(raw: &str) -> toml::Value {
    format!("value = {raw}")
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

fn env_overrides() -> Environment {
    Environment::with_prefix("TAGSEND")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let data_dir = default_data_dir();
    let path_str = |p: PathBuf| p.to_string_lossy().into_owned();

    Config::builder()
        .set_default("app.name", "tagsend")?
        .set_default("message.send_interval", 2.0)?
        .set_default("message.retry_count", 3_i64)?
        .set_default("message.confirm_before_send", true)?
        .set_default("message.exact_match", true)?
        .set_default("contacts.data_file", path_str(data_dir.join("contacts.json")))?
        .set_default("contacts.backup_dir", path_str(data_dir.join("backups")))?
        .set_default("contacts.auto_backup", true)?
        .set_default(
            "friend_details.data_file",
            path_str(data_dir.join("friend_details.json")),
        )?
        .set_default("logging.level", "info")?
        .set_default(
            "logging.file",
            path_str(data_dir.join("logs").join("tagsend.log")),
        )?
        .set_default("driver.kind", "dry-run")?
        .set_default("driver.program", "wxauto-bridge")?
        .set_default("driver.args", Vec::<String>::new())
}

pub fn get_config_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        config_dir.join("tagsend").join("config.toml")
    } else {
        PathBuf::from("config.toml")
    }
}

/// Platform data directory for contacts, backups and logs.
///
/// - **macOS**: `~/Library/Application Support/tagsend`
/// - **Linux**: `~/.local/share/tagsend`
/// - **Windows**: `%LOCALAPPDATA%\tagsend`
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("tagsend"))
        .unwrap_or_else(|| PathBuf::from("data"))
}
