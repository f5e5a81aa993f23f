use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, Result};
use crate::notify::NotifyTarget;

pub const DEFAULT_CONFIG_PATH: &str = "roster.toml";
pub const DEFAULT_DB_PORT: u16 = 3306;
pub const DEFAULT_DB_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CA_FILE: &str = "ca.pem";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_FIRST_DELAY_SECS: u64 = 10;
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_ON_DEMAND_CAP: usize = 100;
pub const DEFAULT_SCHEDULED_CAP: usize = 60;

/// Flat environment names understood for compatibility with existing
/// deployments, mapped onto their config paths. Empty values are ignored.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_PORT", "database.port"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("BOT_TOKEN", "telegram.bot_token"),
    ("CHAT_ID", "telegram.notify_chat_id"),
];

/// Paths whose environment values are taken verbatim. Env providers would
/// otherwise turn `DB_PASSWORD=0123` into the integer 123.
const TEXT_PATHS: &[&str] = &[
    "database.host",
    "database.user",
    "database.password",
    "database.name",
    "telegram.bot_token",
    "telegram.notify_chat_id",
];

/// Top-level config (roster.toml + legacy env + ROSTER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, deserialize_with = "optional_text")]
    pub host: Option<String>,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default, deserialize_with = "optional_text")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub password: String,
    /// Target database; created on first start if absent.
    #[serde(default, deserialize_with = "optional_text")]
    pub name: Option<String>,
    /// Bound for connect and for every statement.
    #[serde(default = "default_db_timeout_secs")]
    pub timeout_secs: u64,
    /// CA certificate for TLS. Relative paths resolve against the working
    /// directory; TLS is attempted only when the file exists.
    #[serde(default = "default_ca_file")]
    pub ca_file: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_DB_PORT,
            user: None,
            password: String::new(),
            name: None,
            timeout_secs: DEFAULT_DB_TIMEOUT_SECS,
            ca_file: DEFAULT_CA_FILE.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl DatabaseConfig {
    /// Resolve the settings needed to open a connection.
    ///
    /// Fails with [`CoreError::Config`] when host, user or database name is
    /// missing; the caller then runs with storage disabled.
    pub fn settings(&self) -> Result<ConnectSettings> {
        let mut missing = Vec::new();
        let host = non_empty(&self.host);
        let user = non_empty(&self.user);
        let database = non_empty(&self.name);
        if host.is_none() {
            missing.push("database.host");
        }
        if user.is_none() {
            missing.push("database.user");
        }
        if database.is_none() {
            missing.push("database.name");
        }
        match (host, user, database) {
            (Some(host), Some(user), Some(database)) => Ok(ConnectSettings {
                host,
                port: self.port,
                user,
                password: self.password.clone(),
                database,
                timeout: Duration::from_secs(self.timeout_secs.max(1)),
                ca_file: discover_ca_file(&self.ca_file),
            }),
            _ => Err(CoreError::Config(format!(
                "missing database settings: {}",
                missing.join(", ")
            ))),
        }
    }
}

/// Fully resolved connection parameters.
#[derive(Clone)]
pub struct ConnectSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub timeout: Duration,
    /// Present only when the CA file exists.
    pub ca_file: Option<PathBuf>,
}

impl std::fmt::Debug for ConnectSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("timeout", &self.timeout)
            .field("ca_file", &self.ca_file)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// Chat that receives the startup message and scheduled reports: a
    /// numeric chat id or an `@channel` name. See [`TelegramConfig::notify_target`].
    #[serde(default, deserialize_with = "optional_text")]
    pub notify_chat_id: Option<String>,
    /// Usernames (with or without `@`), numeric user IDs, or `"*"`.
    /// Empty means everyone may run record commands.
    #[serde(default)]
    pub allow_users: Vec<String>,
}

impl TelegramConfig {
    /// Parsed notify chat. `Ok(None)` when unset or blank; a malformed value
    /// is an error the caller can log without losing the rest of the config.
    pub fn notify_target(&self) -> Result<Option<NotifyTarget>> {
        match self.notify_chat_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => NotifyTarget::parse(raw).map(Some),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Lookahead for "expiring soon".
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_first_delay_secs")]
    pub first_delay_secs: u64,
    #[serde(default = "default_report_interval_secs")]
    pub interval_secs: u64,
    /// Lines per section for `/check`.
    #[serde(default = "default_on_demand_cap")]
    pub on_demand_cap: usize,
    /// Lines per section for the scheduled report.
    #[serde(default = "default_scheduled_cap")]
    pub scheduled_cap: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            first_delay_secs: DEFAULT_FIRST_DELAY_SECS,
            interval_secs: DEFAULT_REPORT_INTERVAL_SECS,
            on_demand_cap: DEFAULT_ON_DEMAND_CAP,
            scheduled_cap: DEFAULT_SCHEDULED_CAP,
        }
    }
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}
fn default_db_timeout_secs() -> u64 {
    DEFAULT_DB_TIMEOUT_SECS
}
fn default_ca_file() -> String {
    DEFAULT_CA_FILE.to_string()
}
fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}
fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}
fn default_first_delay_secs() -> u64 {
    DEFAULT_FIRST_DELAY_SECS
}
fn default_report_interval_secs() -> u64 {
    DEFAULT_REPORT_INTERVAL_SECS
}
fn default_on_demand_cap() -> usize {
    DEFAULT_ON_DEMAND_CAP
}
fn default_scheduled_cap() -> usize {
    DEFAULT_SCHEDULED_CAP
}

/// A scalar that belongs in a string field. TOML files may write
/// `notify_chat_id = -100123` or `name = 2024`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Signed(i64),
    Unsigned(u64),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Signed(n) => n.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
        }
    }
}

fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(String::from))
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Scalar::deserialize(deserializer).map(String::from)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn discover_ca_file(configured: &str) -> Option<PathBuf> {
    if configured.trim().is_empty() {
        return None;
    }
    let path = PathBuf::from(configured);
    let path = if path.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&path))
            .unwrap_or(path)
    } else {
        path
    };
    path.is_file().then_some(path)
}

/// Non-text legacy names (`DB_PORT`). Unset or blank variables are skipped
/// so an empty `DB_PORT=` does not fail extraction.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        let (name, path) = LEGACY_ENV
            .iter()
            .filter(|(_, path)| !TEXT_PATHS.contains(path))
            .find(|(name, _)| key.as_str().eq_ignore_ascii_case(name))?;
        legacy_value(name)?;
        Some((*path).into())
    })
}

fn legacy_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Raw string values for [`TEXT_PATHS`]: `ROSTER_<SECTION>__<KEY>` when set,
/// else the non-blank legacy name.
fn text_env() -> Vec<(&'static str, String)> {
    TEXT_PATHS
        .iter()
        .filter_map(|path| {
            let prefixed = format!("ROSTER_{}", path.replace('.', "__").to_ascii_uppercase());
            let value = std::env::var(&prefixed).ok().or_else(|| {
                LEGACY_ENV
                    .iter()
                    .find(|(_, p)| p == path)
                    .and_then(|(name, _)| legacy_value(name))
            })?;
            Some((*path, value))
        })
        .collect()
}

impl RosterConfig {
    /// Load config from a TOML file with env overrides.
    ///
    /// Precedence, lowest first:
    ///   1. Built-in defaults
    ///   2. TOML file (explicit path, else `roster.toml`; a missing file is fine)
    ///   3. Legacy flat env (`DB_HOST`, `BOT_TOKEN`, `CHAT_ID`, ...)
    ///   4. `ROSTER_<SECTION>__<KEY>` env vars
    ///
    /// Credentials, names and chat targets come from the environment as-is,
    /// never reinterpreted as numbers.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

        let mut figment = Figment::from(Serialized::defaults(RosterConfig::default()))
            .merge(Toml::file(path))
            .merge(legacy_env())
            .merge(Env::prefixed("ROSTER_").split("__"));
        for (key, value) in text_env() {
            figment = figment.merge(Serialized::default(key, value));
        }
        figment
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|_jail| {
            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.database.port, 3306);
            assert_eq!(config.database.max_attempts, 3);
            assert_eq!(config.report.window_days, 30);
            assert_eq!(config.report.interval_secs, 43_200);
            assert_eq!(config.report.on_demand_cap, 100);
            assert_eq!(config.report.scheduled_cap, 60);
            assert!(config.telegram.notify_chat_id.is_none());
            Ok(())
        });
    }

    #[test]
    fn toml_file_then_legacy_env_then_prefixed_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "roster.toml",
                r#"
                [database]
                host = "toml-host"
                user = "toml-user"
                name = "roster"
                port = 3307

                [report]
                scheduled_cap = 10
                "#,
            )?;
            jail.set_env("DB_HOST", "legacy-host");
            jail.set_env("CHAT_ID", "-1001234");
            jail.set_env("ROSTER_DATABASE__USER", "env-user");

            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.database.host.as_deref(), Some("legacy-host"));
            assert_eq!(config.database.user.as_deref(), Some("env-user"));
            assert_eq!(config.database.name.as_deref(), Some("roster"));
            assert_eq!(config.database.port, 3307);
            assert_eq!(config.report.scheduled_cap, 10);
            assert_eq!(
                config.telegram.notify_target().map_err(|e| e.to_string())?,
                Some(NotifyTarget::Id(-1_001_234))
            );
            Ok(())
        });
    }

    #[test]
    fn blank_legacy_values_are_ignored() {
        Jail::expect_with(|jail| {
            jail.set_env("CHAT_ID", "");
            jail.set_env("DB_PORT", " ");
            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert!(config.telegram.notify_chat_id.is_none());
            assert_eq!(config.database.port, 3306);
            Ok(())
        });
    }

    #[test]
    fn numeric_looking_credentials_stay_strings() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_HOST", "db");
            jail.set_env("DB_USER", "4242");
            jail.set_env("DB_PASSWORD", "0123456");
            jail.set_env("DB_NAME", "2024");
            jail.set_env("BOT_TOKEN", "123:abc");

            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.database.user.as_deref(), Some("4242"));
            assert_eq!(config.database.password, "0123456");
            assert_eq!(config.database.name.as_deref(), Some("2024"));
            assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
            let settings = config.database.settings().map_err(|e| e.to_string())?;
            assert_eq!(settings.database, "2024");
            Ok(())
        });
    }

    #[test]
    fn prefixed_password_overrides_legacy_verbatim() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_PASSWORD", "legacy");
            jail.set_env("ROSTER_DATABASE__PASSWORD", "123456");
            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.database.password, "123456");
            Ok(())
        });
    }

    #[test]
    fn channel_username_as_notify_chat() {
        Jail::expect_with(|jail| {
            jail.set_env("CHAT_ID", "@roster_channel");
            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(
                config.telegram.notify_target().map_err(|e| e.to_string())?,
                Some(NotifyTarget::Channel("@roster_channel".into()))
            );
            Ok(())
        });
    }

    #[test]
    fn malformed_notify_chat_keeps_the_rest_of_the_config() {
        Jail::expect_with(|jail| {
            jail.set_env("DB_HOST", "db");
            jail.set_env("DB_USER", "app");
            jail.set_env("DB_NAME", "roster");
            jail.set_env("BOT_TOKEN", "123:abc");
            jail.set_env("CHAT_ID", "roster channel");

            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert!(config.telegram.notify_target().is_err());
            assert!(config.database.settings().is_ok());
            assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
            Ok(())
        });
    }

    #[test]
    fn numeric_notify_chat_in_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("roster.toml", "[telegram]\nnotify_chat_id = -1009\n")?;
            let config = RosterConfig::load(None).map_err(|e| e.to_string())?;
            assert_eq!(config.telegram.notify_chat_id.as_deref(), Some("-1009"));
            Ok(())
        });
    }

    #[test]
    fn settings_report_every_missing_field() {
        let db = DatabaseConfig {
            host: Some("db".into()),
            user: Some("  ".into()),
            ..DatabaseConfig::default()
        };
        let err = db.settings().unwrap_err().to_string();
        assert!(err.contains("database.user"), "{err}");
        assert!(err.contains("database.name"), "{err}");
        assert!(!err.contains("database.host"), "{err}");
    }

    #[test]
    fn ca_file_used_only_when_present() {
        Jail::expect_with(|jail| {
            let db = DatabaseConfig {
                host: Some("db".into()),
                user: Some("app".into()),
                name: Some("roster".into()),
                ..DatabaseConfig::default()
            };
            let settings = db.settings().map_err(|e| e.to_string())?;
            assert!(settings.ca_file.is_none());

            jail.create_file("ca.pem", "-----BEGIN CERTIFICATE-----")?;
            let settings = db.settings().map_err(|e| e.to_string())?;
            let ca = settings.ca_file.expect("ca.pem discovered");
            assert!(ca.ends_with("ca.pem"));
            assert!(ca.is_absolute());
            Ok(())
        });
    }

    #[test]
    fn settings_debug_redacts_password() {
        let db = DatabaseConfig {
            host: Some("db".into()),
            user: Some("app".into()),
            password: "hunter2".into(),
            name: Some("roster".into()),
            ..DatabaseConfig::default()
        };
        let rendered = format!("{:?}", db.settings().unwrap());
        assert!(!rendered.contains("hunter2"));
    }
}
