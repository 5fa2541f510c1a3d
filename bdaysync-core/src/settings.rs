//! Runtime settings.
//!
//! Flat keys are read from the environment (`CALDAV_SERVER_URL`, ...) layered
//! over an optional TOML file with the same keys in lowercase. Everything
//! except the two sets of server credentials has a default.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{SyncError, SyncResult};
use crate::schedule::CronSchedule;
use crate::scheduler::ScheduleConfig;
use crate::template::{
    DEFAULT_CATEGORY, DEFAULT_DESCRIPTION_TEMPLATE, DEFAULT_TITLE_TEMPLATE, EventTemplate, ReminderSpec,
};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_VAR: &str = "BDAYSYNC_CONFIG";

pub const DEFAULT_SYNC_SCHEDULE: &str = "0 6 * * *";
pub const DEFAULT_DIAGNOSTIC_SCHEDULE: &str = "0 7 * * 0";
pub const DEFAULT_LOG_FILE: &str = "/var/log/birthday-sync/sync.log";

fn default_title() -> String {
    DEFAULT_TITLE_TEMPLATE.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION_TEMPLATE.to_string()
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_reminder_days() -> String {
    "1".to_string()
}

fn default_sync_schedule() -> String {
    DEFAULT_SYNC_SCHEDULE.to_string()
}

fn default_diagnostic_schedule() -> String {
    DEFAULT_DIAGNOSTIC_SCHEDULE.to_string()
}

fn default_startup_delay() -> u64 {
    30
}

fn default_run_mode() -> String {
    "daemon".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

fn default_true() -> bool {
    true
}

/// Server URL and credentials for one DAV service.
#[derive(Clone, PartialEq, Eq)]
pub struct DavAccount {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DavAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DavAccount")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// How the binary runs when no subcommand is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Once,
    Daemon,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cardav_server_url: Option<String>,
    #[serde(default)]
    pub cardav_username: Option<String>,
    #[serde(default)]
    pub cardav_password: Option<String>,

    #[serde(default)]
    pub caldav_server_url: Option<String>,
    #[serde(default)]
    pub caldav_username: Option<String>,
    #[serde(default)]
    pub caldav_password: Option<String>,

    #[serde(default = "default_title")]
    pub birthday_event_title: String,
    #[serde(default = "default_description")]
    pub birthday_event_description: String,
    /// Comma separated days before the birthday.
    #[serde(default = "default_reminder_days")]
    pub birthday_reminder_days: String,
    #[serde(default)]
    pub birthday_reminder_message: Option<String>,
    #[serde(default = "default_category")]
    pub birthday_event_category: String,
    #[serde(default = "default_true")]
    pub birthday_update_existing: bool,

    #[serde(default = "default_sync_schedule")]
    pub sync_schedule: String,
    #[serde(default = "default_diagnostic_schedule")]
    pub diagnostic_schedule: String,
    #[serde(default)]
    pub sync_interval_hours: u32,
    /// Seconds.
    #[serde(default = "default_startup_delay")]
    pub startup_delay: u64,
    #[serde(default = "default_run_mode")]
    pub run_mode: String,
    #[serde(default)]
    pub health_check_connectivity: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Settings {
    /// Load from the config file (if any) and the environment.
    pub fn load() -> SyncResult<Self> {
        let mut builder = Config::builder();
        if let Some(path) = Self::config_path() {
            builder = builder.add_source(File::from(path).required(false));
        }
        let config = builder.add_source(Environment::default()).build()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> SyncResult<Self> {
        Ok(config.try_deserialize()?)
    }

    /// `$BDAYSYNC_CONFIG`, else `<config dir>/bdaysync/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_VAR) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("bdaysync").join("config.toml"))
    }

    /// Check that every required key is present, reporting all missing ones.
    pub fn validate(&self) -> SyncResult<()> {
        let required = [
            ("CARDAV_SERVER_URL", &self.cardav_server_url),
            ("CARDAV_USERNAME", &self.cardav_username),
            ("CARDAV_PASSWORD", &self.cardav_password),
            ("CALDAV_SERVER_URL", &self.caldav_server_url),
            ("CALDAV_USERNAME", &self.caldav_username),
            ("CALDAV_PASSWORD", &self.caldav_password),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(key, _)| *key)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn carddav_account(&self) -> SyncResult<DavAccount> {
        account(
            "CARDAV",
            &self.cardav_server_url,
            &self.cardav_username,
            &self.cardav_password,
        )
    }

    pub fn caldav_account(&self) -> SyncResult<DavAccount> {
        account(
            "CALDAV",
            &self.caldav_server_url,
            &self.caldav_username,
            &self.caldav_password,
        )
    }

    /// The event template. An unreadable reminder list falls back to one day.
    pub fn event_template(&self) -> EventTemplate {
        let reminders = match ReminderSpec::parse(&self.birthday_reminder_days) {
            Ok(spec) if !spec.is_empty() => spec,
            Ok(_) => ReminderSpec::default(),
            Err(e) => {
                tracing::warn!(%e, "using default reminder of 1 day");
                ReminderSpec::default()
            }
        };

        EventTemplate {
            title: self.birthday_event_title.clone(),
            description: self.birthday_event_description.clone(),
            reminder_message: self
                .birthday_reminder_message
                .clone()
                .filter(|m| !m.trim().is_empty()),
            category: self.birthday_event_category.clone(),
            reminders,
            update_existing: self.birthday_update_existing,
        }
    }

    /// Scheduler settings. Invalid cron expressions fall back to hourly.
    pub fn schedule_config(&self) -> ScheduleConfig {
        ScheduleConfig {
            sync_schedule: CronSchedule::parse_or_hourly(&self.sync_schedule),
            diagnostic_schedule: CronSchedule::parse_or_hourly(&self.diagnostic_schedule),
            interval_hours: self.sync_interval_hours,
            startup_delay: Duration::from_secs(self.startup_delay),
        }
    }

    pub fn run_mode(&self) -> RunMode {
        if self.run_mode.trim().eq_ignore_ascii_case("once") {
            RunMode::Once
        } else {
            RunMode::Daemon
        }
    }
}

fn account(
    prefix: &str,
    url: &Option<String>,
    username: &Option<String>,
    password: &Option<String>,
) -> SyncResult<DavAccount> {
    let get = |value: &Option<String>, key: &str| {
        value
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SyncError::Config(format!("{prefix}_{key} is not set")))
    };

    Ok(DavAccount {
        url: get(url, "SERVER_URL")?,
        username: get(username, "USERNAME")?,
        password: get(password, "PASSWORD")?,
    })
}
