//! Configuration file handling.
//!
//! The configuration lives in a TOML file (by default
//! `<config_dir>/justcal/config.toml`) with two sections: `[caldav]` for the
//! server connection and `[preferences]` for defaults applied by the commands.

use std::path::{Path, PathBuf};

use chrono::format::{Item, StrftimeItems};
use chrono_tz::Tz;
use dialoguer::{Input, Password};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable consulted before the configured password.
pub const PASSWORD_ENV: &str = "JUSTCAL_PASSWORD";

const EXAMPLE_URL: &str = "https://nextcloud.example.com/remote.php/dav";

/// Upper bound for `preferences.default_duration`: one year in minutes.
pub const MAX_DEFAULT_DURATION: i64 = 366 * 24 * 60;

/// Upper bound for `preferences.list_days`: one hundred years.
pub const MAX_LIST_DAYS: i64 = 36_600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration not found at {}. Run 'justcal config --init' to create it.", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to load config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Key must be in format 'section.key', got: {0}")]
    KeyFormat(String),

    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid timezone in config: {0}")]
    InvalidTimezone(String),

    #[error("{0}")]
    Missing(String),

    #[error("Could not determine the user configuration directory")]
    NoConfigDir,

    #[error("Prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Complete configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub caldav: CalDavSettings,
    pub preferences: Preferences,
}

/// Server connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalDavSettings {
    /// CalDAV endpoint, e.g. a Nextcloud `remote.php/dav` URL.
    pub url: String,
    pub username: String,
    /// Plain-text fallback; `JUSTCAL_PASSWORD` takes precedence.
    pub password: String,
    /// Display name of the calendar to operate on.
    pub calendar: String,
}

impl Default for CalDavSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            username: String::new(),
            password: String::new(),
            calendar: "Personal".to_string(),
        }
    }
}

/// Defaults applied by the commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Event length in minutes when `add` gets no end.
    pub default_duration: i64,
    /// IANA zone used to interpret and display dates.
    pub timezone: String,
    /// strftime format for dates in command summaries.
    pub date_format: String,
    /// Length of the `list` window in days.
    pub list_days: i64,
    /// Reject `--from` after `--to` instead of warning.
    pub strict_ranges: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            default_duration: 60,
            timezone: "America/New_York".to_string(),
            date_format: "%Y-%m-%d %H:%M".to_string(),
            list_days: 7,
            strict_ranges: false,
        }
    }
}

impl Config {
    /// `<config_dir>/justcal/config.toml`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("justcal").join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the file, creating parent directories. On Unix the file is made
    /// readable by its owner only, since it may hold a password.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }

        tracing::info!(path = %path.display(), "saved configuration");
        Ok(())
    }

    /// Set a value addressed as `section.key`. The configuration is left
    /// untouched when the result would not validate.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, name) = key
            .split_once('.')
            .ok_or_else(|| ConfigError::KeyFormat(key.to_string()))?;

        let mut next = self.clone();
        let caldav = &mut next.caldav;
        let prefs = &mut next.preferences;
        match (section, name) {
            ("caldav", "url") => caldav.url = value.to_string(),
            ("caldav", "username") => caldav.username = value.to_string(),
            ("caldav", "password") => caldav.password = value.to_string(),
            ("caldav", "calendar") => caldav.calendar = value.to_string(),
            ("preferences", "default_duration") => prefs.default_duration = parse_value(key, value)?,
            ("preferences", "timezone") => {
                value
                    .parse::<Tz>()
                    .map_err(|_| ConfigError::InvalidTimezone(value.to_string()))?;
                prefs.timezone = value.to_string();
            }
            ("preferences", "date_format") => prefs.date_format = value.to_string(),
            ("preferences", "list_days") => prefs.list_days = parse_value(key, value)?,
            ("preferences", "strict_ranges") => prefs.strict_ranges = parse_value(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// TOML rendering with the password masked.
    pub fn show(&self) -> Result<String> {
        let mut display = self.clone();
        if !display.caldav.password.is_empty() {
            display.caldav.password = "***".to_string();
        }
        Ok(toml::to_string_pretty(&display)?)
    }

    /// The configured zone.
    pub fn timezone(&self) -> Result<Tz> {
        self.preferences
            .timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.preferences.timezone.clone()))
    }

    /// Password from `JUSTCAL_PASSWORD`, else from the file.
    pub fn password(&self) -> Result<String> {
        self.password_with(std::env::var(PASSWORD_ENV).ok())
    }

    fn password_with(&self, from_env: Option<String>) -> Result<String> {
        if let Some(password) = from_env.filter(|p| !p.is_empty()) {
            return Ok(password);
        }
        if self.caldav.password.is_empty() {
            return Err(ConfigError::Missing(format!(
                "Password not found. Set {PASSWORD_ENV} or run 'justcal config --init'."
            )));
        }
        Ok(self.caldav.password.clone())
    }

    /// Ask for the connection settings on the terminal.
    pub fn prompt() -> Result<Self> {
        let defaults = Config::default();

        let url: String = Input::new()
            .with_prompt("CalDAV URL")
            .default(EXAMPLE_URL.to_string())
            .interact_text()?;
        let username: String = Input::new().with_prompt("Username").interact_text()?;
        let password = Password::new().with_prompt("Password").interact()?;
        let calendar: String = Input::new()
            .with_prompt("Calendar name")
            .default(defaults.caldav.calendar.clone())
            .interact_text()?;
        let timezone: String = Input::new()
            .with_prompt("Timezone")
            .default(defaults.preferences.timezone.clone())
            .validate_with(|tz: &String| {
                tz.parse::<Tz>()
                    .map(|_| ())
                    .map_err(|_| format!("Unknown timezone: {tz}"))
            })
            .interact_text()?;

        let config = Config {
            caldav: CalDavSettings {
                url: url.trim().to_string(),
                username: username.trim().to_string(),
                password,
                calendar: calendar.trim().to_string(),
            },
            preferences: Preferences {
                timezone: timezone.trim().to_string(),
                ..defaults.preferences
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let prefs = &self.preferences;
        if !(0..=MAX_DEFAULT_DURATION).contains(&prefs.default_duration) {
            return Err(invalid(
                "preferences.default_duration",
                &format!("must be between 0 and {MAX_DEFAULT_DURATION} minutes"),
            ));
        }
        if !(0..=MAX_LIST_DAYS).contains(&prefs.list_days) {
            return Err(invalid(
                "preferences.list_days",
                &format!("must be between 0 and {MAX_LIST_DAYS} days"),
            ));
        }
        if StrftimeItems::new(&prefs.date_format).any(|item| matches!(item, Item::Error)) {
            return Err(invalid("preferences.date_format", "not a valid strftime format"));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{value}': {e}"),
    })
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.caldav.calendar, "Personal");
        assert_eq!(config.preferences.default_duration, 60);
        assert_eq!(config.preferences.timezone, "America/New_York");
        assert_eq!(config.preferences.list_days, 7);
        assert!(!config.preferences.strict_ranges);
    }

    #[test]
    fn test_parse_partial_toml() {
        let toml = r#"
[caldav]
url = "https://cloud.example.com/remote.php/dav"
username = "alice"

[preferences]
timezone = "Europe/Berlin"
"#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.caldav.username, "alice");
        assert_eq!(config.caldav.calendar, "Personal");
        assert_eq!(config.preferences.default_duration, 60);
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::from_toml("[caldav\nurl = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_invalid_date_format_rejected() {
        let err = Config::from_toml("[preferences]\ndate_format = \"%Q\"").unwrap_err();
        assert!(err.to_string().contains("date_format"));
    }

    #[test]
    fn test_set_known_keys() {
        let mut config = Config::default();
        config.set("caldav.calendar", "Work").unwrap();
        config.set("preferences.default_duration", "30").unwrap();
        config.set("preferences.strict_ranges", "true").unwrap();
        config.set("preferences.timezone", "Asia/Tokyo").unwrap();
        assert_eq!(config.caldav.calendar, "Work");
        assert_eq!(config.preferences.default_duration, 30);
        assert!(config.preferences.strict_ranges);
        assert_eq!(config.preferences.timezone, "Asia/Tokyo");
    }

    #[test]
    fn test_set_rejects_bad_input() {
        let mut config = Config::default();
        assert!(matches!(config.set("timezone", "UTC"), Err(ConfigError::KeyFormat(_))));
        assert!(matches!(config.set("caldav.port", "80"), Err(ConfigError::UnknownKey(_))));
        assert!(matches!(
            config.set("preferences.default_duration", "an hour"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config.set("preferences.timezone", "Mars/Olympus"),
            Err(ConfigError::InvalidTimezone(_))
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_oversized_windows_rejected() {
        let mut config = Config::default();
        let err = config
            .set("preferences.list_days", "1000000000000000")
            .unwrap_err();
        assert!(err.to_string().contains("preferences.list_days"));
        assert!(matches!(
            config.set("preferences.default_duration", "9999999999"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert_eq!(config, Config::default());

        config.set("preferences.list_days", &MAX_LIST_DAYS.to_string()).unwrap();
        assert_eq!(config.preferences.list_days, MAX_LIST_DAYS);

        let err = Config::from_toml("[preferences]\ndefault_duration = 600000").unwrap_err();
        assert!(err.to_string().contains("default_duration"));
        assert!(Config::from_toml("[preferences]\nlist_days = -1").is_err());
    }

    #[test]
    fn test_show_masks_password() {
        let mut config = Config::default();
        config.caldav.password = "hunter2".to_string();
        let shown = config.show().unwrap();
        assert!(shown.contains("password = \"***\""));
        assert!(!shown.contains("hunter2"));

        let shown = Config::default().show().unwrap();
        assert!(shown.contains("password = \"\""));
    }

    #[test]
    fn test_password_precedence() {
        let mut config = Config::default();
        assert!(matches!(config.password_with(None), Err(ConfigError::Missing(_))));

        config.caldav.password = "from-file".to_string();
        assert_eq!(config.password_with(None).unwrap(), "from-file");
        assert_eq!(config.password_with(Some(String::new())).unwrap(), "from-file");
        assert_eq!(
            config.password_with(Some("from-env".to_string())).unwrap(),
            "from-env"
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.caldav.url = "https://dav.example.com".to_string();
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), config);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("justcal config --init"));
    }
}
