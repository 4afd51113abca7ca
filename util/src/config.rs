//! Global application configuration manager.
//!
//! `AppConfig` is a lazily initialized, globally accessible singleton containing
//! runtime configuration values loaded from environment variables. It provides
//! thread-safe access and mutation for testing or overrides in runtime environments.

use std::env;
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};

/// Represents the complete application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub project_name: String,
    pub log_level: String,
    pub log_file: String,
    pub log_to_stdout: bool,
    pub database_path: String,
    /// Offset of the schools' local time from UTC, in minutes.
    pub school_utc_offset_minutes: i32,
    pub liveness_tick_seconds: u64,
    pub late_grace_minutes: u32,
    /// `HH:MM` cutoff used for check-ins on days without a scheduled slot.
    pub default_check_in_cutoff: String,
    pub face_match_threshold: f32,
    pub dashboard_window_days: u32,
}

/// Lazily-initialized, thread-safe singleton instance of `AppConfig`.
static CONFIG_INSTANCE: OnceLock<RwLock<AppConfig>> = OnceLock::new();

/// Reads `key` and parses it, falling back to `default` when unset or malformed.
fn parsed_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    /// Loads the configuration from `.env` and environment variables.
    ///
    /// Every field has a default, so this never panics; malformed numeric
    /// values are logged and replaced by their default.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            project_name: env::var("PROJECT_NAME").unwrap_or_else(|_| "presence-engine".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "services=info".into()),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "presence.log".into()),
            log_to_stdout: env::var("LOG_TO_STDOUT").unwrap_or_else(|_| "false".into()) == "true",
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "data/presence.db".into()),
            school_utc_offset_minutes: parsed_or("SCHOOL_UTC_OFFSET_MINUTES", 0),
            liveness_tick_seconds: parsed_or("LIVENESS_TICK_SECONDS", 5),
            late_grace_minutes: parsed_or("LATE_GRACE_MINUTES", 5),
            default_check_in_cutoff: env::var("DEFAULT_CHECK_IN_CUTOFF")
                .unwrap_or_else(|_| "09:00".into()),
            face_match_threshold: parsed_or("FACE_MATCH_THRESHOLD", 0.45),
            dashboard_window_days: parsed_or("DASHBOARD_WINDOW_DAYS", 14),
        }
    }

    /// Returns a shared reference to the global configuration.
    ///
    /// # Panics
    /// Panics if the lock cannot be acquired.
    pub fn global() -> std::sync::RwLockReadGuard<'static, AppConfig> {
        CONFIG_INSTANCE
            .get_or_init(|| RwLock::new(AppConfig::from_env()))
            .read()
            .expect("Failed to acquire AppConfig read lock")
    }

    /// Resets the configuration by reloading from environment variables.
    ///
    /// Useful in tests to clear overrides.
    pub fn reset() {
        if let Some(lock) = CONFIG_INSTANCE.get() {
            let mut guard = lock.write().expect("Failed to acquire AppConfig write lock");
            *guard = AppConfig::from_env();
        }
    }

    fn set_field<F>(setter: F)
    where
        F: FnOnce(&mut AppConfig),
    {
        let lock = CONFIG_INSTANCE.get_or_init(|| RwLock::new(AppConfig::from_env()));
        let mut guard = lock
            .write()
            .expect("Failed to acquire AppConfig write lock");
        setter(&mut guard);
    }

    // --- Per-field setters below ---

    pub fn set_env(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.env = value.into());
    }

    pub fn set_log_level(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_level = value.into());
    }

    pub fn set_log_file(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.log_file = value.into());
    }

    pub fn set_log_to_stdout(value: bool) {
        AppConfig::set_field(|cfg| cfg.log_to_stdout = value);
    }

    pub fn set_database_path(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.database_path = value.into());
    }

    pub fn set_school_utc_offset_minutes(value: i32) {
        AppConfig::set_field(|cfg| cfg.school_utc_offset_minutes = value);
    }

    pub fn set_liveness_tick_seconds(value: u64) {
        AppConfig::set_field(|cfg| cfg.liveness_tick_seconds = value);
    }

    pub fn set_late_grace_minutes(value: u32) {
        AppConfig::set_field(|cfg| cfg.late_grace_minutes = value);
    }

    pub fn set_default_check_in_cutoff(value: impl Into<String>) {
        AppConfig::set_field(|cfg| cfg.default_check_in_cutoff = value.into());
    }

    pub fn set_face_match_threshold(value: f32) {
        AppConfig::set_field(|cfg| cfg.face_match_threshold = value);
    }

    pub fn set_dashboard_window_days(value: u32) {
        AppConfig::set_field(|cfg| cfg.dashboard_window_days = value);
    }
}

// --- Free-function accessors ---

pub fn env() -> String {
    AppConfig::global().env.clone()
}

pub fn project_name() -> String {
    AppConfig::global().project_name.clone()
}

pub fn log_level() -> String {
    AppConfig::global().log_level.clone()
}

pub fn log_file() -> String {
    AppConfig::global().log_file.clone()
}

pub fn log_to_stdout() -> bool {
    AppConfig::global().log_to_stdout
}

pub fn database_path() -> String {
    AppConfig::global().database_path.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn malformed_numbers_fall_back_to_defaults() {
        unsafe {
            env::set_var("LIVENESS_TICK_SECONDS", "five");
            env::set_var("SCHOOL_UTC_OFFSET_MINUTES", "120");
        }
        let cfg = AppConfig::from_env();
        assert_eq!(cfg.liveness_tick_seconds, 5);
        assert_eq!(cfg.school_utc_offset_minutes, 120);
        unsafe {
            env::remove_var("LIVENESS_TICK_SECONDS");
            env::remove_var("SCHOOL_UTC_OFFSET_MINUTES");
        }
    }

    #[test]
    #[serial]
    fn setters_override_global_until_reset() {
        AppConfig::set_late_grace_minutes(10u32);
        assert_eq!(AppConfig::global().late_grace_minutes, 10);

        AppConfig::reset();
        assert_eq!(AppConfig::global().late_grace_minutes, 5);
    }
}
