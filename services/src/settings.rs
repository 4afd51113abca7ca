use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use util::config::AppConfig;

/// Longest dashboard window accepted from configuration.
const MAX_DASHBOARD_WINDOW_DAYS: u32 = 3660;

/// Typed engine tunables, projected from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Local time zone of the schools.
    pub offset: FixedOffset,
    /// Credit granted by one matching liveness tick.
    pub tick_interval: Duration,
    /// Start delay tolerated before a session counts as a late entry.
    pub late_grace: Duration,
    /// Check-in cutoff on days without any slot.
    pub default_check_in_cutoff: NaiveTime,
    /// Euclidean distance under which two embeddings are the same person.
    pub face_match_threshold: f32,
    /// Length of the trailing dashboard window.
    pub dashboard_window_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            offset: FixedOffset::east_opt(0).expect("zero offset"),
            tick_interval: Duration::seconds(5),
            late_grace: Duration::minutes(5),
            default_check_in_cutoff: NaiveTime::from_hms_opt(9, 0, 0).expect("09:00"),
            face_match_threshold: 0.45,
            dashboard_window_days: 14,
        }
    }
}

impl EngineSettings {
    /// Reads the global configuration, keeping the default for anything out of range.
    pub fn from_config() -> Self {
        let cfg = AppConfig::global();
        let defaults = Self::default();

        let offset = offset_from_minutes(cfg.school_utc_offset_minutes).unwrap_or_else(|| {
            tracing::warn!(
                "SCHOOL_UTC_OFFSET_MINUTES={} out of range, using UTC",
                cfg.school_utc_offset_minutes
            );
            defaults.offset
        });

        let cutoff = NaiveTime::parse_from_str(cfg.default_check_in_cutoff.trim(), "%H:%M")
            .unwrap_or_else(|_| {
                tracing::warn!(
                    "DEFAULT_CHECK_IN_CUTOFF={:?} is not HH:MM, using 09:00",
                    cfg.default_check_in_cutoff
                );
                defaults.default_check_in_cutoff
            });

        let tick_interval = i64::try_from(cfg.liveness_tick_seconds.max(1))
            .ok()
            .filter(|secs| *secs <= 24 * 60 * 60)
            .map(Duration::seconds)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "LIVENESS_TICK_SECONDS={} out of range, using 5",
                    cfg.liveness_tick_seconds
                );
                defaults.tick_interval
            });

        let dashboard_window_days = if cfg.dashboard_window_days > MAX_DASHBOARD_WINDOW_DAYS {
            tracing::warn!(
                "DASHBOARD_WINDOW_DAYS={} out of range, using {}",
                cfg.dashboard_window_days,
                defaults.dashboard_window_days
            );
            defaults.dashboard_window_days
        } else {
            cfg.dashboard_window_days.max(1)
        };

        Self {
            offset,
            tick_interval,
            late_grace: Duration::minutes(cfg.late_grace_minutes as i64),
            default_check_in_cutoff: cutoff,
            face_match_threshold: cfg.face_match_threshold,
            dashboard_window_days,
        }
    }

    pub fn with_offset_minutes(mut self, minutes: i32) -> Self {
        if let Some(offset) = offset_from_minutes(minutes) {
            self.offset = offset;
        }
        self
    }

    /// School-local wall-clock view of an instant.
    pub fn local(&self, at: DateTime<Utc>) -> DateTime<FixedOffset> {
        at.with_timezone(&self.offset)
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        self.local(at).date_naive()
    }

    pub fn local_time(&self, at: DateTime<Utc>) -> NaiveTime {
        self.local(at).time()
    }
}

fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    minutes.checked_mul(60).and_then(FixedOffset::east_opt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serial_test::serial;

    #[test]
    fn local_projection_crosses_midnight() {
        let settings = EngineSettings::default().with_offset_minutes(120);
        let at = Utc.with_ymd_and_hms(2025, 3, 2, 23, 30, 0).unwrap();

        assert_eq!(settings.local_date(at), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(settings.local_time(at), NaiveTime::from_hms_opt(1, 30, 0).unwrap());
    }

    #[test]
    fn defaults_match_the_nominal_cadence() {
        let s = EngineSettings::default();
        assert_eq!(s.tick_interval, Duration::seconds(5));
        assert_eq!(s.late_grace, Duration::minutes(5));
        assert_eq!(s.dashboard_window_days, 14);
    }

    #[test]
    #[serial]
    fn out_of_range_config_falls_back_to_defaults() {
        AppConfig::set_school_utc_offset_minutes(i32::MAX);
        AppConfig::set_dashboard_window_days(u32::MAX);
        AppConfig::set_liveness_tick_seconds(u64::MAX);

        let s = EngineSettings::from_config();
        AppConfig::reset();

        assert_eq!(s.offset, EngineSettings::default().offset);
        assert_eq!(s.dashboard_window_days, 14);
        assert_eq!(s.tick_interval, Duration::seconds(5));
        assert_eq!(
            EngineSettings::default().with_offset_minutes(i32::MIN).offset,
            EngineSettings::default().offset
        );
    }

    #[test]
    #[serial]
    fn in_range_config_is_taken_as_is() {
        AppConfig::set_school_utc_offset_minutes(-180);
        AppConfig::set_dashboard_window_days(30);
        AppConfig::set_liveness_tick_seconds(10);

        let s = EngineSettings::from_config();
        AppConfig::reset();

        assert_eq!(s.offset, FixedOffset::west_opt(3 * 3600).unwrap());
        assert_eq!(s.dashboard_window_days, 30);
        assert_eq!(s.tick_interval, Duration::seconds(10));
    }
}
