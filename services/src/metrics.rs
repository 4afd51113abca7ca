//! Discipline and performance metrics over one teacher and one date range.
//!
//! Everything here is pure: callers load a snapshot (see `snapshot`) and pass
//! it in. A malformed record contributes zero instead of failing the report.

use crate::calendar::{self, DateRange};
use crate::settings::EngineSettings;
use chrono::{DateTime, Timelike, Utc};
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::class_session::Model as Session;
use db::models::schedule_slot::Model as Slot;
use serde::Serialize;
use strum::Display;

/// A session joined with its slot. `slot` is `None` for an extra class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session: Session,
    pub slot: Option<Slot>,
}

impl SessionView {
    pub fn extra(session: Session) -> Self {
        Self { session, slot: None }
    }

    pub fn scheduled(session: Session, slot: Slot) -> Self {
        Self {
            session,
            slot: Some(slot),
        }
    }

    /// Minutes late past the slot start, by wall-clock minute. `None` for extra classes.
    pub fn minutes_late(&self, settings: &EngineSettings) -> Option<i64> {
        let slot = self.slot.as_ref()?;
        let started = minute_of_day(settings, self.session.started_at);
        Some(started - (slot.start_time.hour() * 60 + slot.start_time.minute()) as i64)
    }

    pub fn is_late_entry(&self, settings: &EngineSettings) -> bool {
        self.minutes_late(settings)
            .is_some_and(|late| late > settings.late_grace.num_minutes())
    }

    pub fn is_early_exit(&self, settings: &EngineSettings) -> bool {
        match (&self.slot, self.session.ended_at) {
            (Some(slot), Some(ended_at)) => {
                minute_of_day(settings, ended_at)
                    < (slot.end_time.hour() * 60 + slot.end_time.minute()) as i64
            }
            _ => false,
        }
    }
}

fn minute_of_day(settings: &EngineSettings, at: DateTime<Utc>) -> i64 {
    let local = settings.local_time(at);
    (local.hour() * 60 + local.minute()) as i64
}

/// Snapshot of one teacher's rows for a range.
#[derive(Debug, Clone, Copy)]
pub struct MetricsInput<'a> {
    pub range: DateRange,
    /// The teacher's current weekly slots.
    pub slots: &'a [Slot],
    pub sessions: &'a [SessionView],
    pub attendance: &'a [attendance_record::Model],
}

/// Counters and ratios for one teacher over one range.
///
/// Percentages are rounded to one decimal and capped at 100.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub range: DateRange,
    pub expected_minutes: f64,
    pub active_minutes: f64,
    pub consistency: f64,
    pub scheduled_classes: u32,
    pub completed_sessions: u32,
    pub completion_rate: f64,
    pub late_entries: u32,
    pub early_exits: u32,
    pub interruptions: u32,
    pub extra_classes: u32,
    pub days_present: u32,
    pub late_check_ins: u32,
    pub risk_score: u8,
}

pub fn compute(input: &MetricsInput<'_>, settings: &EngineSettings) -> MetricsReport {
    let mut expected_minutes = 0.0;
    let mut active_minutes = 0.0;
    let mut completed_sessions = 0;
    let mut late_entries = 0;
    let mut early_exits = 0;
    let mut interruptions = 0;
    let mut extra_classes = 0;

    let in_range = input
        .sessions
        .iter()
        .filter(|view| input.range.contains(view.session.session_date));

    for view in in_range {
        let session = &view.session;

        if session.is_completed() {
            completed_sessions += 1;
            active_minutes += session.active_minutes().max(0.0);
            if let Some(slot) = &view.slot {
                expected_minutes += slot.duration_minutes().max(0) as f64;
            }
        }

        if view.slot.is_none() {
            extra_classes += 1;
        }
        if view.is_late_entry(settings) {
            late_entries += 1;
        }
        if view.is_early_exit(settings) {
            early_exits += 1;
        }
        interruptions += session.interruptions();
    }

    let scheduled_classes = calendar::expected_count(input.slots, input.range);

    let attendance = input
        .attendance
        .iter()
        .filter(|record| input.range.contains(record.date));
    let (days_present, late_check_ins) = attendance.fold((0, 0), |(days, late), record| {
        let late = late + u32::from(record.status == AttendanceStatus::Late);
        (days + 1, late)
    });

    let mut report = MetricsReport {
        range: input.range,
        expected_minutes,
        active_minutes: round1(active_minutes),
        consistency: percentage(active_minutes, expected_minutes),
        scheduled_classes,
        completed_sessions,
        completion_rate: percentage(completed_sessions as f64, scheduled_classes as f64),
        late_entries,
        early_exits,
        interruptions,
        extra_classes,
        days_present,
        late_check_ins,
        risk_score: 0,
    };
    report.risk_score = risk_score(&report);
    report
}

/// `100 * part / whole` rounded to one decimal, capped at 100; zero for an empty whole.
pub fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !part.is_finite() || !whole.is_finite() {
        return 0.0;
    }
    round1((100.0 * part / whole).clamp(0.0, 100.0))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Composite penalty in `0..=10`.
pub fn risk_score(report: &MetricsReport) -> u8 {
    let mut score = 0;
    if report.consistency < 75.0 {
        score += 3;
    } else if report.consistency <= 85.0 {
        score += 2;
    }
    if report.early_exits > 3 {
        score += 2;
    }
    if report.late_entries > 3 {
        score += 1;
    }
    if report.interruptions > 0 {
        score += 2;
    }
    if report.completion_rate < 80.0 {
        score += 2;
    }
    score
}

/// Label used by the defaulter export and the per-teacher report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum Standing {
    #[strum(serialize = "DEFAULTER")]
    #[serde(rename = "DEFAULTER")]
    Defaulter,
    #[strum(serialize = "Warning")]
    #[serde(rename = "Warning")]
    Warning,
    #[strum(serialize = "Good Standing")]
    #[serde(rename = "Good Standing")]
    GoodStanding,
}

/// Category of the dashboard gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum PerformanceCategory {
    Reliable,
    #[strum(serialize = "Needs Attention")]
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
    Defaulter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Performance {
    /// `0..=100`, higher is better.
    pub score: f64,
    pub category: PerformanceCategory,
}

impl MetricsReport {
    pub fn standing(&self) -> Standing {
        let defaulter = self.consistency < 70.0
            || self.risk_score >= 6
            || (self.early_exits > 3 && self.interruptions > 0);
        if defaulter {
            Standing::Defaulter
        } else if self.risk_score >= 3 {
            Standing::Warning
        } else {
            Standing::GoodStanding
        }
    }

    pub fn performance(&self) -> Performance {
        let score = (100.0 - self.risk_score as f64 * 10.0).max(0.0);
        let category = if score >= 75.0 {
            PerformanceCategory::Reliable
        } else if score >= 45.0 {
            PerformanceCategory::NeedsAttention
        } else {
            PerformanceCategory::Defaulter
        };
        Performance { score, category }
    }
}
