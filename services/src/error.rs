use chrono::{NaiveDate, NaiveTime};
use db::models::schedule_slot::DayOfWeek;
use sea_orm::DbErr;
use std::fmt;

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Why a start request fell outside its slot's window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowMiss {
    /// The slot is scheduled on another weekday (`actual` is `None` on Sunday).
    WrongDay {
        expected: DayOfWeek,
        actual: Option<DayOfWeek>,
    },
    BeforeStart { starts_at: NaiveTime, now: NaiveTime },
    AfterEnd { ends_at: NaiveTime, now: NaiveTime },
}

impl fmt::Display for WindowMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowMiss::WrongDay { expected, actual } => match actual {
                Some(actual) => write!(f, "class is scheduled on {}, today is {}", expected, actual),
                None => write!(f, "class is scheduled on {}, today is SUN", expected),
            },
            WindowMiss::BeforeStart { starts_at, now } => write!(
                f,
                "class starts at {}, it is only {}",
                starts_at.format("%H:%M"),
                now.format("%H:%M")
            ),
            WindowMiss::AfterEnd { ends_at, now } => write!(
                f,
                "class ended at {}, it is already {}",
                ends_at.format("%H:%M"),
                now.format("%H:%M")
            ),
        }
    }
}

/// Errors surfaced by the attendance engine.
///
/// All variants are recoverable rejections except the last four, which wrap
/// infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Cannot start slot {slot_id}: {reason}")]
    ScheduleViolation { slot_id: i64, reason: WindowMiss },

    #[error("Teacher {teacher_id} has no ongoing session")]
    NoActiveSession { teacher_id: i64 },

    #[error("Teacher {teacher_id} already checked in on {date}")]
    AlreadyMarkedToday { teacher_id: i64, date: NaiveDate },

    #[error("Live sample does not match the reference of teacher {teacher_id}")]
    NoFaceMatch { teacher_id: i64 },

    #[error("Teacher {teacher_id} has no enrolled face reference")]
    NoReferenceEnrolled { teacher_id: i64 },

    #[error("Teacher {teacher_id} is already teaching session {session_id}")]
    SessionInProgress { teacher_id: i64, session_id: i64 },

    #[error("Invalid slot: {0}")]
    InvalidSlot(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Rejections the caller may treat as an empty result rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, EngineError::NoActiveSession { .. })
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        EngineError::Validation(common::format_validation_errors(&errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_violation_message_names_the_window() {
        let err = EngineError::ScheduleViolation {
            slot_id: 7,
            reason: WindowMiss::BeforeStart {
                starts_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                now: NaiveTime::from_hms_opt(8, 41, 0).unwrap(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Cannot start slot 7: class starts at 09:00, it is only 08:41"
        );
    }

    #[test]
    fn only_missing_session_is_benign() {
        assert!(EngineError::NoActiveSession { teacher_id: 1 }.is_benign());
        assert!(!EngineError::NoFaceMatch { teacher_id: 1 }.is_benign());
    }
}
