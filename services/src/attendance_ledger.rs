//! Once-per-day biometric check-in.

use crate::administration::load_reference;
use crate::biometric::Embedding;
use crate::calendar::DateRange;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use chrono::{Datelike, NaiveTime, Timelike};
use db::models::attendance_record::{self, AttendanceStatus};
use db::models::schedule_slot::{DayOfWeek, Model as Slot};
use sea_orm::{DbErr, SqlErr, TransactionTrait};
use tracing::info;

/// Cutoff for a day: the earliest slot start, or `default_cutoff` without slots.
pub fn check_in_cutoff(slots_that_day: &[Slot], default_cutoff: NaiveTime) -> NaiveTime {
    slots_that_day
        .iter()
        .map(|s| s.start_time)
        .min()
        .unwrap_or(default_cutoff)
}

/// Late iff strictly after the day's cutoff.
pub fn classify(time: NaiveTime, slots_that_day: &[Slot], default_cutoff: NaiveTime) -> AttendanceStatus {
    if time > check_in_cutoff(slots_that_day, default_cutoff) {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    }
}

impl Engine {
    /// Records today's check-in after the sample matches the enrolled reference.
    ///
    /// A second check-in on the same local date is rejected and the stored
    /// record is left as it was.
    pub async fn check_in(
        &self,
        teacher_id: i64,
        sample: &Embedding,
    ) -> EngineResult<attendance_record::Model> {
        let _guard = self.locks().acquire(teacher_id).await;
        let local = self.settings().local(self.now());
        let date = local.date_naive();
        let time = local.time().with_nanosecond(0).unwrap_or_else(|| local.time());

        let txn = self.db().begin().await?;
        let reference = load_reference(&txn, teacher_id).await?;
        if !self.matcher().is_same_person(&reference, sample) {
            info!("Check-in rejected for teacher {}: face mismatch", teacher_id);
            return Err(EngineError::NoFaceMatch { teacher_id });
        }

        if attendance_record::Model::find_for_day(&txn, teacher_id, date)
            .await?
            .is_some()
        {
            return Err(EngineError::AlreadyMarkedToday { teacher_id, date });
        }

        let slots = match DayOfWeek::from_weekday(date.weekday()) {
            Some(day) => Slot::for_teacher_on(&txn, teacher_id, day).await?,
            None => Vec::new(),
        };
        let status = classify(time, &slots, self.settings().default_check_in_cutoff);

        let record = attendance_record::Model::create(&txn, teacher_id, date, time, status)
            .await
            .map_err(|e| already_marked_on_conflict(e, teacher_id, date))?;
        txn.commit().await?;

        info!(
            "Teacher {} checked in on {} at {} ({})",
            teacher_id,
            date,
            time.format("%H:%M"),
            status
        );
        Ok(record)
    }

    pub async fn attendance_history(
        &self,
        teacher_id: i64,
        range: DateRange,
    ) -> EngineResult<Vec<attendance_record::Model>> {
        Ok(
            attendance_record::Model::for_teacher_between(self.db(), teacher_id, range.start, range.end)
                .await?,
        )
    }
}

fn already_marked_on_conflict(err: DbErr, teacher_id: i64, date: chrono::NaiveDate) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            EngineError::AlreadyMarkedToday { teacher_id, date }
        }
        _ => EngineError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use sea_orm::{EntityTrait, PaginatorTrait};

    fn slot_at(id: i64, h: u32, m: u32) -> Slot {
        Slot {
            id,
            teacher_id: 1,
            day: DayOfWeek::Mon,
            subject: "History".into(),
            start_time: hm(h, m),
            end_time: hm(h + 1, m),
        }
    }

    #[test]
    fn cutoff_uses_earliest_slot_or_default() {
        let default = hm(9, 0);
        assert_eq!(check_in_cutoff(&[], default), default);

        let slots = vec![slot_at(1, 10, 30), slot_at(2, 8, 15), slot_at(3, 12, 0)];
        assert_eq!(check_in_cutoff(&slots, default), hm(8, 15));
    }

    #[test]
    fn exactly_at_cutoff_is_present() {
        let slots = vec![slot_at(1, 8, 0)];
        assert_eq!(classify(hm(8, 0), &slots, hm(9, 0)), AttendanceStatus::Present);
        assert_eq!(classify(hm(8, 1), &slots, hm(9, 0)), AttendanceStatus::Late);
        assert_eq!(classify(hm(8, 59), &[], hm(9, 0)), AttendanceStatus::Present);
        assert_eq!(classify(hm(9, 1), &[], hm(9, 0)), AttendanceStatus::Late);
    }

    #[tokio::test]
    async fn second_check_in_same_day_is_rejected() {
        let h = harness().await;
        h.clock.set(at(monday(), 7, 50, 0));
        let first = h.engine.check_in(h.teacher.id, &reference()).await.unwrap();
        assert_eq!(first.status, AttendanceStatus::Present);

        h.clock.set(at(monday(), 12, 0, 0));
        let err = h.engine.check_in(h.teacher.id, &reference()).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyMarkedToday { date, .. } if date == monday()));

        let count = attendance_record::Entity::find().count(h.engine.db()).await.unwrap();
        assert_eq!(count, 1);
        let stored = attendance_record::Model::find_for_day(h.engine.db(), h.teacher.id, monday())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.time, hm(7, 50));
    }

    #[tokio::test]
    async fn mismatch_writes_nothing() {
        let h = harness().await;
        let err = h.engine.check_in(h.teacher.id, &stranger()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoFaceMatch { .. }));
        let count = attendance_record::Entity::find().count(h.engine.db()).await.unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn lateness_follows_first_slot_of_the_day() {
        let h = harness().await;
        slot(&h, DayOfWeek::Mon, hm(8, 0), hm(9, 0)).await;
        h.clock.set(at(monday(), 8, 20, 0));
        let record = h.engine.check_in(h.teacher.id, &reference()).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Late);

        // Tuesday has no slots: the default 09:00 cutoff applies.
        let tuesday = monday().succ_opt().unwrap();
        h.clock.set(at(tuesday, 8, 20, 0));
        let record = h.engine.check_in(h.teacher.id, &reference()).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);

        let week = DateRange::new(monday(), monday() + chrono::Duration::days(7));
        let history = h.engine.attendance_history(h.teacher.id, week).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, monday());
    }

    #[tokio::test]
    async fn local_offset_decides_the_date() {
        let mut h = harness().await;
        h.engine = crate::engine::Engine::new(
            util::state::AppState::with_clock(h.engine.db().clone(), std::sync::Arc::new(h.clock.clone())),
            crate::settings::EngineSettings::default().with_offset_minutes(120),
            std::sync::Arc::new(crate::biometric::DistanceMatcher::default()),
        );
        // 23:30 UTC on Sunday is 01:30 Monday local.
        h.clock.set(at(monday().pred_opt().unwrap(), 23, 30, 0));
        let record = h.engine.check_in(h.teacher.id, &reference()).await.unwrap();
        assert_eq!(record.date, monday());
        assert_eq!(record.time, hm(1, 30));
    }
}
