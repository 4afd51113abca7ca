//! Point-in-time reads feeding the metrics engine.

use crate::calendar::DateRange;
use crate::metrics::{self, MetricsInput, MetricsReport, SessionView};
use crate::settings::EngineSettings;
use db::models::{
    attendance_record, class_session::Model as Session, schedule_slot::Model as Slot, teacher,
};
use sea_orm::{ConnectionTrait, DbErr};
use std::collections::HashMap;
use tracing::warn;

/// Everything the metrics of one teacher over one range depend on.
#[derive(Debug, Clone)]
pub struct TeacherSnapshot {
    pub teacher: teacher::Model,
    pub range: DateRange,
    pub slots: Vec<Slot>,
    pub sessions: Vec<SessionView>,
    pub attendance: Vec<attendance_record::Model>,
}

impl TeacherSnapshot {
    pub fn metrics(&self, settings: &EngineSettings) -> MetricsReport {
        metrics::compute(
            &MetricsInput {
                range: self.range,
                slots: &self.slots,
                sessions: &self.sessions,
                attendance: &self.attendance,
            },
            settings,
        )
    }
}

/// Loads one teacher's snapshot on `db`. Pass an open transaction to keep
/// several snapshots mutually consistent.
pub async fn load<C>(db: &C, teacher: teacher::Model, range: DateRange) -> Result<TeacherSnapshot, DbErr>
where
    C: ConnectionTrait,
{
    let slots = Slot::for_teacher(db, teacher.id).await?;
    let sessions = Session::for_teacher_between(db, teacher.id, range.start, range.end).await?;
    let attendance =
        attendance_record::Model::for_teacher_between(db, teacher.id, range.start, range.end).await?;

    let sessions = join_slots(sessions, &slots);
    Ok(TeacherSnapshot {
        teacher,
        range,
        slots,
        sessions,
        attendance,
    })
}

/// Pairs each session with its slot. A reference to a slot that is not among
/// the teacher's slots is treated as an extra class.
pub fn join_slots(sessions: Vec<Session>, slots: &[Slot]) -> Vec<SessionView> {
    let by_id: HashMap<i64, &Slot> = slots.iter().map(|s| (s.id, s)).collect();

    sessions
        .into_iter()
        .map(|session| match session.slot_id {
            None => SessionView::extra(session),
            Some(slot_id) => match by_id.get(&slot_id) {
                Some(slot) => SessionView::scheduled(session, (*slot).clone()),
                None => {
                    warn!(
                        "Session {} references missing slot {}; counting it as an extra class",
                        session.id, slot_id
                    );
                    SessionView::extra(session)
                }
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use db::models::class_session::SessionStatus;
    use db::models::schedule_slot::DayOfWeek;

    #[test]
    fn dangling_slot_reference_becomes_extra_class() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let at = Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap());
        let slot = Slot {
            id: 1,
            teacher_id: 1,
            day: DayOfWeek::Mon,
            subject: "Economics".into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        };
        let session = |id, slot_id| Session {
            id,
            teacher_id: 1,
            slot_id,
            session_date: date,
            started_at: at,
            ended_at: None,
            active_seconds: 0,
            last_tick_at: at,
            status: SessionStatus::Ongoing,
            resumption_count: 0,
        };

        let views = join_slots(
            vec![session(1, Some(1)), session(2, Some(99)), session(3, None)],
            &[slot],
        );
        assert!(views[0].slot.is_some());
        assert!(views[1].slot.is_none());
        assert!(views[2].slot.is_none());
    }
}
