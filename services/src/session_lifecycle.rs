//! Class session state machine.
//!
//! A (teacher, slot, local date) key is in one of three states: no row yet
//! (`NotStarted`), `Ongoing`, or `Completed`. Every mutation runs under the
//! teacher's lock and inside a transaction, so the "at most one Ongoing
//! session per teacher" check and the write that follows are one step.

use crate::administration::load_reference;
use crate::biometric::Embedding;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult, WindowMiss};
use chrono::{DateTime, Duration, NaiveDate};
use db::models::class_session::{self, Model as Session, SessionStatus};
use db::models::schedule_slot::{self, DayOfWeek, Model as Slot};
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, Set, SqlErr, TransactionTrait};
use serde::Serialize;
use tracing::{debug, info};

/// Explicit state of one scheduled slot on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "session", rename_all = "snake_case")]
pub enum SlotState {
    NotStarted,
    Ongoing(Session),
    Completed(Session),
}

impl SlotState {
    pub fn from_session(session: Option<Session>) -> Self {
        match session {
            None => SlotState::NotStarted,
            Some(s) if s.status == SessionStatus::Ongoing => SlotState::Ongoing(s),
            Some(s) => SlotState::Completed(s),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SlotState::NotStarted => None,
            SlotState::Ongoing(s) | SlotState::Completed(s) => Some(s),
        }
    }
}

/// Result of one liveness tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutcome {
    pub session_id: i64,
    pub matched: bool,
    /// Seconds added by this tick.
    pub credited_seconds: i64,
    pub active_seconds: i64,
    pub active_minutes: f64,
}

/// Checks that `now` falls on the slot's weekday and inside its closed window.
pub fn check_window(slot: &Slot, local_now: DateTime<chrono::FixedOffset>) -> Result<(), WindowMiss> {
    use chrono::Datelike;

    let today = DayOfWeek::from_weekday(local_now.weekday());
    if today != Some(slot.day) {
        return Err(WindowMiss::WrongDay {
            expected: slot.day,
            actual: today,
        });
    }

    let time = local_now.time();
    if slot.covers(time) {
        return Ok(());
    }
    if time < slot.start_time {
        Err(WindowMiss::BeforeStart {
            starts_at: slot.start_time,
            now: time,
        })
    } else {
        Err(WindowMiss::AfterEnd {
            ends_at: slot.end_time,
            now: time,
        })
    }
}

impl Engine {
    /// Starts (or resumes) the teacher's session for a scheduled slot today.
    ///
    /// Idempotent while the session is Ongoing; a Completed session for the
    /// same key is reopened rather than duplicated. Starting while a
    /// different session is Ongoing is rejected with `SessionInProgress`.
    pub async fn start_session(&self, teacher_id: i64, slot_id: i64) -> EngineResult<Session> {
        let _guard = self.locks().acquire(teacher_id).await;
        let now = self.now();
        let local_now = self.settings().local(now);

        let txn = self.db().begin().await?;
        let slot = schedule_slot::Entity::find_by_id(slot_id)
            .one(&txn)
            .await?
            .filter(|s| s.teacher_id == teacher_id)
            .ok_or_else(|| {
                EngineError::NotFound(format!("Slot {} of teacher {}", slot_id, teacher_id))
            })?;

        check_window(&slot, local_now)
            .map_err(|reason| EngineError::ScheduleViolation { slot_id, reason })?;

        let today = local_now.date_naive();
        let existing = Session::find_for_slot_on(&txn, teacher_id, slot_id, today).await?;

        if let Some(session) = existing.as_ref().filter(|s| s.is_ongoing()) {
            debug!("Session {} already ongoing for slot {}", session.id, slot_id);
            txn.commit().await?;
            return Ok(session.clone());
        }

        if let Some(ongoing) = Session::find_ongoing(&txn, teacher_id).await? {
            return Err(EngineError::SessionInProgress {
                teacher_id,
                session_id: ongoing.id,
            });
        }

        let session = match existing {
            Some(completed) => {
                let mut active: class_session::ActiveModel = completed.into();
                active.status = Set(SessionStatus::Ongoing);
                active.ended_at = Set(None);
                active.last_tick_at = Set(now);
                let reopened = active.update(&txn).await?;
                info!("Reopened session {} for slot {}", reopened.id, slot_id);
                reopened
            }
            None => {
                let opened = Session::open(&txn, teacher_id, Some(slot_id), today, now)
                    .await
                    .map_err(|e| in_progress_on_conflict(e, teacher_id))?;
                info!(
                    "Teacher {} started session {} for slot {} ({})",
                    teacher_id, opened.id, slot_id, slot.subject
                );
                opened
            }
        };

        txn.commit().await?;
        Ok(session)
    }

    /// Starts an unscheduled ("extra") class. No window applies.
    pub async fn start_extra_session(&self, teacher_id: i64) -> EngineResult<Session> {
        let _guard = self.locks().acquire(teacher_id).await;
        let now = self.now();
        let txn = self.db().begin().await?;

        if let Some(ongoing) = Session::find_ongoing(&txn, teacher_id).await? {
            if ongoing.slot_id.is_none() {
                txn.commit().await?;
                return Ok(ongoing);
            }
            return Err(EngineError::SessionInProgress {
                teacher_id,
                session_id: ongoing.id,
            });
        }

        let today = self.settings().local_date(now);
        let session = Session::open(&txn, teacher_id, None, today, now)
            .await
            .map_err(|e| in_progress_on_conflict(e, teacher_id))?;
        txn.commit().await?;

        info!("Teacher {} started extra session {}", teacher_id, session.id);
        Ok(session)
    }

    /// Records an entry into the monitoring view of the Ongoing session.
    pub async fn enter_monitoring(&self, teacher_id: i64) -> EngineResult<Session> {
        let _guard = self.locks().acquire(teacher_id).await;
        let txn = self.db().begin().await?;

        let session = Session::find_ongoing(&txn, teacher_id)
            .await?
            .ok_or(EngineError::NoActiveSession { teacher_id })?;

        let count = session.resumption_count + 1;
        let mut active: class_session::ActiveModel = session.into();
        active.resumption_count = Set(count);
        let updated = active.update(&txn).await?;
        txn.commit().await?;

        if count > 1 {
            info!(
                "Teacher {} re-entered monitoring of session {} ({} entries)",
                teacher_id, updated.id, count
            );
        }
        Ok(updated)
    }

    /// Applies one liveness sample to the Ongoing session.
    ///
    /// A match credits `min(tick interval, time since the previous tick)` in
    /// whole seconds, so calls faster than the nominal cadence cannot
    /// out-count the wall clock. The sub-second remainder carries over to the
    /// next tick; longer gaps are dropped. A mismatch credits nothing and
    /// leaves the session open.
    pub async fn tick_session(
        &self,
        teacher_id: i64,
        sample: &Embedding,
    ) -> EngineResult<TickOutcome> {
        let _guard = self.locks().acquire(teacher_id).await;
        let now = self.now();
        let txn = self.db().begin().await?;

        let session = Session::find_ongoing(&txn, teacher_id)
            .await?
            .ok_or(EngineError::NoActiveSession { teacher_id })?;
        let reference = load_reference(&txn, teacher_id).await?;

        let matched = self.matcher().is_same_person(&reference, sample);
        let elapsed = (now - session.last_tick_at).max(Duration::zero());
        let credited = if matched {
            elapsed.min(self.settings().tick_interval).num_seconds()
        } else {
            0
        };

        let carried = elapsed - Duration::seconds(credited);
        let last_tick_at = if matched && carried < Duration::seconds(1) {
            session.last_tick_at + Duration::seconds(credited)
        } else {
            session.last_tick_at.max(now)
        };

        let session_id = session.id;
        let active_seconds = session.active_seconds + credited;

        let mut active: class_session::ActiveModel = session.into();
        active.active_seconds = Set(active_seconds);
        active.last_tick_at = Set(last_tick_at);
        active.update(&txn).await?;
        txn.commit().await?;

        debug!(
            "Tick for session {}: matched={} credited={}s total={}s",
            session_id, matched, credited, active_seconds
        );

        Ok(TickOutcome {
            session_id,
            matched,
            credited_seconds: credited,
            active_seconds,
            active_minutes: active_seconds as f64 / 60.0,
        })
    }

    /// Completes the Ongoing session. `Ok(None)` when there is nothing to end.
    pub async fn end_session(&self, teacher_id: i64) -> EngineResult<Option<Session>> {
        let _guard = self.locks().acquire(teacher_id).await;
        let now = self.now();
        let txn = self.db().begin().await?;

        let Some(session) = Session::find_ongoing(&txn, teacher_id).await? else {
            debug!("End requested for teacher {} with no ongoing session", teacher_id);
            return Ok(None);
        };

        let mut active: class_session::ActiveModel = session.into();
        active.status = Set(SessionStatus::Completed);
        active.ended_at = Set(Some(now));
        let ended = active.update(&txn).await?;
        txn.commit().await?;

        info!(
            "Teacher {} ended session {} with {}s active",
            teacher_id, ended.id, ended.active_seconds
        );
        Ok(Some(ended))
    }

    pub async fn active_session(&self, teacher_id: i64) -> EngineResult<Option<Session>> {
        Ok(Session::find_ongoing(self.db(), teacher_id).await?)
    }

    /// Today's slots (school-local weekday) with their explicit state.
    pub async fn slot_states_today(&self, teacher_id: i64) -> EngineResult<Vec<(Slot, SlotState)>> {
        let today = self.settings().local_date(self.now());
        self.slot_states_on(teacher_id, today).await
    }

    pub async fn slot_states_on(
        &self,
        teacher_id: i64,
        date: NaiveDate,
    ) -> EngineResult<Vec<(Slot, SlotState)>> {
        use chrono::Datelike;

        let Some(day) = DayOfWeek::from_weekday(date.weekday()) else {
            return Ok(Vec::new());
        };
        let slots = Slot::for_teacher_on(self.db(), teacher_id, day).await?;
        let next = date.succ_opt().unwrap_or(date);
        let sessions = Session::for_teacher_between(self.db(), teacher_id, date, next).await?;

        Ok(slots
            .into_iter()
            .map(|slot| {
                let session = sessions
                    .iter()
                    .find(|s| s.slot_id == Some(slot.id))
                    .cloned();
                (slot, SlotState::from_session(session))
            })
            .collect())
    }

    /// Most recent sessions first.
    pub async fn session_history(&self, teacher_id: i64, limit: u64) -> EngineResult<Vec<Session>> {
        Ok(Session::recent_for_teacher(self.db(), teacher_id, limit).await?)
    }
}

/// Maps a unique-index hit on insert (a concurrent start won the race) to
/// `SessionInProgress`. The winner's id is not known here and is reported as 0.
fn in_progress_on_conflict(err: DbErr, teacher_id: i64) -> EngineError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => EngineError::SessionInProgress {
            teacher_id,
            session_id: 0,
        },
        _ => EngineError::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use sea_orm::{ColumnTrait, PaginatorTrait, QueryFilter};

    async fn ongoing_count(h: &Harness) -> u64 {
        class_session::Entity::find()
            .filter(class_session::Column::TeacherId.eq(h.teacher.id))
            .filter(class_session::Column::Status.eq(SessionStatus::Ongoing))
            .count(h.engine.db())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_outside_window_is_a_schedule_violation() {
        let h = harness().await;
        let s = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;

        h.clock.set(at(monday(), 8, 59, 0));
        let err = h.engine.start_session(h.teacher.id, s.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::ScheduleViolation { reason: WindowMiss::BeforeStart { .. }, .. }
        ));

        h.clock.set(at(monday(), 10, 0, 1));
        let err = h.engine.start_session(h.teacher.id, s.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::ScheduleViolation { reason: WindowMiss::AfterEnd { .. }, .. }
        ));

        let tuesday = monday().succ_opt().unwrap();
        h.clock.set(at(tuesday, 9, 30, 0));
        let err = h.engine.start_session(h.teacher.id, s.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::ScheduleViolation { reason: WindowMiss::WrongDay { .. }, .. }
        ));
        assert_eq!(ongoing_count(&h).await, 0);
    }

    #[test]
    fn window_is_closed_at_both_ends() {
        let s = Slot {
            id: 1,
            teacher_id: 1,
            day: DayOfWeek::Mon,
            subject: "Biology".into(),
            start_time: hm(9, 0),
            end_time: hm(10, 0),
        };
        let local = |h, m, sec| crate::EngineSettings::default().local(at(monday(), h, m, sec));

        assert!(check_window(&s, local(9, 0, 0)).is_ok());
        assert!(check_window(&s, local(10, 0, 0)).is_ok());
        assert!(matches!(check_window(&s, local(8, 59, 59)), Err(WindowMiss::BeforeStart { .. })));
        assert!(matches!(check_window(&s, local(10, 0, 1)), Err(WindowMiss::AfterEnd { .. })));
    }

    #[tokio::test]
    async fn start_exactly_at_end_time_is_allowed() {
        let h = harness().await;
        let s = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        h.clock.set(at(monday(), 10, 0, 0));

        let session = h.engine.start_session(h.teacher.id, s.id).await.unwrap();
        assert!(session.is_ongoing());
        assert_eq!(session.active_seconds, 0);
        assert_eq!(session.resumption_count, 0);
    }

    #[tokio::test]
    async fn start_is_idempotent_and_reopens_completed() {
        let h = harness().await;
        let s = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        h.clock.set(at(monday(), 9, 0, 0));

        let first = h.engine.start_session(h.teacher.id, s.id).await.unwrap();
        let again = h.engine.start_session(h.teacher.id, s.id).await.unwrap();
        assert_eq!(first.id, again.id);

        h.clock.set(at(monday(), 9, 20, 0));
        let ended = h.engine.end_session(h.teacher.id).await.unwrap().unwrap();
        assert!(ended.is_completed());

        h.clock.set(at(monday(), 9, 25, 0));
        let reopened = h.engine.start_session(h.teacher.id, s.id).await.unwrap();
        assert_eq!(reopened.id, first.id);
        assert!(reopened.is_ongoing());
        assert_eq!(reopened.ended_at, None);
        assert_eq!(class_session::Entity::find().count(h.engine.db()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn second_slot_while_ongoing_is_rejected() {
        let h = harness().await;
        let a = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        let b = slot(&h, DayOfWeek::Mon, hm(9, 30), hm(11, 0)).await;
        h.clock.set(at(monday(), 9, 35, 0));

        let first = h.engine.start_session(h.teacher.id, a.id).await.unwrap();
        let err = h.engine.start_session(h.teacher.id, b.id).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::SessionInProgress { session_id, .. } if session_id == first.id
        ));

        let err = h.engine.start_extra_session(h.teacher.id).await.unwrap_err();
        assert!(matches!(err, EngineError::SessionInProgress { .. }));
        assert_eq!(ongoing_count(&h).await, 1);
    }

    #[tokio::test]
    async fn concurrent_starts_leave_one_ongoing_session() {
        let h = harness().await;
        let a = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        let b = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        h.clock.set(at(monday(), 9, 10, 0));

        let (ra, rb) = tokio::join!(
            h.engine.start_session(h.teacher.id, a.id),
            h.engine.start_session(h.teacher.id, b.id)
        );
        assert!(ra.is_ok() ^ rb.is_ok());
        assert_eq!(ongoing_count(&h).await, 1);
    }

    #[tokio::test]
    async fn enter_monitoring_counts_resumptions() {
        let h = harness().await;
        let err = h.engine.enter_monitoring(h.teacher.id).await.unwrap_err();
        assert!(err.is_benign());

        let s = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        h.clock.set(at(monday(), 9, 0, 0));
        h.engine.start_session(h.teacher.id, s.id).await.unwrap();

        for _ in 0..3 {
            h.engine.enter_monitoring(h.teacher.id).await.unwrap();
        }
        let session = h.engine.active_session(h.teacher.id).await.unwrap().unwrap();
        assert_eq!(session.resumption_count, 3);
        assert_eq!(session.interruptions(), 2);
    }

    #[tokio::test]
    async fn ticks_credit_matches_only_and_never_decrease() {
        let h = harness().await;
        let s = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        h.clock.set(at(monday(), 9, 0, 0));
        h.engine.start_session(h.teacher.id, s.id).await.unwrap();

        let mut last = 0;
        let samples = [reference(), stranger(), reference(), stranger(), reference()];
        for sample in samples.iter() {
            h.clock.advance(Duration::seconds(5));
            let out = h.engine.tick_session(h.teacher.id, sample).await.unwrap();
            assert!(out.active_seconds >= last);
            if !out.matched {
                assert_eq!(out.active_seconds, last);
                assert_eq!(out.credited_seconds, 0);
            }
            last = out.active_seconds;
        }
        assert_eq!(last, 15);
    }

    #[tokio::test]
    async fn ticks_are_clamped_to_elapsed_time() {
        let h = harness().await;
        h.clock.set(at(monday(), 11, 0, 0));
        h.engine.start_extra_session(h.teacher.id).await.unwrap();

        // Burst of calls without the clock moving: nothing to credit.
        for _ in 0..10 {
            h.engine.tick_session(h.teacher.id, &reference()).await.unwrap();
        }
        let session = h.engine.active_session(h.teacher.id).await.unwrap().unwrap();
        assert_eq!(session.active_seconds, 0);

        // A long gap credits at most one tick interval.
        h.clock.advance(Duration::seconds(2));
        let out = h.engine.tick_session(h.teacher.id, &reference()).await.unwrap();
        assert_eq!(out.credited_seconds, 2);
        h.clock.advance(Duration::minutes(3));
        let out = h.engine.tick_session(h.teacher.id, &reference()).await.unwrap();
        assert_eq!(out.credited_seconds, 5);
        assert_eq!(out.active_seconds, 7);
    }

    #[tokio::test]
    async fn jittered_ticks_keep_the_sub_second_remainder() {
        let h = harness().await;
        h.clock.set(at(monday(), 11, 0, 0));
        let started = h.engine.start_extra_session(h.teacher.id).await.unwrap();

        for _ in 0..12 {
            h.clock.advance(Duration::milliseconds(4990));
            h.engine.tick_session(h.teacher.id, &reference()).await.unwrap();
        }

        let session = h.engine.active_session(h.teacher.id).await.unwrap().unwrap();
        let wall = h.engine.now() - started.started_at;
        assert_eq!(wall, Duration::milliseconds(59_880));
        assert_eq!(session.active_seconds, 59);
        assert!(Duration::seconds(session.active_seconds) <= wall);
        assert!(session.last_tick_at <= h.engine.now());
    }

    #[tokio::test]
    async fn sub_second_bursts_accumulate_without_exceeding_wall_clock() {
        let h = harness().await;
        h.clock.set(at(monday(), 11, 0, 0));
        h.engine.start_extra_session(h.teacher.id).await.unwrap();

        for _ in 0..20 {
            h.clock.advance(Duration::milliseconds(250));
            h.engine.tick_session(h.teacher.id, &reference()).await.unwrap();
        }

        let session = h.engine.active_session(h.teacher.id).await.unwrap().unwrap();
        assert_eq!(session.active_seconds, 5);
    }

    #[tokio::test]
    async fn tick_without_session_or_reference() {
        let h = harness().await;
        let err = h.engine.tick_session(h.teacher.id, &reference()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoActiveSession { .. }));

        let other = db::models::teacher::Model::create(
            h.engine.db(),
            h.principal.id,
            "Bongani",
            db::models::teacher::Department::English,
        )
        .await
        .unwrap();
        h.engine.start_extra_session(other.id).await.unwrap();
        let err = h.engine.tick_session(other.id, &reference()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoReferenceEnrolled { .. }));
    }

    #[tokio::test]
    async fn end_without_session_is_a_no_op() {
        let h = harness().await;
        assert!(h.engine.end_session(h.teacher.id).await.unwrap().is_none());

        h.clock.set(at(monday(), 13, 0, 0));
        h.engine.start_extra_session(h.teacher.id).await.unwrap();
        h.clock.advance(Duration::minutes(40));
        let ended = h.engine.end_session(h.teacher.id).await.unwrap().unwrap();
        assert_eq!(ended.active_seconds, 0);
        assert_eq!(ended.ended_at, Some(at(monday(), 13, 40, 0)));
        assert!(h.engine.active_session(h.teacher.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn slot_states_reflect_sessions() {
        let h = harness().await;
        let a = slot(&h, DayOfWeek::Mon, hm(9, 0), hm(10, 0)).await;
        let b = slot(&h, DayOfWeek::Mon, hm(11, 0), hm(12, 0)).await;
        slot(&h, DayOfWeek::Tue, hm(9, 0), hm(10, 0)).await;

        h.clock.set(at(monday(), 9, 5, 0));
        h.engine.start_session(h.teacher.id, a.id).await.unwrap();
        h.clock.set(at(monday(), 9, 55, 0));
        h.engine.end_session(h.teacher.id).await.unwrap();
        h.clock.set(at(monday(), 11, 1, 0));
        h.engine.start_session(h.teacher.id, b.id).await.unwrap();

        let states = h.engine.slot_states_today(h.teacher.id).await.unwrap();
        assert_eq!(states.len(), 2);
        assert!(matches!(states[0].1, SlotState::Completed(_)));
        assert!(matches!(states[1].1, SlotState::Ongoing(_)));

        let tuesday = monday().succ_opt().unwrap();
        let states = h.engine.slot_states_on(h.teacher.id, tuesday).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].1, SlotState::NotStarted);

        let history = h.engine.session_history(h.teacher.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].slot_id, Some(b.id));
    }
}
