use crate::seed::Seeder;
use crate::seeds::demo_teachers;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use db::models::attendance_record;
use db::models::class_session::{self, SessionStatus};
use db::models::schedule_slot::{DayOfWeek, Model as Slot};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set, TransactionTrait};
use services::attendance_ledger::{check_in_cutoff, classify};
use services::{DateRange, Engine, EngineError, EngineResult, EngineSettings};
use std::pin::Pin;

/// Days of back-filled history, ending yesterday.
const HISTORY_DAYS: u32 = 28;

pub struct HistorySeeder;

impl Seeder for HistorySeeder {
    fn seed<'a>(
        &'a self,
        engine: &'a Engine,
    ) -> Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if class_session::Entity::find().count(engine.db()).await? > 0 {
                return Ok(());
            }

            let settings = engine.settings();
            let today = settings.local_date(engine.now());
            let range = DateRange::trailing(today, HISTORY_DAYS);

            for teacher in demo_teachers(engine).await? {
                // Share of duties this teacher actually performs.
                let reliability = 0.55 + fastrand::f64() * 0.45;
                let slots = engine.slots_for(teacher.id).await?;

                let txn = engine.db().begin().await?;
                for date in range.days() {
                    let Some(day) = DayOfWeek::from_weekday(date.weekday()) else {
                        continue;
                    };
                    let todays: Vec<Slot> = slots.iter().filter(|s| s.day == day).cloned().collect();

                    if fastrand::f64() < reliability + 0.05 {
                        let cutoff = check_in_cutoff(&todays, settings.default_check_in_cutoff);
                        let slack = ((1.0 - reliability) * 40.0) as i64;
                        let time = cutoff + Duration::minutes(fastrand::i64(-40..=5 + slack));
                        let status = classify(time, &todays, settings.default_check_in_cutoff);
                        attendance_record::Model::create(&txn, teacher.id, date, time, status).await?;
                    }

                    for slot in &todays {
                        if fastrand::f64() >= reliability {
                            continue;
                        }
                        let late = fastrand::i64(0..=3 + ((1.0 - reliability) * 20.0) as i64);
                        let early = fastrand::i64(0..=((1.0 - reliability) * 25.0) as i64);
                        let start = slot.start_time + Duration::minutes(late);
                        let end = slot.end_time - Duration::minutes(early);
                        let interruptions = if fastrand::f64() < 1.0 - reliability {
                            fastrand::i32(1..3)
                        } else {
                            0
                        };
                        completed_session(
                            &txn,
                            settings,
                            teacher.id,
                            Some(slot.id),
                            date,
                            (start, end),
                            reliability,
                            interruptions,
                        )
                        .await?;
                    }

                    if fastrand::f64() < 0.05 {
                        let Some(start) = NaiveTime::from_hms_opt(15, 30, 0) else {
                            continue;
                        };
                        let end = start + Duration::minutes(45);
                        completed_session(&txn, settings, teacher.id, None, date, (start, end), reliability, 0)
                            .await?;
                    }
                }
                txn.commit().await?;
            }

            Ok(())
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn completed_session<C>(
    db: &C,
    settings: &EngineSettings,
    teacher_id: i64,
    slot_id: Option<i64>,
    date: NaiveDate,
    (start, end): (NaiveTime, NaiveTime),
    reliability: f64,
    interruptions: i32,
) -> EngineResult<()>
where
    C: sea_orm::ConnectionTrait,
{
    let started_at = to_utc(settings, date, start)?;
    let ended_at = to_utc(settings, date, end)?;
    let taught = (ended_at - started_at).num_seconds().max(0);
    let presence = (reliability - 0.1 + fastrand::f64() * 0.15).clamp(0.0, 1.0);

    let opened = class_session::Model::open(db, teacher_id, slot_id, date, started_at).await?;
    let mut active: class_session::ActiveModel = opened.into();
    active.status = Set(SessionStatus::Completed);
    active.ended_at = Set(Some(ended_at));
    active.last_tick_at = Set(ended_at);
    active.active_seconds = Set((taught as f64 * presence) as i64);
    active.resumption_count = Set(1 + interruptions);
    active.update(db).await?;
    Ok(())
}

fn to_utc(settings: &EngineSettings, date: NaiveDate, time: NaiveTime) -> EngineResult<DateTime<Utc>> {
    settings
        .offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| EngineError::Validation(format!("Ambiguous local time {} {}", date, time)))
}
