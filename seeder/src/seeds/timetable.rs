use crate::seed::Seeder;
use crate::seeds::demo_teachers;
use chrono::{Duration, NaiveTime};
use db::models::schedule_slot::DayOfWeek;
use sea_orm::Iterable;
use services::administration::NewSlot;
use services::{Engine, EngineResult};
use std::pin::Pin;

/// Period start times of the school day.
const PERIODS: [(u32, u32); 6] = [(8, 0), (9, 0), (10, 30), (11, 30), (13, 30), (14, 30)];
const PERIOD_MINUTES: i64 = 50;
const SLOTS_PER_TEACHER: usize = 6;

pub struct TimetableSeeder;

impl Seeder for TimetableSeeder {
    fn seed<'a>(
        &'a self,
        engine: &'a Engine,
    ) -> Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let days: Vec<DayOfWeek> = DayOfWeek::iter().collect();

            for teacher in demo_teachers(engine).await? {
                if !engine.slots_for(teacher.id).await?.is_empty() {
                    continue;
                }

                let mut cells: Vec<(DayOfWeek, (u32, u32))> = days
                    .iter()
                    .flat_map(|day| PERIODS.iter().map(move |p| (*day, *p)))
                    .collect();
                fastrand::shuffle(&mut cells);

                for (day, (h, m)) in cells.into_iter().take(SLOTS_PER_TEACHER) {
                    let Some(start) = NaiveTime::from_hms_opt(h, m, 0) else {
                        continue;
                    };
                    let grade = fastrand::u8(8..=12);
                    engine
                        .add_slot(
                            teacher.id,
                            NewSlot {
                                day,
                                subject: format!(
                                    "{} Grade {}",
                                    teacher.department.display_name(),
                                    grade
                                ),
                                start,
                                end: start + Duration::minutes(PERIOD_MINUTES),
                            },
                        )
                        .await?;
                }
            }

            Ok(())
        })
    }
}
