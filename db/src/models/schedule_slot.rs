use chrono::{NaiveTime, Weekday};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A recurring weekly teaching period.
///
/// Slots are not versioned: the current set is assumed to have applied to
/// every past date as well.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "schedule_slots")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub teacher_id: i64,
    pub day: DayOfWeek,
    pub subject: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// School days. Sunday is never scheduled.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "day_of_week")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum DayOfWeek {
    #[sea_orm(string_value = "MON")]
    Mon,
    #[sea_orm(string_value = "TUE")]
    Tue,
    #[sea_orm(string_value = "WED")]
    Wed,
    #[sea_orm(string_value = "THU")]
    Thu,
    #[sea_orm(string_value = "FRI")]
    Fri,
    #[sea_orm(string_value = "SAT")]
    Sat,
}

impl DayOfWeek {
    /// `None` for Sunday.
    pub fn from_weekday(weekday: Weekday) -> Option<Self> {
        match weekday {
            Weekday::Mon => Some(Self::Mon),
            Weekday::Tue => Some(Self::Tue),
            Weekday::Wed => Some(Self::Wed),
            Weekday::Thu => Some(Self::Thu),
            Weekday::Fri => Some(Self::Fri),
            Weekday::Sat => Some(Self::Sat),
            Weekday::Sun => None,
        }
    }

    pub fn weekday(&self) -> Weekday {
        match self {
            Self::Mon => Weekday::Mon,
            Self::Tue => Weekday::Tue,
            Self::Wed => Weekday::Wed,
            Self::Thu => Weekday::Thu,
            Self::Fri => Weekday::Fri,
            Self::Sat => Weekday::Sat,
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
    #[sea_orm(has_many = "super::class_session::Entity")]
    ClassSessions,
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassSessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        teacher_id: i64,
        day: DayOfWeek,
        subject: &str,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            teacher_id: Set(teacher_id),
            day: Set(day),
            subject: Set(subject.to_owned()),
            start_time: Set(start_time),
            end_time: Set(end_time),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// All slots of a teacher, ordered by day then start time.
    pub async fn for_teacher<C>(db: &C, teacher_id: i64) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut slots = Entity::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .order_by_asc(Column::StartTime)
            .order_by_asc(Column::Id)
            .all(db)
            .await?;
        slots.sort_by_key(|s| (s.day.weekday().num_days_from_monday(), s.start_time, s.id));
        Ok(slots)
    }

    pub async fn for_teacher_on<C>(
        db: &C,
        teacher_id: i64,
        day: DayOfWeek,
    ) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .filter(Column::Day.eq(day))
            .order_by_asc(Column::StartTime)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Scheduled length in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// True when `time` lies inside `[start_time, end_time]`; both ends inclusive.
    pub fn covers(&self, time: NaiveTime) -> bool {
        self.start_time <= time && time <= self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(start: (u32, u32), end: (u32, u32)) -> Model {
        Model {
            id: 1,
            teacher_id: 1,
            day: DayOfWeek::Mon,
            subject: "Algebra".into(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    #[test]
    fn covers_is_closed_at_both_ends() {
        let s = slot((9, 0), (10, 0));
        assert!(s.covers(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        assert!(s.covers(NaiveTime::from_hms_opt(10, 0, 0).unwrap()));
        assert!(!s.covers(NaiveTime::from_hms_opt(10, 0, 1).unwrap()));
        assert!(!s.covers(NaiveTime::from_hms_opt(8, 59, 59).unwrap()));
        assert_eq!(s.duration_minutes(), 60);
    }

    #[test]
    fn sunday_has_no_school_day() {
        assert_eq!(DayOfWeek::from_weekday(Weekday::Sun), None);
        assert_eq!(DayOfWeek::from_weekday(Weekday::Sat), Some(DayOfWeek::Sat));
        assert_eq!(DayOfWeek::Wed.to_string(), "WED");
    }
}
