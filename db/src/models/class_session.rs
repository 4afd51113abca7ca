use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{QueryOrder, QuerySelect};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// One concrete occurrence of teaching, tied to a schedule slot or unscheduled.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "class_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub teacher_id: i64,
    /// `None` for an extra (unscheduled) class.
    pub slot_id: Option<i64>,
    /// School-local calendar date of `started_at`; part of the identity key.
    pub session_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Seconds during which the live sample matched the reference.
    pub active_seconds: i64,
    /// Instant up to which elapsed time has already been considered for crediting.
    pub last_tick_at: DateTime<Utc>,
    pub status: SessionStatus,
    /// Number of times the monitoring view was entered.
    pub resumption_count: i32,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "session_status")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SessionStatus {
    #[sea_orm(string_value = "ongoing")]
    Ongoing,
    #[sea_orm(string_value = "completed")]
    Completed,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
    #[sea_orm(
        belongs_to = "super::schedule_slot::Entity",
        from = "Column::SlotId",
        to = "super::schedule_slot::Column::Id"
    )]
    Slot,
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl Related<super::schedule_slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Slot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Inserts a fresh Ongoing session with zero active time and zero resumptions.
    pub async fn open<C>(
        db: &C,
        teacher_id: i64,
        slot_id: Option<i64>,
        session_date: NaiveDate,
        started_at: DateTime<Utc>,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            teacher_id: Set(teacher_id),
            slot_id: Set(slot_id),
            session_date: Set(session_date),
            started_at: Set(started_at),
            ended_at: Set(None),
            active_seconds: Set(0),
            last_tick_at: Set(started_at),
            status: Set(SessionStatus::Ongoing),
            resumption_count: Set(0),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// The session for a scheduled slot on a given local date, if any.
    pub async fn find_for_slot_on<C>(
        db: &C,
        teacher_id: i64,
        slot_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .filter(Column::SlotId.eq(slot_id))
            .filter(Column::SessionDate.eq(date))
            .one(db)
            .await
    }

    /// The teacher's Ongoing session, if any.
    pub async fn find_ongoing<C>(db: &C, teacher_id: i64) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .filter(Column::Status.eq(SessionStatus::Ongoing))
            .order_by_desc(Column::StartedAt)
            .one(db)
            .await
    }

    /// Sessions whose local date falls in `[from, until)`, oldest first.
    pub async fn for_teacher_between<C>(
        db: &C,
        teacher_id: i64,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .filter(Column::SessionDate.gte(from))
            .filter(Column::SessionDate.lt(until))
            .order_by_asc(Column::StartedAt)
            .all(db)
            .await
    }

    /// Most recent sessions first.
    pub async fn recent_for_teacher<C>(
        db: &C,
        teacher_id: i64,
        limit: u64,
    ) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::TeacherId.eq(teacher_id))
            .order_by_desc(Column::StartedAt)
            .limit(limit)
            .all(db)
            .await
    }

    pub fn is_ongoing(&self) -> bool {
        self.status == SessionStatus::Ongoing
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn active_minutes(&self) -> f64 {
        self.active_seconds as f64 / 60.0
    }

    /// Monitoring re-entries beyond the first.
    pub fn interruptions(&self) -> u32 {
        (self.resumption_count - 1).max(0) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{principal, teacher};
    use crate::test_utils::setup_test_db;
    use chrono::TimeZone;

    async fn seed_teacher(db: &DatabaseConnection) -> teacher::Model {
        let p = principal::Model::create(db, "head", "Hillside High").await.unwrap();
        teacher::Model::create(db, p.id, "Amara", teacher::Department::Physics)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn open_starts_ongoing_with_zero_counters() {
        let db = setup_test_db().await;
        let t = seed_teacher(&db).await;
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 2, 0).unwrap();

        let s = Model::open(&db, t.id, None, at.date_naive(), at).await.unwrap();
        assert!(s.is_ongoing());
        assert_eq!(s.active_seconds, 0);
        assert_eq!(s.resumption_count, 0);
        assert_eq!(s.last_tick_at, at);

        let found = Model::find_ongoing(&db, t.id).await.unwrap().unwrap();
        assert_eq!(found.id, s.id);
    }

    #[tokio::test]
    async fn second_ongoing_session_for_a_teacher_is_rejected_by_schema() {
        let db = setup_test_db().await;
        let t = seed_teacher(&db).await;
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();

        Model::open(&db, t.id, None, at.date_naive(), at).await.unwrap();
        let dup = Model::open(&db, t.id, None, at.date_naive(), at).await;
        assert!(dup.is_err());
    }

    #[test]
    fn interruptions_ignore_first_entry() {
        let at = Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut s = Model {
            id: 1,
            teacher_id: 1,
            slot_id: None,
            session_date: at.date_naive(),
            started_at: at,
            ended_at: None,
            active_seconds: 90,
            last_tick_at: at,
            status: SessionStatus::Ongoing,
            resumption_count: 0,
        };
        assert_eq!(s.interruptions(), 0);
        s.resumption_count = 1;
        assert_eq!(s.interruptions(), 0);
        s.resumption_count = 4;
        assert_eq!(s.interruptions(), 3);
        assert_eq!(s.active_minutes(), 1.5);
    }
}
