use chrono::{NaiveDate, NaiveTime};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Once-per-day biometric check-in. Immutable once written.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "attendance_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub teacher_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub date: NaiveDate,

    /// School-local time of day of the check-in.
    pub time: NaiveTime,
    pub status: AttendanceStatus,
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "attendance_status")]
#[strum(ascii_case_insensitive)]
pub enum AttendanceStatus {
    #[sea_orm(string_value = "Present")]
    Present,
    #[sea_orm(string_value = "Late")]
    Late,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::teacher::Entity",
        from = "Column::TeacherId",
        to = "super::teacher::Column::Id"
    )]
    Teacher,
}

impl Related<super::teacher::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Teacher.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        teacher_id: i64,
        date: NaiveDate,
        time: NaiveTime,
        status: AttendanceStatus,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            teacher_id: Set(teacher_id),
            date: Set(date),
            time: Set(time),
            status: Set(status),
        }
        .insert(db)
        .await
    }

    pub async fn find_for_day<C>(
        db: &C,
        teacher_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id((teacher_id, date)).one(db).await
    }

    /// Records with `date` in `[from, until)`, oldest first.
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
            .filter(Column::Date.gte(from))
            .filter(Column::Date.lt(until))
            .order_by_asc(Column::Date)
            .all(db)
            .await
    }

    /// Records of many teachers with `date` in `[from, until)`.
    pub async fn for_teachers_between<C>(
        db: &C,
        teacher_ids: &[i64],
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        if teacher_ids.is_empty() {
            return Ok(Vec::new());
        }
        Entity::find()
            .filter(Column::TeacherId.is_in(teacher_ids.iter().cloned()))
            .filter(Column::Date.gte(from))
            .filter(Column::Date.lt(until))
            .order_by_asc(Column::Date)
            .all(db)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{principal, teacher};
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn one_record_per_teacher_per_day() {
        let db = setup_test_db().await;
        let p = principal::Model::create(&db, "head", "Hillside High").await.unwrap();
        let t = teacher::Model::create(&db, p.id, "Amara", teacher::Department::Biology)
            .await
            .unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let at = NaiveTime::from_hms_opt(8, 45, 0).unwrap();

        Model::create(&db, t.id, day, at, AttendanceStatus::Present).await.unwrap();
        let again = Model::create(&db, t.id, day, at, AttendanceStatus::Late).await;
        assert!(again.is_err());

        let stored = Model::find_for_day(&db, t.id, day).await.unwrap().unwrap();
        assert_eq!(stored.status, AttendanceStatus::Present);

        let next = day.succ_opt().unwrap();
        let window = Model::for_teacher_between(&db, t.id, day, next).await.unwrap();
        assert_eq!(window.len(), 1);
        assert!(Model::for_teacher_between(&db, t.id, next, next).await.unwrap().is_empty());
    }
}
