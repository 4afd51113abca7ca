use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::QueryOrder;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A teacher employed by one principal's school.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "teachers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning principal (organisation).
    pub principal_id: i64,
    pub name: String,
    pub department: Department,
    pub created_at: DateTime<Utc>,
}

/// Teaching department. Stored and rendered by its short code (`"CS"`, `"MATH"`, ...).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "department_type")]
#[strum(ascii_case_insensitive)]
pub enum Department {
    #[sea_orm(string_value = "CS")]
    #[strum(serialize = "CS")]
    #[serde(rename = "CS")]
    ComputerScience,
    #[sea_orm(string_value = "MATH")]
    #[strum(serialize = "MATH")]
    #[serde(rename = "MATH")]
    Mathematics,
    #[sea_orm(string_value = "PHY")]
    #[strum(serialize = "PHY")]
    #[serde(rename = "PHY")]
    Physics,
    #[sea_orm(string_value = "CHEM")]
    #[strum(serialize = "CHEM")]
    #[serde(rename = "CHEM")]
    Chemistry,
    #[sea_orm(string_value = "BIO")]
    #[strum(serialize = "BIO")]
    #[serde(rename = "BIO")]
    Biology,
    #[sea_orm(string_value = "ENG")]
    #[strum(serialize = "ENG")]
    #[serde(rename = "ENG")]
    English,
    #[sea_orm(string_value = "HIST")]
    #[strum(serialize = "HIST")]
    #[serde(rename = "HIST")]
    History,
    #[sea_orm(string_value = "GEO")]
    #[strum(serialize = "GEO")]
    #[serde(rename = "GEO")]
    Geography,
    #[sea_orm(string_value = "ECON")]
    #[strum(serialize = "ECON")]
    #[serde(rename = "ECON")]
    Economics,
    #[sea_orm(string_value = "COMM")]
    #[strum(serialize = "COMM")]
    #[serde(rename = "COMM")]
    Commerce,
    #[sea_orm(string_value = "PE")]
    #[strum(serialize = "PE")]
    #[serde(rename = "PE")]
    PhysicalEducation,
    #[sea_orm(string_value = "ART")]
    #[strum(serialize = "ART")]
    #[serde(rename = "ART")]
    Arts,
    #[sea_orm(string_value = "OTHER")]
    #[strum(serialize = "OTHER")]
    #[serde(rename = "OTHER")]
    Other,
}

impl Default for Department {
    fn default() -> Self {
        Self::Other
    }
}

impl Department {
    /// Human-readable name used in reports and dashboards.
    pub fn display_name(&self) -> &'static str {
        match self {
            Department::ComputerScience => "Computer Science",
            Department::Mathematics => "Mathematics",
            Department::Physics => "Physics",
            Department::Chemistry => "Chemistry",
            Department::Biology => "Biology",
            Department::English => "English",
            Department::History => "History",
            Department::Geography => "Geography",
            Department::Economics => "Economics",
            Department::Commerce => "Commerce",
            Department::PhysicalEducation => "Physical Education",
            Department::Arts => "Arts",
            Department::Other => "Other",
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::principal::Entity",
        from = "Column::PrincipalId",
        to = "super::principal::Column::Id"
    )]
    Principal,
    #[sea_orm(has_many = "super::schedule_slot::Entity")]
    ScheduleSlots,
    #[sea_orm(has_many = "super::class_session::Entity")]
    ClassSessions,
    #[sea_orm(has_many = "super::attendance_record::Entity")]
    AttendanceRecords,
}

impl Related<super::principal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Principal.def()
    }
}

impl Related<super::schedule_slot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduleSlots.def()
    }
}

impl Related<super::class_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClassSessions.def()
    }
}

impl Related<super::attendance_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AttendanceRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn create<C>(
        db: &C,
        principal_id: i64,
        name: &str,
        department: Department,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        ActiveModel {
            principal_id: Set(principal_id),
            name: Set(name.to_owned()),
            department: Set(department),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    /// Teachers of one organisation, optionally narrowed to a department, ordered by name.
    pub async fn find_for_principal<C>(
        db: &C,
        principal_id: i64,
        department: Option<Department>,
    ) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut query = Entity::find().filter(Column::PrincipalId.eq(principal_id));
        if let Some(dept) = department {
            query = query.filter(Column::Department.eq(dept));
        }
        query
            .order_by_asc(Column::Name)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }
}
