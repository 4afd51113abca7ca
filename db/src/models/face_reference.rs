use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;
use sea_orm::sea_query::OnConflict;

/// Enrolled biometric reference of a teacher, stored as a JSON float array.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "face_references")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub teacher_id: i64,
    pub embedding: String,
    pub captured_at: DateTime<Utc>,
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
    /// Stores `embedding` as the teacher's reference, replacing any previous one.
    pub async fn upsert<C>(
        db: &C,
        teacher_id: i64,
        embedding: &[f32],
        captured_at: DateTime<Utc>,
    ) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        let encoded = serde_json::to_string(embedding)
            .map_err(|e| DbErr::Custom(format!("Failed to encode embedding: {}", e)))?;

        Entity::insert(ActiveModel {
            teacher_id: Set(teacher_id),
            embedding: Set(encoded),
            captured_at: Set(captured_at),
        })
        .on_conflict(
            OnConflict::column(Column::TeacherId)
                .update_columns([Column::Embedding, Column::CapturedAt])
                .to_owned(),
        )
        .exec(db)
        .await?;

        Entity::find_by_id(teacher_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("Face reference for teacher {}", teacher_id)))
    }

    pub async fn find_for_teacher<C>(db: &C, teacher_id: i64) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find_by_id(teacher_id).one(db).await
    }

    /// Decodes the stored float array.
    pub fn vector(&self) -> Result<Vec<f32>, serde_json::Error> {
        serde_json::from_str(&self.embedding)
    }
}
