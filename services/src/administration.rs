//! Administrative operations: organisations, teachers, timetables and
//! biometric enrolment.

use crate::biometric::Embedding;
use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use chrono::NaiveTime;
use db::models::{
    attendance_record, class_session, face_reference, principal,
    schedule_slot::{self, DayOfWeek},
    teacher::{self, Department},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewPrincipal {
    #[validate(length(min = 1, max = 150, message = "Username must be 1-150 characters"))]
    pub username: String,
    #[validate(length(max = 100, message = "School name must be at most 100 characters"))]
    pub school_name: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewTeacher {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    pub department: Department,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSlot {
    pub day: DayOfWeek,
    #[validate(length(min = 1, max = 100, message = "Subject must be 1-100 characters"))]
    pub subject: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Engine {
    pub async fn create_principal(&self, params: NewPrincipal) -> EngineResult<principal::Model> {
        params.validate()?;
        if principal::Model::find_by_username(self.db(), &params.username)
            .await?
            .is_some()
        {
            return Err(EngineError::Validation("Username already exists.".into()));
        }
        let created =
            principal::Model::create(self.db(), &params.username, &params.school_name).await?;
        info!("Registered principal {} ({})", created.id, created.school_name);
        Ok(created)
    }

    pub async fn create_teacher(
        &self,
        principal_id: i64,
        params: NewTeacher,
    ) -> EngineResult<teacher::Model> {
        params.validate()?;
        principal::Entity::find_by_id(principal_id)
            .one(self.db())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Principal {}", principal_id)))?;

        let created = teacher::Model::create(
            self.db(),
            principal_id,
            params.name.trim(),
            params.department,
        )
        .await?;
        info!(
            "Added teacher {} ({}) to principal {}",
            created.id, created.department, principal_id
        );
        Ok(created)
    }

    pub async fn find_teacher(&self, teacher_id: i64) -> EngineResult<teacher::Model> {
        teacher::Entity::find_by_id(teacher_id)
            .one(self.db())
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Teacher {}", teacher_id)))
    }

    pub async fn teachers_for(
        &self,
        principal_id: i64,
        department: Option<Department>,
    ) -> EngineResult<Vec<teacher::Model>> {
        Ok(teacher::Model::find_for_principal(self.db(), principal_id, department).await?)
    }

    /// Removes a teacher together with everything they own.
    pub async fn delete_teacher(&self, teacher_id: i64) -> EngineResult<()> {
        let _guard = self.locks().acquire(teacher_id).await;
        let txn = self.db().begin().await?;

        let removed = teacher::Entity::find_by_id(teacher_id).one(&txn).await?;
        if removed.is_none() {
            return Err(EngineError::NotFound(format!("Teacher {}", teacher_id)));
        }

        attendance_record::Entity::delete_many()
            .filter(attendance_record::Column::TeacherId.eq(teacher_id))
            .exec(&txn)
            .await?;
        class_session::Entity::delete_many()
            .filter(class_session::Column::TeacherId.eq(teacher_id))
            .exec(&txn)
            .await?;
        schedule_slot::Entity::delete_many()
            .filter(schedule_slot::Column::TeacherId.eq(teacher_id))
            .exec(&txn)
            .await?;
        face_reference::Entity::delete_by_id(teacher_id).exec(&txn).await?;
        teacher::Entity::delete_by_id(teacher_id).exec(&txn).await?;

        txn.commit().await?;
        info!("Deleted teacher {} and their records", teacher_id);
        Ok(())
    }

    pub async fn add_slot(
        &self,
        teacher_id: i64,
        params: NewSlot,
    ) -> EngineResult<schedule_slot::Model> {
        params.validate()?;
        if params.start >= params.end {
            return Err(EngineError::InvalidSlot(format!(
                "start {} must be before end {}",
                params.start.format("%H:%M"),
                params.end.format("%H:%M")
            )));
        }
        self.find_teacher(teacher_id).await?;

        let slot = schedule_slot::Model::create(
            self.db(),
            teacher_id,
            params.day,
            params.subject.trim(),
            params.start,
            params.end,
        )
        .await?;
        info!(
            "Scheduled {} for teacher {} on {} {}-{}",
            slot.subject,
            teacher_id,
            slot.day,
            slot.start_time.format("%H:%M"),
            slot.end_time.format("%H:%M")
        );
        Ok(slot)
    }

    /// Deletes one slot. Its past sessions stay, as extra classes.
    pub async fn delete_slot(&self, slot_id: i64) -> EngineResult<()> {
        let txn = self.db().begin().await?;
        let slot = schedule_slot::Entity::find_by_id(slot_id)
            .one(&txn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Slot {}", slot_id)))?;

        detach_sessions(&txn, &[slot.id]).await?;
        schedule_slot::Entity::delete_by_id(slot.id).exec(&txn).await?;
        txn.commit().await?;

        info!("Deleted slot {} of teacher {}", slot.id, slot.teacher_id);
        Ok(())
    }

    /// Deletes every slot of a teacher. Returns how many were removed.
    pub async fn clear_schedule(&self, teacher_id: i64) -> EngineResult<u64> {
        let txn = self.db().begin().await?;
        let slot_ids: Vec<i64> = schedule_slot::Entity::find()
            .filter(schedule_slot::Column::TeacherId.eq(teacher_id))
            .all(&txn)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        detach_sessions(&txn, &slot_ids).await?;
        let removed = schedule_slot::Entity::delete_many()
            .filter(schedule_slot::Column::TeacherId.eq(teacher_id))
            .exec(&txn)
            .await?
            .rows_affected;
        txn.commit().await?;

        info!("Cleared {} slots of teacher {}", removed, teacher_id);
        Ok(removed)
    }

    pub async fn slots_for(&self, teacher_id: i64) -> EngineResult<Vec<schedule_slot::Model>> {
        Ok(schedule_slot::Model::for_teacher(self.db(), teacher_id).await?)
    }

    /// Enrols (or replaces) the teacher's reference embedding.
    pub async fn capture_reference(
        &self,
        teacher_id: i64,
        embedding: &Embedding,
    ) -> EngineResult<face_reference::Model> {
        if embedding.as_slice().is_empty() {
            return Err(EngineError::Validation("Embedding is empty".into()));
        }
        self.find_teacher(teacher_id).await?;
        let stored =
            face_reference::Model::upsert(self.db(), teacher_id, embedding.as_slice(), self.now())
                .await?;
        info!("Captured face reference for teacher {}", teacher_id);
        Ok(stored)
    }

    pub async fn reference_for(&self, teacher_id: i64) -> EngineResult<Embedding> {
        load_reference(self.db(), teacher_id).await
    }
}

/// The teacher's enrolled embedding, read on `db` (which may be an open transaction).
pub(crate) async fn load_reference<C>(db: &C, teacher_id: i64) -> EngineResult<Embedding>
where
    C: sea_orm::ConnectionTrait,
{
    let stored = face_reference::Model::find_for_teacher(db, teacher_id)
        .await?
        .ok_or(EngineError::NoReferenceEnrolled { teacher_id })?;
    Ok(Embedding::new(stored.vector()?))
}

/// Turns the sessions of deleted slots into extra classes.
async fn detach_sessions<C>(db: &C, slot_ids: &[i64]) -> EngineResult<()>
where
    C: sea_orm::ConnectionTrait,
{
    if slot_ids.is_empty() {
        return Ok(());
    }
    class_session::Entity::update_many()
        .col_expr(
            class_session::Column::SlotId,
            sea_orm::sea_query::Expr::value(Option::<i64>::None),
        )
        .filter(class_session::Column::SlotId.is_in(slot_ids.iter().cloned()))
        .exec(db)
        .await?;
    Ok(())
}
