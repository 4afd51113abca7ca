pub mod history;
pub mod school;
pub mod timetable;

use crate::seed::DEMO_PRINCIPAL;
use db::models::{principal, teacher};
use services::{Engine, EngineError, EngineResult};

/// Teachers of the demo school, failing if the school has not been seeded.
pub async fn demo_teachers(engine: &Engine) -> EngineResult<Vec<teacher::Model>> {
    let principal = principal::Model::find_by_username(engine.db(), DEMO_PRINCIPAL)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("Principal {}", DEMO_PRINCIPAL)))?;
    engine.teachers_for(principal.id, None).await
}
