use crate::seed::{DEMO_PRINCIPAL, Seeder};
use db::models::principal;
use db::models::teacher::Department;
use fake::Fake;
use fake::faker::name::en::Name;
use sea_orm::Iterable;
use services::administration::{NewPrincipal, NewTeacher};
use services::{Embedding, Engine, EngineResult};
use std::pin::Pin;

const TEACHERS: usize = 12;
const EMBEDDING_DIM: usize = 128;

pub struct SchoolSeeder;

impl Seeder for SchoolSeeder {
    fn seed<'a>(
        &'a self,
        engine: &'a Engine,
    ) -> Pin<Box<dyn Future<Output = EngineResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if principal::Model::find_by_username(engine.db(), DEMO_PRINCIPAL)
                .await?
                .is_some()
            {
                return Ok(());
            }

            let principal = engine
                .create_principal(NewPrincipal {
                    username: DEMO_PRINCIPAL.into(),
                    school_name: "Hillside High".into(),
                })
                .await?;

            let departments: Vec<Department> = Department::iter().collect();
            for _ in 0..TEACHERS {
                let name: String = Name().fake();
                let department = departments[fastrand::usize(..departments.len())];
                let teacher = engine
                    .create_teacher(principal.id, NewTeacher { name, department })
                    .await?;

                let embedding: Vec<f32> = (0..EMBEDDING_DIM).map(|_| fastrand::f32()).collect();
                engine
                    .capture_reference(teacher.id, &Embedding::new(embedding))
                    .await?;
            }

            Ok(())
        })
    }
}
