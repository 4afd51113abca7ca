use crate::seed::{Seeder, run_seeder};
use crate::seeds::{history::HistorySeeder, school::SchoolSeeder, timetable::TimetableSeeder};
use common::logger::init_logging;
use migration::Migrator;
use sea_orm_migration::MigratorTrait;
use services::Engine;
use util::{config, state::AppState};

mod seed;
mod seeds;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging(
        &config::log_file(),
        &config::log_level(),
        config::log_to_stdout(),
    );

    let db = match db::connect().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("Failed to connect to {}: {}", config::database_path(), err);
            std::process::exit(1);
        }
    };
    if let Err(err) = Migrator::up(&db, None).await {
        eprintln!("Failed to apply migrations: {}", err);
        std::process::exit(1);
    }

    let engine = Engine::from_config(AppState::new(db));

    for (seeder, name) in [
        (Box::new(SchoolSeeder) as Box<dyn Seeder + Send + Sync>, "School"),
        (Box::new(TimetableSeeder), "Timetable"),
        (Box::new(HistorySeeder), "History"),
    ] {
        run_seeder(&*seeder, name, &engine).await;
    }
}
