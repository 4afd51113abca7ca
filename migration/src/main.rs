use std::{env, fs, path::Path};
use util::{config, paths};

mod runner;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let db_file = paths::database_file();
    let url = format!("sqlite://{}?mode=rwc", db_file.display());
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("clean") => {
            remove_db_file(&db_file);
        }
        Some("fresh") => {
            remove_db_file(&db_file);
            create_db_dir(&db_file);
            runner::run_all_migrations(&url).await;
        }
        Some(other) if other != "up" => {
            eprintln!("Unknown command '{}'. Expected one of: up, fresh, clean", other);
            std::process::exit(2);
        }
        _ => {
            create_db_dir(&db_file);
            runner::run_all_migrations(&url).await;
        }
    }

    println!("{} schema ready at {}", config::project_name(), db_file.display());
}

fn remove_db_file(db_path: &Path) {
    if db_path.exists() {
        fs::remove_file(db_path).expect("Failed to delete DB file");
        println!("Deleted DB: {}", db_path.display());
    } else {
        println!("DB file does not exist: {}", db_path.display());
    }
}

fn create_db_dir(db_path: &Path) {
    paths::ensure_parent_dir(db_path).expect("Failed to create DB directory");
}
