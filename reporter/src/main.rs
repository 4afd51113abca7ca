use chrono::Datelike;
use colored::*;
use common::logger::init_logging;
use db::models::{principal, teacher::Department};
use services::Engine;
use std::path::PathBuf;
use std::str::FromStr;
use std::{env, process};
use util::{config, state::AppState};

const USAGE: &str = "Usage: reporter <principal-username> [--month M] [--year YYYY] \
                     [--department CODE] [--output PATH]";

#[derive(Debug, PartialEq)]
struct Args {
    principal: String,
    month: Option<u32>,
    year: Option<i32>,
    department: Option<Department>,
    output: PathBuf,
}

fn parse_args(raw: &[String]) -> Result<Args, String> {
    let mut iter = raw.iter();
    let principal = iter
        .next()
        .filter(|s| !s.starts_with("--"))
        .cloned()
        .ok_or("missing principal username")?;

    let mut args = Args {
        principal,
        month: None,
        year: None,
        department: None,
        output: PathBuf::from("defaulter_report.csv"),
    };

    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("{} needs a value", flag))?;
        match flag.as_str() {
            "--month" => {
                let month = value
                    .parse::<u32>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| format!("invalid month '{}'", value))?;
                args.month = Some(month);
            }
            "--year" => {
                args.year = Some(value.parse().map_err(|_| format!("invalid year '{}'", value))?)
            }
            "--department" => {
                args.department = Some(
                    Department::from_str(value)
                        .map_err(|_| format!("unknown department '{}'", value))?,
                )
            }
            "--output" => args.output = PathBuf::from(value),
            other => return Err(format!("unknown option '{}'", other)),
        }
    }
    Ok(args)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging(
        &config::log_file(),
        &config::log_level(),
        config::log_to_stdout(),
    );

    let raw: Vec<String> = env::args().skip(1).collect();
    let args = match parse_args(&raw) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}: {}", "error".red(), err);
            eprintln!("{}", USAGE);
            process::exit(2);
        }
    };

    let db = match db::connect().await {
        Ok(db) => db,
        Err(err) => {
            eprintln!("{}: failed to connect to database: {}", "error".red(), err);
            process::exit(1);
        }
    };
    let engine = Engine::from_config(AppState::new(db));

    let today = engine.settings().local_date(engine.now());
    let month = args.month.unwrap_or_else(|| today.month());
    let year = args.year.unwrap_or_else(|| today.year());

    let principal = match principal::Model::find_by_username(engine.db(), &args.principal).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            eprintln!("{}: no principal named '{}'", "error".red(), args.principal);
            process::exit(1);
        }
        Err(err) => {
            eprintln!("{}: {}", "error".red(), err);
            process::exit(1);
        }
    };

    match engine
        .write_defaulter_report(&args.output, principal.id, month, year, args.department)
        .await
    {
        Ok(rows) => println!(
            "{} {} ({} teachers, {}-{:02})",
            "Report generated:".green(),
            args.output.display(),
            rows,
            year,
            month
        ),
        Err(err) => {
            tracing::error!("Defaulter report failed: {}", err);
            eprintln!("{}: {}", "error".red(), err);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_all_options() {
        let args = parse_args(&strings(&[
            "head",
            "--month",
            "3",
            "--year",
            "2025",
            "--department",
            "math",
            "--output",
            "out/march.csv",
        ]))
        .unwrap();
        assert_eq!(args.principal, "head");
        assert_eq!(args.month, Some(3));
        assert_eq!(args.year, Some(2025));
        assert_eq!(args.department, Some(Department::Mathematics));
        assert_eq!(args.output, PathBuf::from("out/march.csv"));
    }

    #[test]
    fn defaults_and_rejections() {
        let args = parse_args(&strings(&["head"])).unwrap();
        assert_eq!(args.month, None);
        assert_eq!(args.output, PathBuf::from("defaulter_report.csv"));

        assert!(parse_args(&[]).is_err());
        assert!(parse_args(&strings(&["--month", "3"])).is_err());
        assert!(parse_args(&strings(&["head", "--month", "13"])).is_err());
        assert!(parse_args(&strings(&["head", "--month"])).is_err());
        assert!(parse_args(&strings(&["head", "--department", "ASTRO"])).is_err());
        assert!(parse_args(&strings(&["head", "--colour", "red"])).is_err());
    }
}
