use crate::config;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Ensure the parent directory of a *file path* exists (no-op if none).
pub fn ensure_parent_dir<P: AsRef<Path>>(file_path: P) -> io::Result<()> {
    if let Some(parent) = file_path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// SQLite database file path (absolute), from `config::database_path()`.
/// If relative in env, resolve against current_dir().
pub fn database_file() -> PathBuf {
    let p = PathBuf::from(config::database_path());
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ensure_parent_dir_creates_missing_directories() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("reports").join("2025").join("march.csv");

        ensure_parent_dir(&file).unwrap();
        assert!(file.parent().unwrap().is_dir());
    }

    #[test]
    fn ensure_parent_dir_accepts_bare_file_names() {
        assert!(ensure_parent_dir("report.csv").is_ok());
    }
}
