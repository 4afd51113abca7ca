use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global `tracing` subscriber.
///
/// Logs go to a daily-rolling file under the directory of `log_file` (or
/// `logs/` for a bare file name), and additionally to stdout when
/// `log_to_stdout` is set. The filter is read from `LOG_LEVEL`, falling back
/// to `default_level`.
///
/// Keep the returned guard alive for the life of the process or buffered
/// lines are lost.
pub fn init_logging(log_file: &str, default_level: &str, log_to_stdout: bool) -> WorkerGuard {
    let path = Path::new(log_file);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => Path::new("logs").to_path_buf(),
    };
    let file_name = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "presence.log".into());

    fs::create_dir_all(&dir).ok();

    let file_appender = rolling::daily(&dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(true);

    let env_filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    // A second init (e.g. two binaries sharing a test harness) is not fatal.
    if log_to_stdout {
        registry.with(stdout_layer).try_init().ok();
    } else {
        registry.try_init().ok();
    }

    guard
}
