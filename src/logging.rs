use crate::config::LoggingConfig;
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;

const LOG_FILE_PREFIX: &str = "cirql.log";

fn parse_level(level: &str) -> Level {
    Level::from_str(level.trim()).unwrap_or(if cfg!(feature = "debug-logging") {
        Level::DEBUG
    } else {
        Level::INFO
    })
}

/// Installs the global subscriber: stdout always, plus a daily rolling file when a
/// directory is configured. The returned guard must outlive the server or buffered
/// file output is lost.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let level: Level = parse_level(&config.level);
    match config.directory.as_ref() {
        Some(directory) => {
            let file_appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_target(true)
                .with_writer(std::io::stdout.and(file_writer))
                .try_init();
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_target(true)
                .try_init();
            None
        }
    }
}
