use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const GAME_LOG: &str = "game.log";
const HEADER_LINE: &str = "-------------------------------------------------------------------------------";
const HEADER_TITLE: &str = "Tibia - Graphical Multi-User-Dungeon";

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

pub fn log_dir(root: &Path) -> PathBuf {
    root.join("log")
}

/// Installs the global subscriber: stderr plus `<root>/log/game.log`.
/// `RUST_LOG` wins over `level` when set. Calling it twice is a no-op.
pub fn init(root: &Path, level: &str) -> Result<(), String> {
    if GUARD.get().is_some() {
        return Ok(());
    }
    let log_dir = log_dir(root);
    std::fs::create_dir_all(&log_dir)
        .map_err(|err| format!("log directory create failed: {}", err))?;
    write_header(&log_dir.join(GAME_LOG))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| format!("invalid log level {}: {}", level, err))?;
    let appender = tracing_appender::rolling::never(&log_dir, GAME_LOG);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .try_init()
        .map_err(|err| format!("log system already initialized: {}", err))?;

    GUARD
        .set(guard)
        .map_err(|_| "log system already initialized".to_string())?;
    Ok(())
}

fn write_header(path: &Path) -> Result<(), String> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("open log {} failed: {}", path.display(), err))?;
    if file.metadata().map(|m| m.len()).unwrap_or(0) > 0 {
        return Ok(());
    }
    writeln!(file, "{HEADER_LINE}").map_err(|err| format!("header write failed: {}", err))?;
    writeln!(file, "{HEADER_TITLE}").map_err(|err| format!("header write failed: {}", err))?;
    writeln!(file, "{GAME_LOG} - tile subsystem")
        .map_err(|err| format!("header write failed: {}", err))?;
    Ok(())
}
