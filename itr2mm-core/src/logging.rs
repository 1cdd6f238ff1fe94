use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "itr2mm.log";
const DEFAULT_FILTER: &str = "info";

static LOG_DIR: OnceCell<PathBuf> = OnceCell::new();
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

fn default_log_dir() -> PathBuf {
    crate::settings::data_dir()
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
}

/// Install the console and daily-rotated file subscribers under the app data dir.
///
/// Only the first call has an effect; `RUST_LOG` overrides the `info` default.
/// Returns the directory log files are written to.
pub fn init_logging() -> &'static Path {
    init_logging_in(default_log_dir())
}

pub fn init_logging_in(dir: PathBuf) -> &'static Path {
    LOG_DIR.get_or_init(|| {
        let _ = fs::create_dir_all(&dir);
        let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, LOG_FILE_PREFIX));
        let _ = FILE_GUARD.set(guard);

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .with(fmt::layer().with_writer(file_writer).with_target(false).with_ansi(false))
            .try_init()
            .is_ok();
        if installed {
            tracing::info!("logging to {}", dir.display());
        }
        dir
    })
}

/// Rate-limits progress messages that share a prefix such as `"Extracting:"`.
///
/// A message whose prefix differs from the previous one, or that reports 100%,
/// is always forwarded.
pub struct ProgressThrottle {
    last_msg: String,
    last_sent: Option<Instant>,
    min_interval: Duration,
}

impl ProgressThrottle {
    pub fn new(min_interval_ms: u64) -> Self {
        Self { last_msg: String::new(), last_sent: None, min_interval: Duration::from_millis(min_interval_ms) }
    }

    pub fn emit(&mut self, prefix: &str, msg: String, pct: u8, mut sink: impl FnMut(&str, u8)) {
        let now = Instant::now();
        let repeated = self.last_msg.starts_with(prefix) && msg.starts_with(prefix);
        let due = self.last_sent.map_or(true, |t| now.duration_since(t) >= self.min_interval);
        if !repeated || pct >= 100 || due {
            sink(&msg, pct);
            tracing::debug!(target: "progress", "{}", msg);
            self.last_msg = msg;
            self.last_sent = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProgressThrottle;

    #[test]
    fn throttles_repeated_prefixes_but_not_completion() {
        let mut throttle = ProgressThrottle::new(60_000);
        let mut seen = Vec::new();
        for i in 0..10u8 {
            throttle.emit("Extracting:", format!("Extracting: {i}"), i, |m, _| seen.push(m.to_string()));
        }
        throttle.emit("Extracting:", "Extracting: done".to_string(), 100, |m, _| seen.push(m.to_string()));
        assert_eq!(seen, vec!["Extracting: 0".to_string(), "Extracting: done".to_string()]);
    }

    #[test]
    fn different_prefix_is_emitted_immediately() {
        let mut throttle = ProgressThrottle::new(60_000);
        let mut count = 0;
        throttle.emit("Extracting:", "Extracting: a".into(), 1, |_, _| count += 1);
        throttle.emit("Copying:", "Copying: b".into(), 2, |_, _| count += 1);
        assert_eq!(count, 2);
    }

    #[test]
    fn first_init_wins() {
        let dir = tempfile::tempdir().unwrap().keep();
        let first = super::init_logging_in(dir.join("logs"));
        let second = super::init_logging_in(dir.join("other"));
        assert_eq!(first, second);
        assert!(first.is_dir());
    }
}
