//! Run logging for weft.
//!
//! Levels, from quietest:
//! - ERROR: task failures that abort a run
//! - WARN: recoverable surprises (missing input keys, stalls, failed subtasks)
//! - INFO: run, round and task lifecycle
//! - DEBUG: input routing and scheduling decisions
//! - TRACE: payloads
//!
//! `WEFT_LOG=<level>` overrides the level chosen at init; `WEFT_DEBUG=1` is
//! shorthand for `WEFT_LOG=debug`. Nothing is written until a log file has
//! been chosen with [`init`] or [`init_at`].

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
// Pool threads log concurrently; keep lines whole.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown log level '{}'", s))
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

fn env_level() -> Option<LogLevel> {
    if let Some(level) = std::env::var("WEFT_LOG").ok().and_then(|v| v.parse().ok()) {
        return Some(level);
    }
    std::env::var("WEFT_DEBUG")
        .ok()
        .filter(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .map(|_| LogLevel::Debug)
}

/// Log to `~/.weft/weft.log` at INFO (or the environment's level).
pub fn init() {
    init_with_debug(false);
}

/// Log to `~/.weft/weft.log`, at DEBUG when `debug` is set.
pub fn init_with_debug(debug: bool) {
    let requested = if debug { LogLevel::Debug } else { LogLevel::Info };
    set_level(env_level().unwrap_or(requested));

    if let Some(dir) = dirs::home_dir().map(|h| h.join(".weft")) {
        let _ = std::fs::create_dir_all(&dir);
        init_at(dir.join("weft.log"));
    }
}

/// Log to an explicit file, truncating it.
///
/// The first path set in a process wins; later calls are ignored.
pub fn init_at(path: PathBuf) {
    if LOG_PATH.get().is_some() {
        return;
    }
    let _ = std::fs::write(&path, "");
    let _ = LOG_PATH.set(path);
}

pub fn set_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

pub fn get_level() -> LogLevel {
    let raw = LOG_LEVEL.load(Ordering::Relaxed) as usize;
    LogLevel::ALL[raw.min(LogLevel::ALL.len() - 1)]
}

pub fn is_debug() -> bool {
    get_level() >= LogLevel::Debug
}

/// True when a message at `level` would be written.
pub fn enabled(level: LogLevel) -> bool {
    level <= get_level() && LOG_PATH.get().is_some()
}

/// Write one line at `level`.
pub fn log_at(level: LogLevel, msg: &str) {
    if !enabled(level) {
        return;
    }
    let Some(path) = LOG_PATH.get() else {
        return;
    };
    let _guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let now = chrono::Local::now().format("%H:%M:%S%.3f");
        let _ = writeln!(file, "[{}] [{}] {}", now, level, msg);
    }
}

/// `[scope:name] event: msg`.
pub fn format_scoped(scope: &str, name: &str, event: &str, msg: &str) -> String {
    format!("[{}:{}] {}: {}", scope, name, event, msg)
}

/// Task lifecycle line at INFO.
pub fn task_log(task: &str, event: &str, msg: &str) {
    log_at(LogLevel::Info, &format_scoped("task", task, event, msg));
}

/// Project lifecycle line at INFO.
pub fn project_log(project: &str, event: &str, msg: &str) {
    log_at(LogLevel::Info, &format_scoped("project", project, event, msg));
}

#[macro_export]
macro_rules! wlog {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! wlog_error {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Error, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! wlog_warn {
    ($($arg:tt)*) => {
        $crate::log::log_at($crate::log::LogLevel::Warn, &format!($($arg)*))
    };
}

/// Formats only when DEBUG is enabled.
#[macro_export]
macro_rules! wlog_debug {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::LogLevel::Debug) {
            $crate::log::log_at($crate::log::LogLevel::Debug, &format!($($arg)*))
        }
    };
}

/// Formats only when TRACE is enabled.
#[macro_export]
macro_rules! wlog_trace {
    ($($arg:tt)*) => {
        if $crate::log::enabled($crate::log::LogLevel::Trace) {
            $crate::log::log_at($crate::log::LogLevel::Trace, &format!($($arg)*))
        }
    };
}
