//! Process wide logging: a `tracing` subscriber writing to a log file whose
//! level can be changed while the program runs.
use anyhow::{anyhow, Result};
use clap::ValueEnum;
use std::fmt::{Display, Formatter};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, reload, Registry};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    #[value(name = "OFF")]
    Off,
    #[value(name = "ERROR")]
    Error,
    #[value(name = "WARN")]
    Warn,
    #[default]
    #[value(name = "INFO")]
    Info,
    #[value(name = "DEBUG")]
    Debug,
    #[value(name = "TRACE")]
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl TryFrom<&str> for LogLevel {
    type Error = String;

    fn try_from(value: &str) -> std::result::Result<Self, String> {
        <Self as ValueEnum>::from_str(value, true)
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogLevel::Off => "OFF",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        };
        f.write_str(name)
    }
}

/// Keeps the background writer alive; dropping it flushes pending log lines.
pub struct Logger {
    level: LogLevel,
    reload_handle: reload::Handle<LevelFilter, Registry>,
    _guard: WorkerGuard,
}

impl Logger {
    /// Installs the global subscriber. Can only succeed once per process.
    pub fn init(level: LogLevel, log_dir: &Path, log_file: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::never(log_dir, log_file);
        let (writer, guard) = tracing_appender::non_blocking(file_appender);

        let (filter, reload_handle) = reload::Layer::new(LevelFilter::from(level));
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_thread_names(true),
            )
            .try_init()?;

        Ok(Self {
            level,
            reload_handle,
            _guard: guard,
        })
    }
    /// Returns the previous level.
    pub fn set_log_level(&mut self, level: LogLevel) -> Result<LogLevel> {
        self.reload_handle
            .modify(|filter| *filter = LevelFilter::from(level))
            .map_err(|e| anyhow!("Could not change log level: {}", e))?;
        Ok(std::mem::replace(&mut self.level, level))
    }
}
