//! Console logging for the CLI.
//!
//! The library only talks to the `log` facade. The binary installs
//! [`ConsoleLogger`], which prints one line per record to stderr with a level
//! prefix; debug and trace records are indented under the info lines.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use once_cell::sync::Lazy;
use std::io::Write;

/// Global console logger
pub static CONSOLE_LOGGER: Lazy<ConsoleLogger> = Lazy::new(ConsoleLogger::new);

/// Prints records of this crate only.
pub struct ConsoleLogger;

impl ConsoleLogger {
    pub fn new() -> Self {
        Self
    }

    fn prefix(level: Level) -> &'static str {
        match level {
            Level::Error => "   ❌",
            Level::Warn => "   ⚠️",
            Level::Info => "   ",
            Level::Debug => "      ·",
            Level::Trace => "         ·",
        }
    }

    /// Line printed for a record.
    pub fn line(level: Level, message: &str) -> String {
        format!("{} {}", Self::prefix(level), message)
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level() && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = Self::line(record.level(), &record.args().to_string());
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the console logger at `level`.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&*CONSOLE_LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
