//! A logging backend that prints colored records through a console sink.
//!
//! The lock itself only talks to the `log` facade. A runtime that wants to see
//! those records installs [`QSpinLogger`] with a console writer of its own
//! (a UART, an SBI call, `stderr` in tests). The writer must not take a queued
//! spinlock of a platform that logs, or the slow path would recurse into it.

use core::fmt;

use log::{self, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Once;

/// Writes one formatted record to the console.
pub type ConsoleSink = fn(fmt::Arguments);

static CONSOLE: Once<ConsoleSink> = Once::new();

/// # Initialization
/// Installs the logger and picks the level from the `LOG` environment
/// variable at build time:
/// - "ERROR" -> `LevelFilter::Error`
/// - "WARN" -> `LevelFilter::Warn`
/// - "INFO" -> `LevelFilter::Info`
/// - "DEBUG" -> `LevelFilter::Debug`
/// - "TRACE" -> `LevelFilter::Trace`
/// - Any other value -> `LevelFilter::Off`
///
/// Fails if a logger is already installed.
pub fn init(sink: ConsoleSink) -> Result<(), SetLoggerError> {
    static LOGGER: QSpinLogger = QSpinLogger;
    CONSOLE.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(level_from_env(option_env!("LOG")));
    Ok(())
}

fn level_from_env(level: Option<&str>) -> LevelFilter {
    match level {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Off,
    }
}

/// Prints records to the registered console with ANSI color per level.
pub struct QSpinLogger;

impl Log for QSpinLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level() && CONSOLE.is_completed()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(print) = CONSOLE.get() {
            print_in_color(
                print,
                format_args!("[QSPIN][{:>5}] {}\n", record.level(), record.args()),
                level_to_color_code(record.level()),
            );
        }
    }

    fn flush(&self) {}
}

/// Adds escape sequences to the formatted string to print with a specific color.
macro_rules! with_color {
    ($args: ident, $color_code: ident) => {{
        format_args!("\u{1B}[{}m{}\u{1B}[0m", $color_code as u8, $args)
    }};
}

fn print_in_color(print: &ConsoleSink, args: fmt::Arguments, color_code: u8) {
    print(with_color!(args, color_code));
}

/// - `Level::Error` -> Red (31)
/// - `Level::Warn` -> Bright Yellow (93)
/// - `Level::Info` -> Blue (34)
/// - `Level::Debug` -> Green (32)
/// - `Level::Trace` -> Bright Black (90)
fn level_to_color_code(level: Level) -> u8 {
    match level {
        Level::Error => 31, // Red
        Level::Warn => 93,  // BrightYellow
        Level::Info => 34,  // Blue
        Level::Debug => 32, // Green
        Level::Trace => 90, // BrightBlack
    }
}
