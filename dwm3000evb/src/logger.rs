//! `log` output over semihosting
//!
//! Slow, and halts the core if no debugger is attached. Only for bench work.

use cortex_m_semihosting::hprintln;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

struct SemihostingLogger;

impl Log for SemihostingLogger {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let _ = hprintln!("[{}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}

static LOGGER: SemihostingLogger = SemihostingLogger;

/// Installs the semihosting logger, showing records up to `level`
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
