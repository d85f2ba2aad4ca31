//! Logging setup (C14): verbosity count maps to a log level, `-D/--debug`
//! forces module path and line numbers into the output.
//!
//! The teacher has no logging crate of its own; this is grounded in the
//! rest of the retrieval pack's `env_logger` usage.

use std::io::Write;

use chrono::Local;
use log::LevelFilter;

pub fn init(verbosity: u8, debug: bool) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);

    if debug {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.module_path().unwrap_or("?"),
                record.line().unwrap_or(0),
                record.args()
            )
        });
    } else {
        builder.format(|buf, record| {
            writeln!(buf, "[{} {}] {}", Local::now().format("%H:%M:%S"), record.level(), record.args())
        });
    }

    builder.init();
}
