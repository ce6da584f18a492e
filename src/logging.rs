use std::io::Write;

use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,  // default: warnings and errors
        1 => LevelFilter::Info,  // -v: model calls, token usage
        2 => LevelFilter::Debug, // -vv: chunking, per-chunk summaries
        _ => LevelFilter::Trace, // -vvv: prompts and raw responses
    }
}

/// Log to stderr with colored level labels. Only this crate's records pass
/// the verbosity filter; `RUST_LOG` still applies on top.
pub fn init_logger(verbosity: u8) {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module(env!("CARGO_CRATE_NAME"), level_for(verbosity));
    builder.parse_default_env();

    builder.format(|buf, record| {
        let level_label = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN ".yellow().bold(),
            Level::Info => "INFO ".white().bold(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };

        writeln!(buf, "{} {}", level_label, record.args())
    });

    builder.init();
}
