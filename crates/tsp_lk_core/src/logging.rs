use std::{fs::File, io::Write};

use env_logger::{Builder, Target, fmt::Formatter};
use log::{Level, LevelFilter};

use crate::{Parameters, Result};

/// Maps the `TRACE_LEVEL` parameter onto a log filter.
///
/// Level 0 keeps only warnings and errors, 1 adds the per-run and per-trial
/// improvement lines, 2 adds every trial, and 3 or more enables trace output
/// from the search internals.
pub fn trace_level_filter(trace_level: usize) -> LevelFilter {
    match trace_level {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn init_logger(params: &Parameters) -> Result<()> {
    let log_timestamp = params.log_timestamp;

    let mut builder = Builder::new();
    builder
        .filter_level(trace_level_filter(params.trace_level))
        .write_style(env_logger::WriteStyle::Never)
        .format(move |buf: &mut Formatter, record| {
            if log_timestamp {
                write!(buf, "{} ", buf.timestamp_millis())?;
            }
            writeln!(buf, "{} {}", level_tag(record.level()), record.args())
        });

    if let Some(log_path) = params.log_file.as_deref() {
        let log_file = File::create(log_path).map_err(|e| {
            crate::Error::other(format!(
                "failed to create log file {}: {e}",
                log_path.display()
            ))
        })?;
        builder.target(Target::Pipe(Box::new(log_file)));
    } else {
        builder.target(Target::Stderr);
    }

    builder
        .try_init()
        .map_err(|e| crate::Error::other(format!("logger init failed: {e}")))
}

fn level_tag(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN",
        Level::Info => "INFO",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

#[cfg(test)]
mod tests {
    use log::LevelFilter;

    use super::trace_level_filter;

    #[test]
    fn trace_levels_map_to_expected_filters() {
        assert_eq!(trace_level_filter(0), LevelFilter::Warn);
        assert_eq!(trace_level_filter(1), LevelFilter::Info);
        assert_eq!(trace_level_filter(2), LevelFilter::Debug);
        assert_eq!(trace_level_filter(3), LevelFilter::Trace);
        assert_eq!(trace_level_filter(9), LevelFilter::Trace);
    }
}
