//! File logging for evaluation runs.
//!
//! Enabled via [`Configuration::with_log`](crate::configuration::Configuration::with_log);
//! each process writes one timestamped `*_span_bench.log` file in the working
//! directory.

use std::fs::File;
use std::io;
use std::path::Path;

use time::{format_description, OffsetDateTime, UtcOffset};
use tracing::{subscriber::set_global_default, Level, Subscriber};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, FmtSubscriber};

/// Installs the global file subscriber.
///
/// Panics if the log file cannot be created or another subscriber is already
/// installed; disable logging in that case.
pub fn init_logger() {
    let subscriber = file_subscriber(Path::new(&log_file_name()))
        .expect("Could not create the log file in the working directory.");
    set_global_default(subscriber).expect(
        "Could not set global default tracing subscriber. \
         Consider disabling logs if you are already setting a subscriber.",
    );
}

/// Builds a TRACE-level subscriber writing plain-text lines to `path`.
fn file_subscriber(path: &Path) -> io::Result<impl Subscriber + Send + Sync> {
    let file = File::create(path)?;
    // local offset is unavailable once other threads exist; UTC is fine then
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = tracing_subscriber::fmt::time::OffsetTime::new(
        offset,
        format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
            .expect("static timestamp format"),
    );

    Ok(FmtSubscriber::builder()
        .with_max_level(Level::TRACE)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(BoxMakeWriter::new(file))
        .finish())
}

fn log_file_name() -> String {
    let format =
        format_description::parse("[year]-[month]-[day]_[hour]-[minute]-[second]_span_bench.log")
            .expect("static file name format");
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format)
        .unwrap_or_else(|_| String::from("span_bench.log"))
}
