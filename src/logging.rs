//! Diagnostic logging setup.

use std::io::Write;
use std::thread;

use env_logger::Builder;
use log::LevelFilter;

/// Initializes the global logger. Diagnostics go to the standard error, so that they never mix
/// with the messages printed on the standard output.
///
/// `rust_log` uses the `RUST_LOG` syntax, e.g. `json_consumer=debug,rdkafka=trace`. When it is
/// `None`, the `RUST_LOG` environment variable is used instead, falling back to `info`.
pub fn setup_logger(log_thread: bool, rust_log: Option<&str>) {
    let mut builder = Builder::new();
    builder
        .format(move |buf, record| {
            let thread_name = if log_thread {
                format!("({}) ", thread::current().name().unwrap_or("unknown"))
            } else {
                String::new()
            };
            writeln!(
                buf,
                "{}{} - {} - {}",
                thread_name,
                record.level(),
                record.target(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info);

    match rust_log {
        Some(conf) => {
            builder.parse_filters(conf);
        }
        None => {
            if let Ok(conf) = std::env::var("RUST_LOG") {
                builder.parse_filters(&conf);
            }
        }
    }

    if builder.try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
