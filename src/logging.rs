//! Logger setup for the command line.
//!
//! Library code only uses the `log` macros; the binary installs an
//! `env_logger` backend writing to stderr so report output on stdout stays
//! machine readable. `RUST_LOG` takes precedence over the verbosity flag.

use std::io::Write;
use std::sync::Once;

use log::LevelFilter;

static LOGGING_INIT: Once = Once::new();

/// Maps `-v` occurrences to a level filter: none is `warn`, one `info`,
/// two or more `debug`.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Installs the global logger. Later calls are no-ops.
pub fn init(verbosity: u8) {
    LOGGING_INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(level_for(verbosity));
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        builder.format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        });
        // A logger installed by an embedding host wins.
        let _ = builder.try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_the_level() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(5), LevelFilter::Debug);
    }

    #[test]
    fn init_is_idempotent() {
        init(0);
        init(2);
    }
}
