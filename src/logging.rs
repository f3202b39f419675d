//! Logging setup for applications embedding the index.
//!
//! The index itself only emits records through the `log` facade: group
//! creation and teardown, promotion, file registration and bulk removal are
//! logged at `debug`, per-block events at `trace`. This module wires those
//! records to `env_logger`.
//!
//! The filter is chosen by, in priority order:
//!
//! 1. `RUST_LOG` environment variable (if set)
//! 2. `quiet`: error only
//! 3. `verbose`: 0 = info, 1 = debug, 2+ = trace
//!
//! ```rust,no_run
//! blockdupe::logging::init_logging(1, false);
//! log::debug!("index logging enabled");
//! ```

use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Install an `env_logger` backend.
///
/// Returns `false` if a logger was already installed; unlike a bare
/// `env_logger::init` this never panics, so tests and host applications may
/// call it more than once.
pub fn init_logging(verbose: u8, quiet: bool) -> bool {
    let mut builder = Builder::new();

    if env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }

    builder.format(move |buf, record| {
        let level = record.level();
        let level_style = buf.default_level_style(level);
        if verbose >= 1 {
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} [{}] {}",
                level,
                record.module_path().unwrap_or("unknown"),
                record.args()
            )
        } else {
            writeln!(buf, "{level_style}{:<5}{level_style:#} {}", level, record.args())
        }
    });

    let installed = builder.try_init().is_ok();
    if installed {
        log::debug!("Logging initialized at level: {:?}", log::max_level());
    }
    installed
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
