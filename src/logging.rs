use std::io::IsTerminal;

use tracing_subscriber::{filter::LevelFilter, EnvFilter};

/// Install the stderr logger. `RUST_LOG` wins over the default level, which
/// is `warn` (or `debug` with `--verbose`) so logs stay out of the way of the
/// status lines printed on stdout.
pub fn register_logger(verbose: bool) {
    let default_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::WARN };
    let log_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();
}
