// odoshard_cli/src/logging.rs

use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is not set. `odoshard` is the binary's own target.
pub const DEFAULT_DIRECTIVES: &str = "odoshard=info,odoshard_core=info,odoshard_cli=info";

/// Installs the global subscriber. Logs go to stderr so stdout stays clean.
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
