use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "parlor_client=debug,parlor_store=info,warn";

/// Install the global `fmt` subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless; the second call is ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Logging already initialised");
    }
}
