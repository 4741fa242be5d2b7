use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber for an embedding host.
///
/// `RUST_LOG` takes precedence over `default_directive` (e.g. `"warn"` or
/// `"shelfdesk_core=debug"`). Logs go to stderr. Calling this twice is a
/// no-op on the second call.
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
