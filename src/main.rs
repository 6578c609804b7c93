//! tftest CLI entry point

use tftest_core::env::{TFTEST_DEBUG, is_debug_value};

fn main() {
    // RUST_LOG wins; otherwise TFTEST_DEBUG=true switches the default from info to debug
    let default_level = if is_debug_value(std::env::var(TFTEST_DEBUG).ok().as_deref()) {
        "debug"
    } else {
        "info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();

    tftest::cli::run();
}
