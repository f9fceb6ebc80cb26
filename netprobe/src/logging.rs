use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_ENV: &str = "NETPROBE_LOG";

fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    match (quiet, verbose) {
        (true, _) => "netprobe=error,libnetprobe=error",
        (false, 0) => "netprobe=info,libnetprobe=info",
        (false, 1) => "netprobe=debug,libnetprobe=debug",
        (false, _) => "netprobe=trace,libnetprobe=trace",
    }
}

/// Logs go to stderr so `--print` output on stdout stays clean.
pub fn initialize_logging(verbose: u8, quiet: bool) {
    let directive = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV))
        .unwrap_or_else(|_| default_directive(verbose, quiet).to_string());

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(EnvFilter::new(directive))
        .with(stderr_layer)
        .init();
}
