use super::*;

/// The filter used when `RUST_LOG` is unset.
pub(crate) fn default_filter(level: &str) -> String {
    format!("warn,scratchminer={level}")
}

/// Logs to stderr through a non-blocking writer. The returned guard flushes on drop and
/// must live until the process exits.
pub(crate) fn init(level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let (writer, guard) = non_blocking(io::stderr());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(writer)
                .with_filter(filter),
        )
        .try_init();

    if let Err(err) = result {
        eprintln!("failed to install log subscriber: {err}");
    }

    guard
}
