use tracing_subscriber::{
    EnvFilter,
    filter::LevelFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn env_filter(default: LevelFilter) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

/// Initialise default non-JSON `xgate` logging, filtered by `RUST_LOG` (default `INFO`).
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(env_filter(LevelFilter::INFO))
        .with(tracing_subscriber::fmt::layer())
        .init()
}

/// Initialise default JSON `xgate` logging, filtered by `RUST_LOG` (default `INFO`).
pub fn init_json_logging() {
    tracing_subscriber::registry()
        .with(env_filter(LevelFilter::INFO))
        .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
        .init()
}

/// Initialise logging captured by the test harness. Safe to call from every test, only the
/// first call installs the subscriber.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter(LevelFilter::DEBUG))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
