use crate::config::LoggingConfig;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global subscriber. The returned guard flushes pending Sentry
/// events on drop and must be held for the lifetime of the process.
pub fn init(config: &LoggingConfig) -> Option<sentry::ClientInitGuard> {
    let guard = config.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|err| {
        eprintln!("invalid log level {:?}, using info: {err}", config.level);
        EnvFilter::new("info")
    });

    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_filter(filter))
        .with(sentry_layer)
        .try_init();
    if let Err(err) = result {
        eprintln!("logging already initialized: {err}");
    }

    guard
}
