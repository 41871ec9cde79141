use crate::config::MetricsConfig;
use metrics_exporter_statsd::StatsdBuilder;
use shared::metrics_defs::describe;

#[derive(thiserror::Error, Debug)]
pub enum MetricsError {
    #[error("could not build statsd exporter: {0}")]
    Exporter(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    AlreadyInstalled,
}

/// Installs the statsd recorder and registers every metric description.
pub fn init(config: &MetricsConfig) -> Result<(), MetricsError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some("geogrow"))?;
    metrics::set_global_recorder(recorder).map_err(|_| MetricsError::AlreadyInstalled)?;

    describe(upstreams::metrics_defs::ALL_METRICS);
    describe(response_cache::metrics_defs::ALL_METRICS);
    describe(gateway::metrics_defs::ALL_METRICS);
    Ok(())
}
