use crate::config::Config;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_stackdriver::CloudTraceConfiguration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,collage_services=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Local runs get human readable output. Every other environment emits
/// Stackdriver JSON and propagates W3C trace context, linking spans to Cloud
/// Trace when `GOOGLE_CLOUD_PROJECT` is configured.
pub fn init_tracing(config: &Config) -> anyhow::Result<()> {
    if config.is_local() {
        tracing_subscriber::registry()
            .with(env_filter())
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
        return Ok(());
    }

    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let stackdriver_layer = match config.google_cloud_project() {
        Some(project_id) => {
            tracing_stackdriver::layer().with_cloud_trace(CloudTraceConfiguration {
                project_id: project_id.to_owned(),
            })
        }
        None => tracing_stackdriver::layer(),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_opentelemetry::layer())
        .with(stackdriver_layer)
        .try_init()?;

    Ok(())
}
