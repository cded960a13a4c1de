use crate::config::Config;
use metrics::describe_counter;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime, trace as sdktrace, Resource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const DEFAULT_LOG_FILTER: &str = "mailcast=info,tower_http=info,sqlx=warn";

/// Flushes pending spans when dropped.
pub struct ObservabilityGuard;

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        global::shutdown_tracer_provider();
    }
}

pub fn init(config: &Config) -> Result<ObservabilityGuard, Box<dyn std::error::Error>> {
    init_tracing(config)?;
    init_metrics(config)?;
    Ok(ObservabilityGuard)
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let Some(endpoint) = &config.otel_exporter_endpoint else {
        Registry::default().with(env_filter).with(fmt_layer).init();
        return Ok(());
    };

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);

    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
            KeyValue::new("service.name", config.service_name.clone()),
        ])))
        .install_batch(runtime::Tokio)?;

    Registry::default()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    tracing::info!("Exporting traces to {}", endpoint);
    Ok(())
}

fn init_metrics(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], config.metrics_port))
        .install()?;

    describe_counter!("emails_sent_total", "Emails accepted by the mail transport");
    describe_counter!(
        "emails_rejected_total",
        "Send jobs dead-lettered as non-retriable or out of attempts"
    );
    describe_counter!(
        "emails_deferred_total",
        "Send jobs left on the queue after a transient failure"
    );
    describe_counter!("templates_processed_total", "Templates put in service");
    describe_counter!("templates_failed_total", "Templates disabled by a processing failure");
    describe_counter!("jobs_dead_lettered_total", "Queue jobs moved to the dead-letter state");

    tracing::info!(
        "Metrics exporter (Prometheus) started on port {}",
        config.metrics_port
    );
    Ok(())
}
