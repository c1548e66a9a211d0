//! Internal logging and tracing configurations

use std::env;

use opentelemetry::trace::{TraceContextExt as _, TracerProvider as _};
use opentelemetry::{KeyValue, TraceId};
use opentelemetry_otlp::SpanExporter;
use opentelemetry_resource_detectors::{K8sResourceDetector, ProcessResourceDetector};
use opentelemetry_sdk::{
    Resource,
    trace::{SdkTracer, SdkTracerProvider},
};
use tracing::{Span, field};
use tracing_opentelemetry::{OpenTelemetryLayer, OpenTelemetrySpanExt as _};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Fetch the `TraceId` of the current span through the full tracing stack
#[must_use]
pub fn get_trace_id() -> TraceId {
    Span::current().context().span().span_context().trace_id()
}

/// Records the current trace id on the current span's `trace_id` field, if tracing is exported
pub fn record_trace_id() {
    let trace_id = get_trace_id();
    if trace_id != TraceId::INVALID {
        Span::current().record("trace_id", field::display(&trace_id));
    }
}

fn resource() -> Resource {
    Resource::builder()
        .with_detector(Box::new(K8sResourceDetector))
        .with_detector(Box::new(ProcessResourceDetector))
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

fn init_tracer() -> anyhow::Result<SdkTracer> {
    let exporter = SpanExporter::builder().with_tonic().build()?;

    let provider = SdkTracerProvider::builder()
        .with_resource(resource())
        .with_batch_exporter(exporter)
        .build();

    Ok(provider.tracer("deploycat"))
}

fn is_otel_enabled() -> bool {
    env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok()
}

fn is_json_format() -> bool {
    env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Initializes tracing with subscribers: `LOG_LEVEL` filters, `LOG_FORMAT=json`
/// switches to structured output, `OTEL_EXPORTER_OTLP_ENDPOINT` enables span export.
///
/// # Errors
/// Will return `Err` if it wasn't able to initialize tracing
pub fn init() -> anyhow::Result<()> {
    let logger = if is_json_format() {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    let env_filter = EnvFilter::from_env("LOG_LEVEL");
    let registry = Registry::default().with(env_filter).with(logger);

    if is_otel_enabled() {
        registry
            .with(OpenTelemetryLayer::new(init_tracer()?))
            .try_init()?;
    } else {
        registry.try_init()?;
    }

    Ok(())
}
