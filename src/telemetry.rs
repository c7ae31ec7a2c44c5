//! Telemetry: OTLP traces and logs, Prometheus metrics.
use axum::extract::{MatchedPath, Request};
use axum::http::Version;
use axum::middleware::Next;
use axum::response::IntoResponse;
use metrics::{Unit, gauge};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::{Span, Status, TraceError, Tracer};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::LogExporter;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::logs::{LogError, SdkLogger};
use opentelemetry_sdk::trace::SdkTracerProvider;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use tokio::time::sleep;

use std::time::{Duration, Instant};

/// `tracing` layer forwarding events to the OTLP log exporter.
pub type LogBridge = OpenTelemetryTracingBridge<SdkLoggerProvider, SdkLogger>;

const REQUEST_DURATION: &str = "http_requests_duration_seconds";
const PROCESS_REFRESH: Duration = Duration::from_secs(10);

fn ressources() -> Resource {
    Resource::builder()
        .with_service_name(env!("CARGO_PKG_NAME"))
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Exporters to flush before the process exits.
#[derive(Default)]
pub struct Providers {
    tracer: Option<SdkTracerProvider>,
    logger: Option<SdkLoggerProvider>,
}

impl Providers {
    /// Install the OTLP tracer as global provider and build the log bridge.
    ///
    /// Nothing is exported without an endpoint.
    pub fn init(endpoint: Option<&str>) -> Result<(Self, Option<LogBridge>), Box<dyn std::error::Error>> {
        let Some(endpoint) = endpoint else {
            return Ok((Self::default(), None));
        };

        let tracer = setup_tracer(endpoint)?;
        global::set_tracer_provider(tracer.clone());
        let (logger, bridge) = setup_logging(endpoint)?;

        Ok((
            Self {
                tracer: Some(tracer),
                logger: Some(logger),
            },
            Some(bridge),
        ))
    }

    /// Flush and stop every exporter.
    pub fn shutdown(self) {
        if let Some(tracer) = self.tracer {
            if let Err(err) = tracer.shutdown() {
                tracing::error!(error = %err, "failed to shut down tracer provider");
            }
        }
        if let Some(logger) = self.logger {
            if let Err(err) = logger.shutdown() {
                tracing::error!(error = %err, "failed to shut down logger provider");
            }
        }
    }
}

/// Create an OTLP span exporter sending to `endpoint`.
pub fn setup_tracer(endpoint: &str) -> Result<SdkTracerProvider, TraceError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(ressources())
        .build())
}

/// Create an OTLP log exporter and its `tracing` bridge.
pub fn setup_logging(endpoint: &str) -> Result<(SdkLoggerProvider, LogBridge), LogError> {
    let exporter = LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;
    let provider = SdkLoggerProvider::builder()
        .with_resource(ressources())
        .with_batch_exporter(exporter)
        .build();

    let bridge = OpenTelemetryTracingBridge::new(&provider);
    Ok((provider, bridge))
}

/// Create recorder for Prometheus metrics.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const EXPONENTIAL_SECONDS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    metrics::describe_counter!("http_requests_total", "Handled HTTP requests.");
    metrics::describe_histogram!(REQUEST_DURATION, Unit::Seconds, "HTTP request latency.");
    metrics::describe_gauge!(
        "process_cpu_usage",
        Unit::Percent,
        "CPU usage of the process in percentage."
    );
    metrics::describe_gauge!(
        "process_memory_used_bytes",
        Unit::Bytes,
        "Total process memory in bytes."
    );

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), EXPONENTIAL_SECONDS)?
        .install_recorder()?;

    tokio::spawn(watch_process());

    Ok(handle)
}

/// Publish process CPU and memory gauges forever.
async fn watch_process() {
    let mut system = System::new_with_specifics(RefreshKind::nothing());
    let pid = Pid::from_u32(std::process::id());

    loop {
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory().with_cpu(),
        );

        if let Some(process) = system.process(pid) {
            gauge!("process_memory_used_bytes").set(process.memory() as f64);
            gauge!("process_cpu_usage").set(process.cpu_usage() as f64);
        }

        sleep(PROCESS_REFRESH).await;
    }
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_11 => "HTTP/1.1",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "UNKNOWN",
    }
}

/// Record one span, a request counter and a latency histogram per request.
///
/// Paths are labelled by their route template so query strings never
/// reach metric labels.
pub async fn track(req: Request, next: Next) -> impl IntoResponse {
    let tracer = global::tracer("userpages-http");
    let mut otel_span = tracer.start("http-request");

    let start = Instant::now();
    let path = match req.extensions().get::<MatchedPath>() {
        Some(matched_path) => matched_path.as_str().to_owned(),
        None => req.uri().path().to_owned(),
    };
    let method = req.method().clone();
    let version = version_label(req.version());

    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let status = response.status();

    otel_span.set_attribute(KeyValue::new("version", version));
    otel_span.set_attribute(KeyValue::new("path", path.clone()));
    otel_span.set_attribute(KeyValue::new("method", method.to_string()));
    otel_span.set_attribute(KeyValue::new("status", i64::from(status.as_u16())));
    if status.is_server_error() {
        otel_span.set_status(Status::error(status.to_string()));
    }

    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", status.as_u16().to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!(REQUEST_DURATION, &labels).record(latency);

    otel_span.end();

    response
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use tower::util::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_track_passes_response_through() {
        let app = Router::new()
            .route("/{id}", get(|| async { (StatusCode::CREATED, "ok") }))
            .route_layer(from_fn(track));

        let response = app
            .oneshot(Request::builder().uri("/42").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_version_label() {
        assert_eq!(version_label(Version::HTTP_11), "HTTP/1.1");
        assert_eq!(version_label(Version::HTTP_2), "HTTP/2");
    }

    #[test]
    fn test_no_endpoint_exports_nothing() {
        let (providers, bridge) = Providers::init(None).unwrap();
        assert!(bridge.is_none());
        assert!(providers.tracer.is_none() && providers.logger.is_none());
        providers.shutdown();
    }
}
