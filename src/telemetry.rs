//! Telemetry and logging infrastructure
//!
//! - Console logging (human-readable, verbose mode only)
//! - JSON file logging, rolled daily (for analysis)
//! - OpenTelemetry export (Jaeger, Honeycomb, etc.)
//! - Per-session run counters fed from `RunEvent`s

use crate::events::RunEvent;
use crate::supervisor::RunStatus;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

const SERVICE_NAME: &str = "trip-planner";

/// Counters for one telemetry session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub runs: u64,
    pub completed: u64,
    pub aborted: u64,
    pub errored: u64,
    pub dispatches: u64,
    pub failed_dispatches: u64,
    pub tool_calls: u64,
    pub failed_tool_calls: u64,
    pub redirects: u64,
    pub routing_faults: u64,
}

impl std::fmt::Display for SessionStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Runs: {} ({} completed, {} aborted, {} error)",
            self.runs, self.completed, self.aborted, self.errored
        )?;
        writeln!(
            f,
            "Dispatches: {} ({} failed, {} redirects)",
            self.dispatches, self.failed_dispatches, self.redirects
        )?;
        writeln!(f, "Routing faults: {}", self.routing_faults)?;
        write!(
            f,
            "Tool calls: {} ({} failed)",
            self.tool_calls, self.failed_tool_calls
        )
    }
}

/// Main telemetry handler
pub struct Telemetry {
    session_id: Uuid,
    log_dir: PathBuf,
    stats: Mutex<SessionStats>,
    _file_guard: Option<WorkerGuard>,
    _otel_provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Initialize the subscriber stack. Console output only when `verbose`;
    /// the JSON file log is always on.
    pub fn init(log_dir: &Path, verbose: bool, otel_endpoint: Option<&str>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(log_dir)?;
        let session_id = Uuid::new_v4();

        let file_appender = tracing_appender::rolling::daily(log_dir, "trip_planner.log");
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);

        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if verbose {
                EnvFilter::new("debug,hyper=info,reqwest=info,h2=info,rustls=info")
            } else {
                EnvFilter::new("info,hyper=warn,reqwest=warn,h2=warn,rustls=warn")
            }
        });
        let console = verbose.then(|| fmt::layer().with_target(false).compact());
        let file = fmt::layer().json().with_writer(non_blocking);

        let otel_provider = match otel_endpoint {
            Some(endpoint) => {
                let exporter = opentelemetry_otlp::SpanExporter::builder()
                    .with_http()
                    .with_endpoint(endpoint)
                    .with_protocol(opentelemetry_otlp::Protocol::HttpBinary)
                    .build()?;

                let provider = SdkTracerProvider::builder()
                    .with_batch_exporter(exporter)
                    .with_resource(Resource::builder().with_service_name(SERVICE_NAME).build())
                    .build();

                let tracer = provider.tracer(SERVICE_NAME);
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console)
                    .with(file)
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .try_init()
                    .ok();
                Some(provider)
            }
            None => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console)
                    .with(file)
                    .try_init()
                    .ok();
                None
            }
        };

        tracing::info!(
            session_id = %session_id,
            log_dir = %log_dir.display(),
            otel_enabled = otel_endpoint.is_some(),
            "Telemetry initialized"
        );

        Ok(Self {
            session_id,
            log_dir: log_dir.to_path_buf(),
            stats: Mutex::new(SessionStats::default()),
            _file_guard: Some(file_guard),
            _otel_provider: otel_provider,
        })
    }

    /// No subscriber, no files (for testing)
    pub fn minimal() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            log_dir: PathBuf::from(".trip_logs"),
            stats: Mutex::new(SessionStats::default()),
            _file_guard: None,
            _otel_provider: None,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Count an event and log it
    pub fn record(&self, event: &RunEvent) {
        let mut stats = self.stats.lock();
        match event {
            RunEvent::RunStart { run_id } => {
                stats.runs += 1;
                tracing::info!(session_id = %self.session_id, run_id = %run_id, "Run started");
            }
            RunEvent::RunComplete {
                run_id,
                status,
                iterations,
            } => {
                match status {
                    RunStatus::Completed => stats.completed += 1,
                    RunStatus::Aborted => stats.aborted += 1,
                    RunStatus::Error => stats.errored += 1,
                }
                tracing::info!(run_id = %run_id, %status, iterations, "Run finished");
            }
            RunEvent::RoutingDecided {
                iteration,
                next,
                fault,
                ..
            } => {
                if fault.is_some() {
                    stats.routing_faults += 1;
                }
                tracing::debug!(iteration, next = %next, fault = ?fault, "Routing decided");
            }
            RunEvent::Redirected {
                requested,
                next,
                reason,
            } => {
                stats.redirects += 1;
                tracing::debug!(%requested, next = %next, reason = %reason, "Redirected");
            }
            RunEvent::WorkerStart { .. } => {}
            RunEvent::WorkerEnd {
                worker,
                success,
                error_code,
                duration_ms,
            } => {
                stats.dispatches += 1;
                if !success {
                    stats.failed_dispatches += 1;
                }
                tracing::info!(%worker, success, error_code = ?error_code, duration_ms, "Worker finished");
            }
            RunEvent::ToolCallStart { .. } => {}
            RunEvent::ToolCallEnd {
                tool,
                is_error,
                duration_ms,
                ..
            } => {
                stats.tool_calls += 1;
                if *is_error {
                    stats.failed_tool_calls += 1;
                }
                tracing::debug!(tool = %tool, is_error, duration_ms, "Tool call");
            }
            RunEvent::Error { error } => tracing::error!(error = %error, "Run error"),
            RunEvent::Cancelled => tracing::info!("Run cancelled"),
        }
    }

    pub fn stats(&self) -> SessionStats {
        self.stats.lock().clone()
    }
}
