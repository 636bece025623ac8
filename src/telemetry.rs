// src/telemetry.rs
use anyhow::{anyhow, Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
pub const ENV_METRICS_ADDR: &str = "METRICS_LISTEN_ADDR";
/// Events use the `capture`, `notify` and `sink` targets rather than module paths.
pub const DEFAULT_FILTER: &str = "capture=info,notify=info,sink=info,er_wait_capture=info,warn";

/// Compact text logs by default, JSON lines with `LOG_FORMAT=json`.
/// `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
    if let Err(e) = res {
        eprintln!("tracing already initialised: {e}");
    }
}

/// Starts the Prometheus listener when `METRICS_LISTEN_ADDR` is set.
/// Must run inside the tokio runtime.
pub fn init_metrics_from_env() -> Result<Option<SocketAddr>> {
    let Some(raw) = crate::config::env_lookup(ENV_METRICS_ADDR) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .with_context(|| format!("{ENV_METRICS_ADDR}={raw:?}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow!("prometheus exporter: {e}"))?;
    describe_metrics();
    Ok(Some(addr))
}

fn describe_metrics() {
    describe_counter!("capture_cycles_total", "Capture cycles started, per city.");
    describe_counter!(
        "capture_failures_total",
        "Cycle-fatal failures, per city and stage."
    );
    describe_counter!(
        "capture_persist_errors_total",
        "Sink write failures, per city and sink."
    );
    describe_counter!(
        "capture_hospitals_unknown_total",
        "Hospitals recorded without a usable wait time."
    );
    describe_gauge!(
        "capture_last_success_ts",
        "Unix ts of the last successful cycle, per city."
    );
    describe_counter!("notify_dispatch_total", "Alerts by throttle/dispatch outcome.");
}
