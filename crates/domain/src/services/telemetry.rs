use std::{
    collections::HashMap,
    env,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::hydrate_env_file;

static SUBSCRIBER_INSTALLED: OnceCell<()> = OnceCell::new();
static METRICS_HANDLE: OnceCell<Arc<PrometheusHandle>> = OnceCell::new();

/// Shared observability options for binaries.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    log_filter: String,
    abuse_threshold: u16,
}

impl TelemetryConfig {
    /// Loads telemetry knobs from optional environment variables prefixed with
    /// `<PREFIX>_`, e.g. `API_LOG_FILTER`. Missing entries fall back to
    /// defaults so binaries do not require extra configuration to boot.
    pub fn from_env(prefix: &str) -> Self {
        let _ = hydrate_env_file();
        let upper = prefix.trim().to_ascii_uppercase();
        let log_key = format!("{}_LOG_FILTER", upper);
        let abuse_key = format!("{}_ABUSE_THRESHOLD", upper);

        let log_filter = env::var(log_key)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "info".to_string());
        let abuse_threshold = env::var(abuse_key)
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(5);

        Self {
            log_filter,
            abuse_threshold,
        }
    }

    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    pub fn abuse_threshold(&self) -> u16 {
        self.abuse_threshold
    }
}

/// Guard returned after telemetry initialization.
#[derive(Clone)]
pub struct TelemetryGuard {
    metrics: Arc<PrometheusHandle>,
    abuse_threshold: u16,
}

impl TelemetryGuard {
    pub fn render_metrics(&self) -> String {
        self.metrics.render()
    }

    pub fn abuse_threshold(&self) -> u16 {
        self.abuse_threshold
    }
}

/// Wires up tracing and the Prometheus recorder once per process.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    install_tracing(config)?;
    let metrics = install_metrics()?;

    Ok(TelemetryGuard {
        metrics,
        abuse_threshold: config.abuse_threshold(),
    })
}

fn install_tracing(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_new(config.log_filter())
        .map_err(|err| TelemetryError::InvalidLogFilter(err.to_string()))?;

    if SUBSCRIBER_INSTALLED.set(()).is_ok() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
            .map_err(|err| TelemetryError::Tracing(err.to_string()))?;
    }

    Ok(())
}

fn install_metrics() -> Result<Arc<PrometheusHandle>, TelemetryError> {
    METRICS_HANDLE
        .get_or_try_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map(Arc::new)
                .map_err(|err| TelemetryError::Metrics(err.to_string()))
        })
        .cloned()
}

/// Tracks repeated failed attempts per identifier (login username) so
/// callers exceeding the threshold can be throttled.
#[derive(Clone, Default)]
pub struct AbuseTracker {
    threshold: u16,
    inner: Arc<Mutex<HashMap<String, AbuseRecord>>>,
}

impl AbuseTracker {
    pub fn new(threshold: u16) -> Self {
        Self {
            threshold: threshold.max(1),
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Records one failed attempt.
    pub fn record(&self, key: impl AsRef<str>) -> AbuseSignal {
        let key = normalize_key(key.as_ref());
        let mut guard = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        let entry = guard.entry(key.clone()).or_insert_with(|| AbuseRecord {
            attempts: 0,
            last_seen: Utc::now(),
        });
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_seen = Utc::now();
        counter!("abuse_events_total", "state" => "attempt").increment(1);

        if entry.attempts >= self.threshold {
            counter!("abuse_events_total", "state" => "escalated").increment(1);
            warn!(
                identifier = key,
                attempts = entry.attempts,
                "abuse threshold exceeded"
            );
            AbuseSignal::Escalated {
                attempts: entry.attempts,
            }
        } else {
            AbuseSignal::None
        }
    }

    /// True once the identifier has reached the threshold.
    pub fn is_blocked(&self, key: impl AsRef<str>) -> bool {
        let guard = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        guard
            .get(&normalize_key(key.as_ref()))
            .is_some_and(|record| record.attempts >= self.threshold)
    }

    pub fn reset(&self, key: impl AsRef<str>) {
        let mut guard = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        guard.remove(&normalize_key(key.as_ref()));
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbuseSignal {
    None,
    Escalated { attempts: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbuseRecord {
    pub attempts: u16,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    InvalidLogFilter(String),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(String),
    #[error("failed to install metrics recorder: {0}")]
    Metrics(String),
}
