//! Monitoring for the Homeflow workflow engine.
//!
//! Structured logging through `tracing`, and counters derived from the
//! engine's domain events through the `metrics` facade.

use std::path::PathBuf;
use tracing::info;

use homeflow_core::LoggingConfig;

pub mod logging;
pub mod metrics;

pub use crate::logging::{init_logging, LoggingGuard};
pub use crate::metrics::{
    FacadeCollector, MetricType, MetricsCollector, MetricsEventHandler, OPERATIONS_TOTAL,
    PHASE_TRANSITIONS_TOTAL,
};

#[cfg(feature = "prometheus")]
pub use crate::metrics::install_prometheus_recorder;

/// Configuration for initializing the monitoring system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// Service name attached to the startup log line
    pub service_name: String,
    /// Record metrics for domain events
    pub enable_metrics: bool,
    /// Log level filter used when `RUST_LOG` is unset (e.g. "info,homeflow_core=debug")
    pub log_filter: String,
    /// JSON instead of pretty stdout logs
    pub json: bool,
    /// Daily-rolling JSON log file
    pub log_file: Option<PathBuf>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            service_name: "homeflow".to_string(),
            enable_metrics: true,
            log_filter: "info".to_string(),
            json: false,
            log_file: None,
        }
    }
}

impl From<&LoggingConfig> for MonitoringConfig {
    fn from(logging: &LoggingConfig) -> Self {
        Self {
            log_filter: logging.filter.clone(),
            json: logging.json,
            log_file: logging.file.clone(),
            ..Self::default()
        }
    }
}

impl MonitoringConfig {
    /// Override the service name
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = service_name.into();
        self
    }
}

/// Initialize logging; keep the returned guard alive until shutdown so
/// buffered file output is flushed
pub fn init(config: &MonitoringConfig) -> anyhow::Result<LoggingGuard> {
    let guard = init_logging(config)?;
    info!(
        service_name = %config.service_name,
        metrics = config.enable_metrics,
        "Monitoring initialized"
    );
    Ok(guard)
}
