//! Metrics derived from workflow domain events.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::trace;

use homeflow_core::{DomainEvent, DomainEventHandler, WorkflowError};

/// Phase transitions, labelled by role and transition kind
pub const PHASE_TRANSITIONS_TOTAL: &str = "homeflow_phase_transitions_total";

/// Settled external operations, labelled by kind and outcome
pub const OPERATIONS_TOTAL: &str = "homeflow_operations_total";

/// Issued external operations, labelled by kind
pub const OPERATIONS_STARTED_TOTAL: &str = "homeflow_operations_started_total";

/// Responses discarded because a newer request was issued
pub const STALE_RESPONSES_TOTAL: &str = "homeflow_stale_responses_total";

/// Navigation attempts refused by the gates
pub const NAVIGATION_BLOCKED_TOTAL: &str = "homeflow_navigation_blocked_total";

/// Workflows created, labelled by role
pub const WORKFLOWS_STARTED_TOTAL: &str = "homeflow_workflows_started_total";

/// Workflows whose every phase completed, labelled by role
pub const WORKFLOWS_COMPLETED_TOTAL: &str = "homeflow_workflows_completed_total";

/// Type of metric for collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// Monotonic count
    Counter,
    /// Current value
    Gauge,
    /// Observed distribution
    Histogram,
}

/// Interface for collecting metrics
pub trait MetricsCollector: Send + Sync {
    /// Record a metric with the given name, value, type and labels
    fn record_metric(
        &self,
        name: &str,
        value: f64,
        metric_type: MetricType,
        labels: BTreeMap<String, String>,
    );
}

/// Collector forwarding to the process-wide `metrics` recorder
#[derive(Debug, Default, Clone, Copy)]
pub struct FacadeCollector;

impl MetricsCollector for FacadeCollector {
    fn record_metric(
        &self,
        name: &str,
        value: f64,
        metric_type: MetricType,
        labels: BTreeMap<String, String>,
    ) {
        let name = name.to_string();
        let labels: Vec<::metrics::Label> = labels
            .into_iter()
            .map(|(key, value)| ::metrics::Label::new(key, value))
            .collect();

        match metric_type {
            MetricType::Counter => {
                ::metrics::counter!(name, value as u64, labels);
            }
            MetricType::Gauge => {
                ::metrics::gauge!(name, value, labels);
            }
            MetricType::Histogram => {
                ::metrics::histogram!(name, value, labels);
            }
        }
    }
}

/// Metric name and extra labels for an event type
fn counter_for(event_type: &str) -> Option<(&'static str, Option<&'static str>)> {
    match event_type {
        "phase.transitioned" => Some((PHASE_TRANSITIONS_TOTAL, None)),
        "operation.started" => Some((OPERATIONS_STARTED_TOTAL, None)),
        "operation.succeeded" => Some((OPERATIONS_TOTAL, Some("succeeded"))),
        "operation.failed" => Some((OPERATIONS_TOTAL, Some("failed"))),
        "operation.stale_discarded" => Some((STALE_RESPONSES_TOTAL, None)),
        "navigation.blocked" => Some((NAVIGATION_BLOCKED_TOTAL, None)),
        "workflow.started" => Some((WORKFLOWS_STARTED_TOTAL, None)),
        "workflow.completed" => Some((WORKFLOWS_COMPLETED_TOTAL, None)),
        _ => None,
    }
}

/// Domain event handler that counts events.
///
/// Labels come from [`DomainEvent::attributes`]; settled operations also
/// get an `outcome` label. Workflow ids are never used as labels.
#[derive(Clone)]
pub struct MetricsEventHandler {
    collector: Arc<dyn MetricsCollector>,
}

impl MetricsEventHandler {
    /// Handler recording into `collector`
    pub fn new(collector: Arc<dyn MetricsCollector>) -> Self {
        Self { collector }
    }

    /// Handler recording into the global `metrics` recorder
    pub fn global() -> Self {
        Self::new(Arc::new(FacadeCollector))
    }
}

#[async_trait]
impl DomainEventHandler for MetricsEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), WorkflowError> {
        let Some((name, outcome)) = counter_for(event.event_type()) else {
            trace!(event_type = event.event_type(), "Event has no metric");
            return Ok(());
        };

        let mut labels: BTreeMap<String, String> = event
            .attributes()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        if let Some(outcome) = outcome {
            labels.insert("outcome".to_string(), outcome.to_string());
        }

        self.collector
            .record_metric(name, 1.0, MetricType::Counter, labels);
        Ok(())
    }
}

/// Install a Prometheus recorder as the global `metrics` recorder; the
/// handle renders the text exposition format
#[cfg(feature = "prometheus")]
pub fn install_prometheus_recorder(
) -> anyhow::Result<metrics_exporter_prometheus::PrometheusHandle> {
    use anyhow::Context;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}
