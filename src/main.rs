use anyhow::Context;
use std::sync::Arc;
use tracing::info;

use homeflow::demo;
use homeflow_core::{EngineConfig, Role};
use homeflow_monitoring::{MetricsEventHandler, MonitoringConfig};
use homeflow_state_inmemory::InMemoryCollaborators;

/// Seed for the in-memory verification codes
const CODE_SEED: u64 = 2024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let role: Role = std::env::args()
        .nth(1)
        .as_deref()
        .unwrap_or("buyer")
        .parse()
        .context("Usage: homeflow [buyer|seller|agent]")?;

    let config = EngineConfig::load().context("Failed to load configuration")?;
    let monitoring = MonitoringConfig::from(&config.logging).with_service_name("homeflow-demo");
    let _logging = homeflow_monitoring::init(&monitoring)?;

    #[cfg(feature = "prometheus")]
    let metrics = homeflow_monitoring::install_prometheus_recorder()?;

    let collaborators = InMemoryCollaborators::new(CODE_SEED);
    let service = collaborators
        .workflow_service(config)
        .with_event_handler(Arc::new(MetricsEventHandler::global()));

    info!(role = %role, "Starting demo workflow");
    let instance = demo::run(role, &collaborators, &service).await?;

    for transition in instance.phase_history() {
        info!(
            from = transition.from,
            to = transition.to,
            kind = transition.kind.as_str(),
            "Phase history"
        );
    }

    #[cfg(feature = "prometheus")]
    println!("{}", metrics.render());

    Ok(())
}
