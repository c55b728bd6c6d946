use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::info;

use homeflow_core::{AgentAssignmentService, AgentId, Assignment, OperationError, PropertyId};

use crate::faults::Faults;

#[derive(Debug, Default)]
struct AssignmentState {
    assignments: HashMap<PropertyId, Assignment>,
    last_assigned_at: Option<DateTime<Utc>>,
}

/// In-memory agent assignment registry.
///
/// Assignment times are strictly increasing across calls and never earlier
/// than the moment the call was handled.
#[derive(Debug, Default)]
pub struct InMemoryAgentAssignmentService {
    state: RwLock<AssignmentState>,
    known_agents: Option<HashSet<AgentId>>,
    faults: Faults,
}

impl InMemoryAgentAssignmentService {
    /// Registry that accepts any agent
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that only accepts the given agents
    pub fn with_known_agents<I>(agents: I) -> Self
    where
        I: IntoIterator<Item = AgentId>,
    {
        Self {
            known_agents: Some(agents.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Failure and latency injection
    pub fn faults(&self) -> &Faults {
        &self.faults
    }

    /// All current assignments, ordered by property id
    pub async fn assignments(&self) -> Vec<Assignment> {
        let state = self.state.read().await;
        let mut assignments: Vec<Assignment> = state.assignments.values().cloned().collect();
        assignments.sort_by(|a, b| a.property_id.cmp(&b.property_id));
        assignments
    }
}

#[async_trait]
impl AgentAssignmentService for InMemoryAgentAssignmentService {
    async fn assign_agent(
        &self,
        property_id: &PropertyId,
        agent_id: &AgentId,
    ) -> Result<Assignment, OperationError> {
        self.faults.check().await?;

        if property_id.0.trim().is_empty() {
            return Err(OperationError::Validation("Property id is required".to_string()));
        }
        if let Some(known) = &self.known_agents {
            if !known.contains(agent_id) {
                return Err(OperationError::NotFound(format!("Agent {}", agent_id)));
            }
        }

        let mut state = self.state.write().await;
        let now = Utc::now();
        let assigned_at = match state.last_assigned_at {
            Some(last) if last >= now => last + Duration::microseconds(1),
            _ => now,
        };
        state.last_assigned_at = Some(assigned_at);

        let assignment = Assignment {
            property_id: property_id.clone(),
            assigned_agent: agent_id.clone(),
            assigned_at,
        };
        if let Some(previous) = state.assignments.insert(property_id.clone(), assignment.clone()) {
            info!(
                property_id = %property_id,
                previous_agent = %previous.assigned_agent,
                agent_id = %agent_id,
                "Agent reassigned"
            );
        } else {
            info!(property_id = %property_id, agent_id = %agent_id, "Agent assigned");
        }

        Ok(assignment)
    }

    async fn get_assigned_agent(
        &self,
        property_id: &PropertyId,
    ) -> Result<Option<Assignment>, OperationError> {
        self.faults.check().await?;
        Ok(self.state.read().await.assignments.get(property_id).cloned())
    }
}
