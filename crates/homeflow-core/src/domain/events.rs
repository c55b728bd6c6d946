use chrono::{DateTime, Utc};
use std::fmt::Debug;

use crate::domain::workflow_instance::TransitionKind;
use crate::error::OperationError;
use crate::types::{OperationKind, PhaseNumber, Role, WorkflowInstanceId};

/// Domain event trait for all events in the system
pub trait DomainEvent: Debug + Send + Sync {
    /// Returns the type of the event as a string
    fn event_type(&self) -> &'static str;

    /// Returns the workflow instance ID this event is associated with
    fn workflow_instance_id(&self) -> &WorkflowInstanceId;

    /// Returns the timestamp when the event occurred
    fn timestamp(&self) -> DateTime<Utc>;

    /// Low-cardinality attributes, used as log fields and metric labels
    fn attributes(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Event: Workflow instance started
#[derive(Debug)]
pub struct WorkflowStarted {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,

    /// Role the workflow runs for
    pub role: Role,

    /// The timestamp when the instance was created
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowStarted {
    fn event_type(&self) -> &'static str {
        "workflow.started"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("role", self.role.to_string())]
    }
}

/// Event: Current phase changed
#[derive(Debug)]
pub struct PhaseTransitioned {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,

    /// Role the workflow runs for
    pub role: Role,

    /// Phase left
    pub from: PhaseNumber,

    /// Phase entered
    pub to: PhaseNumber,

    /// Navigation action that caused the move
    pub kind: TransitionKind,

    /// The timestamp of the move
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for PhaseTransitioned {
    fn event_type(&self) -> &'static str {
        "phase.transitioned"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("role", self.role.to_string()),
            ("kind", self.kind.as_str().to_string()),
        ]
    }
}

/// Event: Navigation request refused by a gate
#[derive(Debug)]
pub struct NavigationBlocked {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,

    /// Role the workflow runs for
    pub role: Role,

    /// Phase the instance stayed on
    pub from: PhaseNumber,

    /// Phase that was requested
    pub target: PhaseNumber,

    /// The timestamp of the refusal
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for NavigationBlocked {
    fn event_type(&self) -> &'static str {
        "navigation.blocked"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("role", self.role.to_string())]
    }
}

/// Event: Asynchronous operation issued
#[derive(Debug)]
pub struct OperationStarted {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,
    /// Operation kind
    pub kind: OperationKind,
    /// Sequence number of the request
    pub seq: u64,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for OperationStarted {
    fn event_type(&self) -> &'static str {
        "operation.started"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("kind", self.kind.to_string())]
    }
}

/// Event: Asynchronous operation succeeded and was written back
#[derive(Debug)]
pub struct OperationSucceeded {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,
    /// Operation kind
    pub kind: OperationKind,
    /// Sequence number of the request
    pub seq: u64,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for OperationSucceeded {
    fn event_type(&self) -> &'static str {
        "operation.succeeded"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("kind", self.kind.to_string())]
    }
}

/// Event: Asynchronous operation failed
#[derive(Debug)]
pub struct OperationFailed {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,
    /// Operation kind
    pub kind: OperationKind,
    /// Sequence number of the request
    pub seq: u64,
    /// Failure reported for the request
    pub error: OperationError,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for OperationFailed {
    fn event_type(&self) -> &'static str {
        "operation.failed"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        let reason = match &self.error {
            OperationError::Network(_) => "network",
            OperationError::Validation(_) => "validation",
            OperationError::NotFound(_) => "not_found",
            OperationError::RateLimited(_) => "rate_limited",
            OperationError::Timeout(_) => "timeout",
        };
        vec![("kind", self.kind.to_string()), ("reason", reason.to_string())]
    }
}

/// Event: A superseded response arrived and was dropped
#[derive(Debug)]
pub struct StaleResponseDiscarded {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,
    /// Operation kind
    pub kind: OperationKind,
    /// Sequence number carried by the dropped response
    pub seq: u64,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for StaleResponseDiscarded {
    fn event_type(&self) -> &'static str {
        "operation.stale_discarded"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("kind", self.kind.to_string())]
    }
}

/// Event: Transient credentials were wiped from the session
#[derive(Debug)]
pub struct CredentialsCleared {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for CredentialsCleared {
    fn event_type(&self) -> &'static str {
        "session.credentials_cleared"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Event: Every phase of the workflow is complete
#[derive(Debug)]
pub struct WorkflowCompleted {
    /// The unique identifier of the workflow instance
    pub workflow_instance_id: WorkflowInstanceId,
    /// Role the workflow ran for
    pub role: Role,
    /// The timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
}

impl DomainEvent for WorkflowCompleted {
    fn event_type(&self) -> &'static str {
        "workflow.completed"
    }

    fn workflow_instance_id(&self) -> &WorkflowInstanceId {
        &self.workflow_instance_id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn attributes(&self) -> Vec<(&'static str, String)> {
        vec![("role", self.role.to_string())]
    }
}
