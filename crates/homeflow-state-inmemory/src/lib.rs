//! In-memory collaborators for the Homeflow engine
//!
//! This crate provides in-memory implementations of the collaborator
//! interfaces defined in the homeflow-core crate. They are useful for
//! development, demos and tests where no real verification provider,
//! payment gateway or agent registry is available. Each collaborator can
//! be scripted to fail or to answer slowly through its [`Faults`].

use std::sync::Arc;
use tracing::debug;

pub mod faults;
pub use faults::Faults;

pub mod verification;
pub use verification::InMemoryVerificationService;

pub mod payments;
pub use payments::{CapturedPayment, InMemoryPaymentGateway};

pub mod assignments;
pub use assignments::InMemoryAgentAssignmentService;

pub mod directory;
pub use directory::{DirectoryRecord, InMemoryDirectory, AGENT_ATTRIBUTE};

use homeflow_core::{
    AgentAssignmentService, DirectoryService, EngineConfig, PaymentGateway, VerificationService,
    WorkflowService,
};

/// Provider for in-memory collaborators
///
/// Every collaborator is shared: the handles returned by
/// [`create_services`](Self::create_services) and the concrete accessors
/// point at the same state, so tests can drive a [`WorkflowService`] and
/// inspect what the collaborators saw.
#[derive(Debug, Clone)]
pub struct InMemoryCollaborators {
    verification: Arc<InMemoryVerificationService>,
    payments: Arc<InMemoryPaymentGateway>,
    assignments: Arc<InMemoryAgentAssignmentService>,
    directory: Arc<InMemoryDirectory>,
}

impl InMemoryCollaborators {
    /// Create collaborators over the seeded directory; `seed` drives the
    /// verification codes
    pub fn new(seed: u64) -> Self {
        Self::with_directory(seed, InMemoryDirectory::seeded())
    }

    /// Create collaborators over a custom directory
    pub fn with_directory(seed: u64, directory: InMemoryDirectory) -> Self {
        Self {
            verification: Arc::new(InMemoryVerificationService::new(seed)),
            payments: Arc::new(InMemoryPaymentGateway::new()),
            assignments: Arc::new(InMemoryAgentAssignmentService::new()),
            directory: Arc::new(directory),
        }
    }

    /// Replace the verification service, e.g. one with tighter limits
    pub fn with_verification(mut self, verification: InMemoryVerificationService) -> Self {
        self.verification = Arc::new(verification);
        self
    }

    /// Replace the assignment registry
    pub fn with_assignments(mut self, assignments: InMemoryAgentAssignmentService) -> Self {
        self.assignments = Arc::new(assignments);
        self
    }

    /// The verification service
    pub fn verification(&self) -> &InMemoryVerificationService {
        &self.verification
    }

    /// The payment gateway
    pub fn payments(&self) -> &InMemoryPaymentGateway {
        &self.payments
    }

    /// The agent assignment registry
    pub fn assignments(&self) -> &InMemoryAgentAssignmentService {
        &self.assignments
    }

    /// The role directories
    pub fn directory(&self) -> &InMemoryDirectory {
        &self.directory
    }

    /// Create collaborator handles for use with [`WorkflowService::new`]
    pub fn create_services(
        &self,
    ) -> (
        Arc<dyn VerificationService>,
        Arc<dyn PaymentGateway>,
        Arc<dyn AgentAssignmentService>,
        Arc<dyn DirectoryService>,
    ) {
        (
            self.verification.clone(),
            self.payments.clone(),
            self.assignments.clone(),
            self.directory.clone(),
        )
    }

    /// Build a workflow service wired to these collaborators
    pub fn workflow_service(&self, config: EngineConfig) -> WorkflowService {
        debug!("Wiring workflow service to in-memory collaborators");
        let (verification, payments, assignments, directory) = self.create_services();
        WorkflowService::new(verification, payments, assignments, directory, config)
    }
}

impl Default for InMemoryCollaborators {
    fn default() -> Self {
        Self::new(0)
    }
}
