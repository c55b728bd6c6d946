use cucumber::World;
use std::fmt;

use homeflow_core::{
    EngineConfig, NavigationOutcome, WorkflowError, WorkflowInstance, WorkflowService,
};
use homeflow_state_inmemory::InMemoryCollaborators;

/// State shared across the steps of one scenario
#[derive(World)]
#[world(init = Self::new)]
pub struct HomeflowWorld {
    pub collaborators: InMemoryCollaborators,
    pub service: WorkflowService,
    pub instance: Option<WorkflowInstance>,
    pub last_outcome: Option<NavigationOutcome>,
    pub last_error: Option<WorkflowError>,
}

impl HomeflowWorld {
    pub fn new() -> Self {
        let collaborators = InMemoryCollaborators::new(0x0b1d);
        let service = collaborators.workflow_service(EngineConfig::default());
        Self {
            collaborators,
            service,
            instance: None,
            last_outcome: None,
            last_error: None,
        }
    }

    pub fn start(&mut self, instance: WorkflowInstance) {
        self.instance = Some(instance);
        self.last_outcome = None;
        self.last_error = None;
    }

    pub fn instance(&self) -> &WorkflowInstance {
        self.instance.as_ref().expect("no workflow started")
    }

    /// The service and the instance, borrowed together
    pub fn parts(&mut self) -> (&WorkflowService, &mut WorkflowInstance) {
        let instance = self.instance.as_mut().expect("no workflow started");
        (&self.service, instance)
    }

    /// Keep the error of a fallible action for later assertions
    pub fn record<T>(&mut self, result: Result<T, WorkflowError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(error) => {
                self.last_error = Some(error);
                None
            }
        }
    }
}

impl Default for HomeflowWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HomeflowWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HomeflowWorld")
            .field("instance", &self.instance.as_ref().map(|i| (i.role(), i.current_phase())))
            .field("last_outcome", &self.last_outcome)
            .field("last_error", &self.last_error)
            .finish()
    }
}
