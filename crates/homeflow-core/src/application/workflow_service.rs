use async_trait::async_trait;
use futures::FutureExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::application::navigation::NavigationOutcome;
use crate::application::operation::PendingCall;
use crate::config::EngineConfig;
use crate::domain::collaborators::{
    AgentAssignmentService, Assignment, CodeCheck, CodeDispatch, DirectoryPage, DirectoryService,
    PaymentConfirmation, PaymentGateway, VerificationService,
};
use crate::domain::events::DomainEvent;
use crate::domain::workflow_instance::WorkflowInstance;
use crate::error::{OperationError, WorkflowError};
use crate::types::{AgentId, OperationKind, PhaseNumber};

/// Domain event handler
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), WorkflowError>;
}

/// Handler that writes every event to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEventHandler;

#[async_trait]
impl DomainEventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), WorkflowError> {
        debug!(
            event_type = event.event_type(),
            workflow_id = %event.workflow_instance_id().0,
            attributes = ?event.attributes(),
            "Domain event"
        );
        Ok(())
    }
}

/// Workflow service
///
/// Wires the external collaborators to workflow instances. Every
/// `request_*` method checks preconditions, issues a ticket and returns a
/// [`PendingCall`] without awaiting it; the matching `apply_*` method on
/// the instance writes the response back. The async convenience methods
/// do all three and publish the resulting domain events.
pub struct WorkflowService {
    verification: Arc<dyn VerificationService>,
    payments: Arc<dyn PaymentGateway>,
    assignments: Arc<dyn AgentAssignmentService>,
    directory: Arc<dyn DirectoryService>,
    config: EngineConfig,
    event_handler: Arc<dyn DomainEventHandler>,
}

impl WorkflowService {
    /// Create a new workflow service that logs its domain events
    pub fn new(
        verification: Arc<dyn VerificationService>,
        payments: Arc<dyn PaymentGateway>,
        assignments: Arc<dyn AgentAssignmentService>,
        directory: Arc<dyn DirectoryService>,
        config: EngineConfig,
    ) -> Self {
        Self {
            verification,
            payments,
            assignments,
            directory,
            config,
            event_handler: Arc::new(LoggingEventHandler),
        }
    }

    /// Replace the domain event handler
    pub fn with_event_handler(mut self, event_handler: Arc<dyn DomainEventHandler>) -> Self {
        self.event_handler = event_handler;
        self
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn timeout(&self, kind: OperationKind) -> Duration {
        self.config.timeouts.for_kind(kind)
    }

    /// Issue a verification code dispatch
    pub fn request_send_code(
        &self,
        instance: &mut WorkflowInstance,
    ) -> Result<PendingCall<CodeDispatch>, WorkflowError> {
        let contact = instance.prepare_send_code()?;
        let ticket = instance.begin_operation(OperationKind::SendCode)?;
        let verification = Arc::clone(&self.verification);

        let future = async move { verification.send_verification_code(&contact).await }.boxed();
        Ok(PendingCall::new(ticket, self.timeout(OperationKind::SendCode), future))
    }

    /// Issue a check of the entered code
    pub fn request_verify_code(
        &self,
        instance: &mut WorkflowInstance,
    ) -> Result<PendingCall<CodeCheck>, WorkflowError> {
        let (request_id, code) = instance.prepare_verify_code()?;
        let ticket = instance.begin_operation(OperationKind::VerifyCode)?;
        let verification = Arc::clone(&self.verification);

        let future = async move { verification.verify_code(&request_id, &code).await }.boxed();
        Ok(PendingCall::new(ticket, self.timeout(OperationKind::VerifyCode), future))
    }

    /// Issue a payment: intent creation followed by confirmation, under a
    /// single ticket
    pub fn request_payment(
        &self,
        instance: &mut WorkflowInstance,
        amount_cents: u64,
    ) -> Result<PendingCall<PaymentConfirmation>, WorkflowError> {
        let metadata = instance.prepare_payment(amount_cents)?;
        let ticket = instance.begin_operation(OperationKind::Payment)?;
        let payments = Arc::clone(&self.payments);

        let future = async move {
            let intent = payments.create_payment_intent(amount_cents, metadata).await?;
            let confirmation = payments.confirm_payment(&intent.client_secret).await?;
            Ok::<_, OperationError>(confirmation)
        }
        .boxed();
        Ok(PendingCall::new(ticket, self.timeout(OperationKind::Payment), future))
    }

    /// Issue an agent assignment
    pub fn request_assign_agent(
        &self,
        instance: &mut WorkflowInstance,
        agent_id: &AgentId,
    ) -> Result<PendingCall<Assignment>, WorkflowError> {
        let (property_id, agent_id) = instance.prepare_assign_agent(agent_id)?;
        let ticket = instance.begin_operation(OperationKind::AssignAgent)?;
        let assignments = Arc::clone(&self.assignments);

        let future = async move { assignments.assign_agent(&property_id, &agent_id).await }.boxed();
        Ok(PendingCall::new(ticket, self.timeout(OperationKind::AssignAgent), future))
    }

    /// Issue a lookup of the agent assigned to the seller's listing
    pub fn request_lookup_assignment(
        &self,
        instance: &mut WorkflowInstance,
    ) -> Result<PendingCall<Option<Assignment>>, WorkflowError> {
        let property_id = instance.prepare_lookup_assignment()?;
        let ticket = instance.begin_operation(OperationKind::LookupAssignment)?;
        let assignments = Arc::clone(&self.assignments);

        let future = async move { assignments.get_assigned_agent(&property_id).await }.boxed();
        Ok(PendingCall::new(ticket, self.timeout(OperationKind::LookupAssignment), future))
    }

    /// Issue a directory page fetch; `page_size` falls back to the
    /// configured default
    pub fn request_directory(
        &self,
        instance: &mut WorkflowInstance,
        filters: BTreeMap<String, String>,
        page: u32,
        page_size: Option<u32>,
    ) -> Result<PendingCall<DirectoryPage>, WorkflowError> {
        let page_size = page_size.unwrap_or(self.config.directory_page_size);
        let query = instance.prepare_directory_query(filters, page, page_size)?;
        let ticket = instance.begin_operation(OperationKind::FetchDirectory)?;
        let directory = Arc::clone(&self.directory);

        let future = async move { directory.list_directory(query).await }.boxed();
        Ok(PendingCall::new(ticket, self.timeout(OperationKind::FetchDirectory), future))
    }

    /// Send a verification code to the registered contact
    pub async fn send_verification_code(&self, instance: &mut WorkflowInstance) -> Result<(), WorkflowError> {
        let call = self.request_send_code(instance)?;
        let result = instance.apply_send_code(call.resolve().await);
        self.publish_events(instance).await?;
        result
    }

    /// Check the entered verification code
    pub async fn verify_code(&self, instance: &mut WorkflowInstance) -> Result<(), WorkflowError> {
        let call = self.request_verify_code(instance)?;
        let result = instance.apply_verify_code(call.resolve().await);
        self.publish_events(instance).await?;
        result
    }

    /// Pay for the selected property
    pub async fn pay(&self, instance: &mut WorkflowInstance, amount_cents: u64) -> Result<(), WorkflowError> {
        let call = self.request_payment(instance, amount_cents)?;
        let result = instance.apply_payment(call.resolve().await);
        self.publish_events(instance).await?;

        if result.is_ok() {
            info!(workflow_id = %instance.id().0, amount_cents, "Payment completed");
        }
        result
    }

    /// Assign an agent (sellers) or accept the selected assignment (agents)
    pub async fn assign_agent(&self, instance: &mut WorkflowInstance, agent_id: &AgentId) -> Result<(), WorkflowError> {
        let call = self.request_assign_agent(instance, agent_id)?;
        let result = instance.apply_assign_agent(call.resolve().await);
        self.publish_events(instance).await?;
        result
    }

    /// Refresh the seller's assigned agent from the registry
    pub async fn refresh_assignment(&self, instance: &mut WorkflowInstance) -> Result<(), WorkflowError> {
        let call = self.request_lookup_assignment(instance)?;
        let result = instance.apply_lookup_assignment(call.resolve().await);
        self.publish_events(instance).await?;
        result
    }

    /// Fetch a directory page into the instance's candidates
    pub async fn fetch_directory(
        &self,
        instance: &mut WorkflowInstance,
        filters: BTreeMap<String, String>,
        page: u32,
    ) -> Result<(), WorkflowError> {
        let call = self.request_directory(instance, filters, page, None)?;
        let result = instance.apply_directory(call.resolve().await);
        self.publish_events(instance).await?;
        result
    }

    /// Advance and publish the resulting events
    pub async fn advance(&self, instance: &mut WorkflowInstance) -> Result<NavigationOutcome, WorkflowError> {
        let outcome = instance.advance();
        self.publish_events(instance).await?;
        Ok(outcome)
    }

    /// Retreat and publish the resulting events
    pub async fn retreat(&self, instance: &mut WorkflowInstance) -> Result<NavigationOutcome, WorkflowError> {
        let outcome = instance.retreat();
        self.publish_events(instance).await?;
        Ok(outcome)
    }

    /// Jump to a phase and publish the resulting events
    pub async fn go_to(
        &self,
        instance: &mut WorkflowInstance,
        phase: PhaseNumber,
    ) -> Result<NavigationOutcome, WorkflowError> {
        let outcome = instance.go_to(phase);
        self.publish_events(instance).await?;
        Ok(outcome)
    }

    /// Hand every recorded event of the instance to the event handler
    pub async fn publish_events(&self, instance: &mut WorkflowInstance) -> Result<(), WorkflowError> {
        let events = instance.take_events();

        for event in events {
            self.event_handler.handle_event(event).await?;
        }

        Ok(())
    }
}

impl Clone for WorkflowService {
    fn clone(&self) -> Self {
        Self {
            verification: self.verification.clone(),
            payments: self.payments.clone(),
            assignments: self.assignments.clone(),
            directory: self.directory.clone(),
            config: self.config.clone(),
            event_handler: self.event_handler.clone(),
        }
    }
}
