use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::operation::{
    OperationResponse, OperationState, OperationTicket, OperationTracker,
};
use crate::domain::collaborators::DirectoryPage;
use crate::domain::events::{
    CredentialsCleared, DomainEvent, OperationFailed, OperationStarted, OperationSucceeded,
    PhaseTransitioned, StaleResponseDiscarded, WorkflowCompleted, WorkflowStarted,
};
use crate::domain::gate::{self, GateReport};
use crate::domain::phase::{PhaseKey, PhaseStatus};
use crate::domain::session::{
    AssignmentMetadata, AssignmentStatus, ListingDetails, RegistrationForm, SessionData,
};
use crate::error::{OperationError, WorkflowError};
use crate::types::{AgentId, OperationKind, PhaseNumber, PropertyId, Role, UploadRef, WorkflowInstanceId};

/// Navigation action behind a phase change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Moved to the next phase
    Advance,

    /// Moved to the previous phase
    Retreat,

    /// Jumped to a chosen phase
    GoTo,
}

impl TransitionKind {
    /// Lowercase name used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionKind::Advance => "advance",
            TransitionKind::Retreat => "retreat",
            TransitionKind::GoTo => "go_to",
        }
    }
}

/// Immutable record of a phase change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Phase left
    pub from: PhaseNumber,

    /// Phase entered
    pub to: PhaseNumber,

    /// Navigation action
    pub kind: TransitionKind,

    /// When the move happened
    pub at: DateTime<Utc>,
}

/// Aggregate: Workflow instance
///
/// One buyer, seller or agent working through their phases. The instance
/// is owned by a single caller and mutated through `&mut`; session edits,
/// navigation and operation write-backs are its only mutators.
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "InstanceRecord")]
pub struct WorkflowInstance {
    id: WorkflowInstanceId,

    role: Role,

    current_phase: PhaseNumber,

    session: SessionData,

    phase_history: Vec<PhaseTransition>,

    operations: OperationTracker,

    /// Last directory page fetched
    candidates: Option<DirectoryPage>,

    created_at: DateTime<Utc>,

    updated_at: DateTime<Utc>,

    /// Domain events
    #[serde(skip)]
    events: Vec<Box<dyn DomainEvent>>,
}

/// Serialized shape of an instance, checked before it is accepted
#[derive(Deserialize)]
struct InstanceRecord {
    id: WorkflowInstanceId,
    role: Role,
    current_phase: PhaseNumber,
    session: SessionData,
    phase_history: Vec<PhaseTransition>,
    operations: OperationTracker,
    candidates: Option<DirectoryPage>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstanceRecord> for WorkflowInstance {
    type Error = WorkflowError;

    fn try_from(record: InstanceRecord) -> Result<Self, Self::Error> {
        if record.session.role() != record.role {
            return Err(WorkflowError::RoleMismatch {
                expected: record.role,
                actual: record.session.role(),
            });
        }

        let max = record.role.phase_count();
        let in_range = |phase: PhaseNumber| (1..=max).contains(&phase);
        if !in_range(record.current_phase) {
            return Err(WorkflowError::Validation(format!(
                "Phase {} is outside 1..={} for a {} workflow",
                record.current_phase, max, record.role
            )));
        }
        if let Some(bad) = record
            .phase_history
            .iter()
            .find(|t| !in_range(t.from) || !in_range(t.to))
        {
            return Err(WorkflowError::Validation(format!(
                "Recorded transition {} -> {} is outside 1..={}",
                bad.from, bad.to, max
            )));
        }

        Ok(Self {
            id: record.id,
            role: record.role,
            current_phase: record.current_phase,
            session: record.session,
            phase_history: record.phase_history,
            operations: record.operations,
            candidates: record.candidates,
            created_at: record.created_at,
            updated_at: record.updated_at,
            events: Vec::new(),
        })
    }
}

// Domain events are not cloned
impl Clone for WorkflowInstance {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            role: self.role,
            current_phase: self.current_phase,
            session: self.session.clone(),
            phase_history: self.phase_history.clone(),
            operations: self.operations.clone(),
            candidates: self.candidates.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            events: Vec::new(),
        }
    }
}

impl WorkflowInstance {
    /// Create an instance at phase 1 for the session's role
    fn new(session: SessionData) -> Self {
        let id = WorkflowInstanceId(Uuid::new_v4().to_string());
        let role = session.role();
        let now = Utc::now();

        let mut instance = Self {
            id: id.clone(),
            role,
            current_phase: 1,
            session,
            phase_history: Vec::new(),
            operations: OperationTracker::new(),
            candidates: None,
            created_at: now,
            updated_at: now,
            events: Vec::with_capacity(8),
        };

        instance.record_event(Box::new(WorkflowStarted {
            workflow_instance_id: id,
            role,
            timestamp: now,
        }));

        instance
    }

    /// New buyer workflow
    pub fn buyer() -> Self {
        Self::new(SessionData::buyer())
    }

    /// New seller workflow
    pub fn seller() -> Self {
        Self::new(SessionData::seller())
    }

    /// New agent workflow
    pub fn agent(agent_id: AgentId) -> Self {
        Self::new(SessionData::agent(agent_id))
    }

    /// Unique identifier
    pub fn id(&self) -> &WorkflowInstanceId {
        &self.id
    }

    /// Role the workflow runs for
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current 1-indexed phase
    pub fn current_phase(&self) -> PhaseNumber {
        self.current_phase
    }

    /// Highest phase number of the role
    pub fn max_phase(&self) -> PhaseNumber {
        self.role.phase_count()
    }

    /// Read-only session data
    pub fn session(&self) -> &SessionData {
        &self.session
    }

    /// Phase changes, oldest first
    pub fn phase_history(&self) -> &[PhaseTransition] {
        &self.phase_history
    }

    /// Operation tracker
    pub fn operations(&self) -> &OperationTracker {
        &self.operations
    }

    /// State of one operation kind
    pub fn operation_state(&self, kind: OperationKind) -> &OperationState {
        self.operations.state(kind)
    }

    /// Error of the last failed call of a kind
    pub fn last_error(&self, kind: OperationKind) -> Option<&OperationError> {
        self.operations.last_error(kind)
    }

    /// Last directory page fetched
    pub fn candidates(&self) -> Option<&DirectoryPage> {
        self.candidates.as_ref()
    }

    /// Creation timestamp
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last mutation timestamp
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Gate status of a phase
    pub fn phase_status(&self, phase: PhaseNumber) -> PhaseStatus {
        gate::phase_status(self.role, self.current_phase, &self.session, phase)
    }

    /// All gate statuses
    pub fn gate_report(&self) -> GateReport {
        GateReport::evaluate(self.role, self.current_phase, &self.session)
    }

    /// Whether every phase is complete
    pub fn is_terminal(&self) -> bool {
        gate::is_terminal(self.role, &self.session)
    }

    /// Record a domain event
    #[inline]
    pub fn record_event(&mut self, event: Box<dyn DomainEvent>) {
        self.events.push(event);
    }

    /// Take all recorded events
    #[inline]
    pub fn take_events(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    #[inline]
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ----- session edits -----

    /// Store the registration form as typed.
    ///
    /// A changed name, email or phone withdraws an earlier submission; a
    /// changed email or phone also discards the verification progress.
    pub fn edit_registration(&mut self, form: RegistrationForm) -> Result<(), WorkflowError> {
        self.ensure_editing(PhaseKey::Registration)?;

        let registration = self.session.registration_mut()?;
        let changes = registration.apply_form(form);
        if changes.name || changes.contact {
            registration.submitted = false;
        }
        if changes.contact {
            self.session.verification_mut()?.reset();
            // Responses for the old contact must not land
            self.operations.cancel(OperationKind::SendCode);
            self.operations.cancel(OperationKind::VerifyCode);
        }

        self.touch();
        Ok(())
    }

    /// Validate and submit the registration form.
    ///
    /// On failure the input is kept so the user can correct it.
    pub fn submit_registration(&mut self) -> Result<(), WorkflowError> {
        self.ensure_editing(PhaseKey::Registration)?;

        let registration = self.session.registration_mut()?;
        registration.validate()?;
        registration.submitted = true;

        info!(workflow_id = %self.id.0, "Registration submitted");
        self.clear_credentials();
        self.touch();
        Ok(())
    }

    /// Store the one-time code typed by the user
    pub fn enter_otp(&mut self, code: &str) -> Result<(), WorkflowError> {
        self.ensure_editing(PhaseKey::Verification)?;

        let verification = self.session.verification_mut()?;
        verification.otp = code.trim().to_string();
        verification.verified = false;
        self.operations.cancel(OperationKind::VerifyCode);

        self.touch();
        Ok(())
    }

    /// Pick a property: buyers from the fetched candidates, agents from
    /// their worklist
    pub fn select_property(&mut self, property_id: PropertyId) -> Result<(), WorkflowError> {
        match self.role {
            Role::Buyer => {
                self.ensure_editing(PhaseKey::PropertySelection)?;

                let listed = self
                    .candidates
                    .as_ref()
                    .map_or(false, |page| page.items.iter().any(|e| e.id == property_id.0));
                if !listed {
                    return Err(WorkflowError::Validation(format!(
                        "Property {} is not among the listed properties",
                        property_id
                    )));
                }

                let buyer = self.session.buyer_mut()?;
                if buyer.payment_completed {
                    return Err(WorkflowError::Validation(
                        "Selection cannot change after payment".to_string(),
                    ));
                }
                buyer.selected_property = Some(property_id);
            }
            Role::Agent => {
                self.ensure_editing(PhaseKey::AssignmentSelection)?;

                let agent = self.session.agent_mut()?;
                if matches!(&agent.assignment, Some(m) if m.status == AssignmentStatus::Accepted) {
                    return Err(WorkflowError::Validation(
                        "Assignment already accepted".to_string(),
                    ));
                }
                let priority = agent
                    .assigned(&property_id)
                    .map(|p| p.priority)
                    .ok_or_else(|| {
                        WorkflowError::Validation(format!(
                            "Property {} is not assigned to agent {}",
                            property_id, agent.agent_id
                        ))
                    })?;

                agent.selected_property = Some(property_id);
                agent.assignment = Some(AssignmentMetadata {
                    assigned_date: None,
                    priority,
                    status: AssignmentStatus::Pending,
                });
            }
            Role::Seller => {
                return Err(WorkflowError::RoleMismatch {
                    expected: Role::Buyer,
                    actual: Role::Seller,
                });
            }
        }

        self.touch();
        Ok(())
    }

    /// Accept or withdraw the terms of the current role
    pub fn accept_terms(&mut self, accepted: bool) -> Result<(), WorkflowError> {
        match self.role {
            Role::Buyer => {
                self.ensure_editing(PhaseKey::Payment)?;
                self.session.buyer_mut()?.terms_accepted = accepted;
            }
            Role::Seller => {
                self.ensure_editing(PhaseKey::DocumentsAndAgent)?;
                self.session.seller_mut()?.terms_accepted = accepted;
            }
            Role::Agent => {
                return Err(WorkflowError::RoleMismatch {
                    expected: Role::Buyer,
                    actual: Role::Agent,
                });
            }
        }

        self.touch();
        Ok(())
    }

    /// Validate and save the seller's listing; the first save allocates
    /// the property id
    pub fn save_listing(&mut self, details: ListingDetails) -> Result<PropertyId, WorkflowError> {
        self.ensure_editing(PhaseKey::Listing)?;
        details.validate()?;

        let seller = self.session.seller_mut()?;
        let property_id = seller
            .listing
            .property_id
            .get_or_insert_with(|| PropertyId(Uuid::new_v4().to_string()))
            .clone();
        seller.listing.details = details;
        seller.listing.saved = true;

        info!(workflow_id = %self.id.0, property_id = %property_id, "Listing saved");
        self.touch();
        Ok(property_id)
    }

    /// Attach a listing photo
    pub fn attach_image(&mut self, upload: UploadRef) -> Result<(), WorkflowError> {
        self.ensure_editing(PhaseKey::Listing)?;
        let seller = self.session.seller_mut()?;
        attach_unique(&mut seller.images, upload)?;
        self.touch();
        Ok(())
    }

    /// Attach a listing document
    pub fn attach_document(&mut self, upload: UploadRef) -> Result<(), WorkflowError> {
        self.ensure_editing(PhaseKey::DocumentsAndAgent)?;
        let seller = self.session.seller_mut()?;
        attach_unique(&mut seller.documents, upload)?;
        self.touch();
        Ok(())
    }

    /// Remove a listing document by file name
    pub fn remove_document(&mut self, file_name: &str) -> Result<(), WorkflowError> {
        self.ensure_editing(PhaseKey::DocumentsAndAgent)?;
        let seller = self.session.seller_mut()?;

        let before = seller.documents.len();
        seller.documents.retain(|d| d.file_name != file_name);
        if seller.documents.len() == before {
            return Err(WorkflowError::Validation(format!(
                "No document named {}",
                file_name
            )));
        }

        self.touch();
        Ok(())
    }

    /// Edits are accepted only on the current phase, and only while it is
    /// not locked
    fn ensure_editing(&self, key: PhaseKey) -> Result<(), WorkflowError> {
        let phase = self.role.phase_number(key).ok_or(WorkflowError::RoleMismatch {
            expected: owner_role(key),
            actual: self.role,
        })?;

        if phase != self.current_phase || self.phase_status(phase) == PhaseStatus::Locked {
            debug!(
                workflow_id = %self.id.0,
                current = self.current_phase,
                target = phase,
                "Edit refused outside the current open phase"
            );
            return Err(WorkflowError::GateViolation {
                from: self.current_phase,
                to: phase,
            });
        }
        Ok(())
    }

    /// The phase owning `key` must not be locked
    pub(crate) fn ensure_unlocked(&self, key: PhaseKey) -> Result<PhaseNumber, WorkflowError> {
        let phase = self.role.phase_number(key).ok_or(WorkflowError::RoleMismatch {
            expected: owner_role(key),
            actual: self.role,
        })?;

        if self.phase_status(phase) == PhaseStatus::Locked {
            return Err(WorkflowError::GateViolation {
                from: self.current_phase,
                to: phase,
            });
        }
        Ok(phase)
    }

    pub(crate) fn session_mut(&mut self) -> &mut SessionData {
        &mut self.session
    }

    pub(crate) fn set_candidates(&mut self, page: DirectoryPage) {
        self.candidates = Some(page);
    }

    /// Registration form still open for input on phase 1
    pub(crate) fn editing_registration(&self) -> bool {
        self.current_phase == 1 && self.session.registration().map_or(false, |r| !r.submitted)
    }

    /// Wipe transient credentials, recording an event when any were held
    pub(crate) fn clear_credentials(&mut self) {
        let held = self
            .session
            .registration()
            .map_or(false, |r| r.has_credentials());
        self.session.clear_credentials();

        if held {
            debug!(workflow_id = %self.id.0, "Credentials cleared");
            self.record_event(Box::new(CredentialsCleared {
                workflow_instance_id: self.id.clone(),
                timestamp: Utc::now(),
            }));
        }
    }

    // ----- navigation primitive -----

    /// Move to `to` and append the transition; callers check the gates
    pub(crate) fn move_to(&mut self, to: PhaseNumber, kind: TransitionKind) {
        let from = self.current_phase;
        let now = Utc::now();

        if from == 1 && to != 1 {
            self.clear_credentials();
        }

        self.current_phase = to;
        self.phase_history.push(PhaseTransition { from, to, kind, at: now });
        self.updated_at = now;

        info!(
            workflow_id = %self.id.0,
            role = %self.role,
            from,
            to,
            kind = kind.as_str(),
            "Phase changed"
        );
        self.record_event(Box::new(PhaseTransitioned {
            workflow_instance_id: self.id.clone(),
            role: self.role,
            from,
            to,
            kind,
            timestamp: now,
        }));
    }

    // ----- operation bookkeeping -----

    /// Issue a ticket for an operation
    pub fn begin_operation(&mut self, kind: OperationKind) -> Result<OperationTicket, WorkflowError> {
        let ticket = self.operations.begin(kind)?;

        debug!(workflow_id = %self.id.0, kind = %kind, seq = ticket.seq, "Operation issued");
        self.record_event(Box::new(OperationStarted {
            workflow_instance_id: self.id.clone(),
            kind,
            seq: ticket.seq,
            timestamp: ticket.issued_at,
        }));
        self.touch();
        Ok(ticket)
    }

    /// Logically cancel a pending operation; its response will be discarded
    pub fn cancel_operation(&mut self, kind: OperationKind) -> bool {
        let cancelled = self.operations.cancel(kind);
        if cancelled {
            debug!(workflow_id = %self.id.0, kind = %kind, "Operation cancelled");
            self.touch();
        }
        cancelled
    }

    /// Apply a resolved response.
    ///
    /// Stale responses are dropped without touching state. Otherwise a
    /// success runs `write`, which must validate before mutating; a
    /// collaborator error or a rejected write leaves the session as it was.
    pub(crate) fn settle<T, F>(&mut self, response: OperationResponse<T>, write: F) -> Result<(), WorkflowError>
    where
        F: FnOnce(&mut Self, T) -> Result<(), OperationError>,
    {
        let OperationResponse { ticket, result } = response;

        if let Err(stale) = self.operations.check_current(&ticket) {
            debug!(
                workflow_id = %self.id.0,
                kind = %ticket.kind,
                seq = ticket.seq,
                latest = self.operations.last_seq(ticket.kind),
                "Discarding stale response"
            );
            self.record_event(Box::new(StaleResponseDiscarded {
                workflow_instance_id: self.id.clone(),
                kind: ticket.kind,
                seq: ticket.seq,
                timestamp: Utc::now(),
            }));
            return Err(stale);
        }

        let was_terminal = self.is_terminal();
        let outcome = result.and_then(|value| write(self, value));

        match outcome {
            Ok(()) => {
                self.operations.succeed(&ticket)?;
                info!(workflow_id = %self.id.0, kind = %ticket.kind, seq = ticket.seq, "Operation succeeded");
                self.record_event(Box::new(OperationSucceeded {
                    workflow_instance_id: self.id.clone(),
                    kind: ticket.kind,
                    seq: ticket.seq,
                    timestamp: Utc::now(),
                }));

                if !was_terminal && self.is_terminal() {
                    info!(workflow_id = %self.id.0, role = %self.role, "Workflow completed");
                    self.record_event(Box::new(WorkflowCompleted {
                        workflow_instance_id: self.id.clone(),
                        role: self.role,
                        timestamp: Utc::now(),
                    }));
                }
                self.touch();
                Ok(())
            }
            Err(error) => {
                self.operations.fail(&ticket, error.clone())?;
                warn!(
                    workflow_id = %self.id.0,
                    kind = %ticket.kind,
                    seq = ticket.seq,
                    error = %error,
                    "Operation failed"
                );
                self.record_event(Box::new(OperationFailed {
                    workflow_instance_id: self.id.clone(),
                    kind: ticket.kind,
                    seq: ticket.seq,
                    error: error.clone(),
                    timestamp: Utc::now(),
                }));
                self.touch();
                Err(WorkflowError::AsyncOperation(error))
            }
        }
    }
}

fn owner_role(key: PhaseKey) -> Role {
    match key {
        PhaseKey::Registration | PhaseKey::Verification => Role::Buyer,
        PhaseKey::PropertySelection | PhaseKey::Payment => Role::Buyer,
        PhaseKey::Listing | PhaseKey::DocumentsAndAgent => Role::Seller,
        PhaseKey::Assignments | PhaseKey::AssignmentSelection | PhaseKey::Acceptance => Role::Agent,
    }
}

fn attach_unique(uploads: &mut Vec<UploadRef>, upload: UploadRef) -> Result<(), WorkflowError> {
    if upload.file_name.trim().is_empty() {
        return Err(WorkflowError::Validation("File name is required".to_string()));
    }
    if uploads.iter().any(|u| u.file_name == upload.file_name) {
        return Err(WorkflowError::Validation(format!(
            "A file named {} is already attached",
            upload.file_name
        )));
    }
    uploads.push(upload);
    Ok(())
}
